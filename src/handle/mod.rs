//! # Handle Boundary
//!
//! The capability set the adapter consumes from a storage engine.
//!
//! Engines expose three kinds of handles:
//!
//! - [`OperationHandle`]: one pending unit of work with `success`, `error`
//!   and (for exclusive-resource acquisition) `blocked` channels
//! - [`TransactionScope`]: a group of operations with `complete`, `error`
//!   and `abort` channels
//! - cursor handles: an [`OperationHandle`] whose output is
//!   `Option<C: CursorPosition>`, where `None` marks end of sequence
//!
//! Listener registration is additive. Registering a listener never
//! replaces one registered earlier, so several adapters may observe the
//! same scope.

mod key;

pub use key::{CursorDirection, Key};

/// A listener for one signal channel
pub type Listener<T> = Box<dyn FnMut(T)>;

/// Error payload carried by a handle's error signal
pub type SignalError<H> = <<H as OperationHandle>::Signal as ErrorSignal>::Error;

/// Envelope of an error, blocked or abort event
pub trait ErrorSignal {
    /// The underlying error payload
    type Error;

    /// Suppress the engine's default propagation of this event.
    fn prevent_default(&self);

    /// Unwrap the envelope into its payload.
    fn into_error(self) -> Self::Error;
}

/// A single pending unit of work
pub trait OperationHandle {
    /// Payload of the success signal
    type Output;
    /// Envelope of the error and blocked signals
    type Signal: ErrorSignal;

    /// Register a listener on the success channel.
    fn add_success_listener(&self, listener: Listener<Self::Output>);

    /// Register a listener on the error channel.
    fn add_error_listener(&self, listener: Listener<Self::Signal>);

    /// Whether this handle represents exclusive-resource acquisition
    fn has_blocked_channel(&self) -> bool {
        false
    }

    /// Register a listener on the blocked channel.
    ///
    /// Handles without a blocked channel ignore the listener.
    fn add_blocked_listener(&self, _listener: Listener<Self::Signal>) {}
}

/// A transactional grouping of operations
pub trait TransactionScope {
    /// Envelope of the error and abort signals
    type Signal: ErrorSignal;

    /// Register a listener fired once every member has committed.
    fn add_complete_listener(&self, listener: Listener<()>);

    /// Register a listener on the error channel.
    fn add_error_listener(&self, listener: Listener<Self::Signal>);

    /// Register a listener fired when the scope aborts.
    fn add_abort_listener(&self, listener: Listener<Self::Signal>);
}

/// One element of a caller-driven traversal
pub trait CursorPosition {
    /// Record type
    type Value;
    /// Error returned by continuation capabilities
    type Error;

    /// Key of the current element in the traversed source
    fn key(&self) -> &Key;

    /// Primary key of the current record
    fn primary_key(&self) -> &Key;

    /// The current record
    fn value(&self) -> &Self::Value;

    /// Traversal direction
    fn direction(&self) -> CursorDirection;

    /// Whether the traversed source is a multi-entry index
    fn source_is_multi_entry(&self) -> bool;

    /// Request the next element.
    fn continue_(&self) -> Result<(), Self::Error>;

    /// Request the next element whose key is at or beyond `key`.
    fn continue_to(&self, key: &Key) -> Result<(), Self::Error>;

    /// Skip `count` elements forward in the traversal direction.
    fn advance(&self, count: u32) -> Result<(), Self::Error>;
}
