//! idb-settle - single-settlement futures over event-driven storage handles
//!
//! Storage engines in the IndexedDB mould report progress through
//! separate `success`, `error`, `blocked` and `complete` signals. This
//! crate turns those handles into futures that settle exactly once:
//!
//! - [`adapter`]: the four entry points and the unique-key cursor filter
//! - [`handle`]: the boundary traits an engine implements
//! - `mem` (feature `mem`): an in-memory backend for exercising the adapter
//! - [`observability`]: structured logging and counters
//! - [`config`]: adapter configuration

pub mod adapter;
pub mod config;
pub mod handle;
#[cfg(feature = "mem")]
pub mod mem;
pub mod observability;

pub use adapter::{
    map_cursor, request, request_cursor, request_in, request_transaction, Adapter, AdapterError,
    AdapterResult, Pending, SettleState,
};
pub use config::AdapterConfig;
pub use handle::{CursorDirection, CursorPosition, ErrorSignal, Key, OperationHandle, TransactionScope};
