//! # In-Memory Test Backend
//!
//! Built with the `mem` feature. A single-threaded test double in the
//! IndexedDB mould that implements the [`handle`](crate::handle) traits.
//! It exists to exercise the adapter against realistic signal ordering:
//!
//! - signals are delivered from tasks on an [`EventLoop`], never from the
//!   call that registered the work
//! - transactions commit once a turn passes with nothing outstanding
//! - overlapping transactions run one after another unless both only read
//! - unprevented request errors abort their transaction and are recorded
//!   in [`Factory::unhandled_errors`]
//!
//! Records are `serde_json::Value`s and keys are [`Key`](crate::Key)s.
//!
//! ```ignore
//! let events = EventLoop::new();
//! let factory = Factory::new(&events, EngineConfig::default());
//! let open = factory.open("library", Some(1))?;
//! let db = events.block_on(idb_settle::request(&open))??;
//! ```

mod config;
mod cursor;
mod database;
mod errors;
mod event_loop;
mod factory;
mod key_path;
mod listeners;
mod range;
mod request;
mod store;
mod transaction;

#[cfg(test)]
pub(crate) mod testing;

pub use config::EngineConfig;
pub use cursor::MemCursor;
pub use database::{Connection, UpgradeEvent, VersionChangeEvent};
pub use errors::{EngineError, EngineResult, ErrorEvent, ErrorName, Stalled};
pub use event_loop::EventLoop;
pub use factory::Factory;
pub use range::KeyRange;
pub use request::{MemRequest, OpenRequest};
pub use store::{Index, IndexParams, ObjectStore, StoreParams};
pub use transaction::{Transaction, TransactionMode, TransactionState};
