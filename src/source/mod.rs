//! Log file sources.
//!
//! - [`loader`] reads a file into a [`RecordStore`](crate::model::RecordStore),
//!   either on the calling thread or on a cancellable worker thread
//! - [`watch`] polls the file's modification time for auto-refresh

pub mod loader;
pub mod watch;

pub use loader::{
    load_blocking, load_from_reader, spawn_load, LoadEvent, LoadHandle, LoadNotice, LoadOutcome,
};
pub use watch::FileWatch;
