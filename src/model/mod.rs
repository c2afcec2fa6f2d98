//! Domain model types.
//!
//! Records, their identity registries and the store that owns them. The
//! store is built once per load and then mutated only through collapse,
//! bookmark and row bookkeeping.

pub mod error;
pub mod record;
pub mod registry;
pub mod store;

// Re-export for convenience
pub use error::{AppError, FormatError, FormatErrorKind, InputError, LoadError};
pub use record::{LevelMask, RawRecord, Record, RecordKind, TraceLevel};
pub use registry::{
    LoggerRef, Registries, Registry, RegistryEntry, RegistryId, ThreadNameRef, ThreadRef,
};
pub use store::{ReadSummary, RecordStore, StoreBuilder};
