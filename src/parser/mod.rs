//! Binary trace log decoding.
//!
//! - [`format`] holds the on-disk layout constants
//! - [`reader`] decodes records sequentially, head region first
//! - [`reconcile`] repairs call nesting broken by ring-buffer wraparound

pub mod format;
pub mod reader;
pub mod reconcile;

pub use reader::{LogReader, RingLayout};
pub use reconcile::WrapReconciler;
