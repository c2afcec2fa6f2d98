//! View-state layer: visibility, row projection and the per-file view.
//!
//! # Module Structure
//!
//! - `matcher`: StringMatcher - needle plus match mode
//! - `filter`: VisibilityFilter - per-record visibility predicate
//! - `rows`: RowProjector - dense row sequence over visible records
//! - `log`: LogView - store, filter, rows and focus for one loaded file

pub mod filter;
pub mod log;
pub mod matcher;
pub mod rows;

pub use filter::VisibilityFilter;
pub use log::{FilterSnapshot, LogView, RowFields, TimeDisplay};
pub use matcher::{MatchMode, MatcherError, StringMatcher};
pub use rows::{Row, RowProjector};
