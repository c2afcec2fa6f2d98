//! txview
//!
//! Reader and view engine for binary nested-call trace logs. A log holds a
//! linear head region and an optional fixed-size ring region that overwrites
//! its oldest records once full.
//!
//! The pipeline is: [`parser::LogReader`] decodes records in logical order,
//! [`model::StoreBuilder`] reconciles calls lost to ring wraparound and
//! indexes the result, and [`view_state::LogView`] projects visible records
//! into addressable rows. [`state`] adds caller navigation, search and
//! bookmarks on top, and [`state::LogSession`] drives background loads and
//! auto-refresh.

pub mod config;
// Writer-side builders for tests and benches; not part of the reading API.
#[doc(hidden)]
pub mod fixture;
pub mod logging;
pub mod model;
pub mod parser;
pub mod source;
pub mod state;
pub mod view_state;
