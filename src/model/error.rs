//! Error types for txview.
//!
//! This module defines the error taxonomy for loading and querying trace logs using
//! `thiserror`. Errors compose via `?` and `From` conversions.
//!
//! # Error Hierarchy
//!
//! - [`AppError`] - Top-level binary error wrapping every failure the CLI can hit
//!   - [`InputError`] - The log file cannot be opened or read at all
//!   - [`LoadError`] - A load produced no usable state (I/O failure, cancellation)
//!   - [`FormatError`] - A malformed record; the load keeps what was read before it
//!
//! # Recovery Strategy
//!
//! A `FormatError` is **non-fatal**: records decoded before the bad one stay usable and
//! the load is reported as incomplete. `InputError` and cancellation abort the load before
//! any state changes, so a previously loaded file stays active.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;
use crate::logging::LoggingError;
use crate::view_state::matcher::MatcherError;

/// Top-level application error encompassing all failure modes of the binary.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration file could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Tracing subscriber could not be installed.
    #[error("Logging setup failed: {0}")]
    Logging(#[from] LoggingError),

    /// The log file could not be opened.
    #[error("Failed to read input: {0}")]
    Input(#[from] InputError),

    /// The load ended without producing a store.
    #[error("Load failed: {0}")]
    Load(#[from] LoadError),

    /// A search or filter pattern was rejected.
    #[error("Invalid pattern: {0}")]
    Matcher(#[from] MatcherError),

    /// Writing rows to the output stream failed.
    #[error("Output error: {0}")]
    Output(#[from] std::io::Error),
}

/// Errors encountered when opening a log file.
///
/// These happen before any record is read, so they never disturb the
/// currently loaded state.
#[derive(Debug, Error)]
pub enum InputError {
    /// The specified log file does not exist at the given path.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::path::PathBuf;
    /// use txview::model::error::InputError;
    ///
    /// let err = InputError::FileNotFound {
    ///     path: PathBuf::from("/tmp/missing.tx1")
    /// };
    /// assert!(err.to_string().contains("/tmp/missing.tx1"));
    /// ```
    #[error("File not found: {path}")]
    FileNotFound {
        /// The filesystem path that was not found.
        path: PathBuf,
    },

    /// Generic I/O error (permission denied, file locked, disk errors).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of a load that produced no usable store.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The file could not be opened or its metadata read.
    #[error(transparent)]
    Io(#[from] InputError),

    /// The header is missing or malformed, so no record could be read.
    #[error("Unreadable log header: {0}")]
    Header(FormatError),

    /// The user asked for the load to stop. Partial results were discarded.
    #[error("Load cancelled")]
    Cancelled,

    /// The background worker went away without reporting a result.
    #[error("Load worker terminated unexpectedly")]
    WorkerLost,
}

/// A malformed record or header.
///
/// Carries the byte offset where the offending structure starts so the
/// incomplete-load notice can point at it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Malformed log data at byte {offset}: {kind}")]
pub struct FormatError {
    /// Absolute file offset of the header or record that failed to decode.
    pub offset: u64,
    /// What was wrong with it.
    pub kind: FormatErrorKind,
}

impl FormatError {
    pub fn new(offset: u64, kind: FormatErrorKind) -> Self {
        Self { offset, kind }
    }
}

/// Specific decode failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatErrorKind {
    #[error("not a trace log (bad magic)")]
    BadMagic,

    #[error("unsupported format version {0}")]
    UnsupportedVersion(u32),

    #[error("ring region header is inconsistent with the file size")]
    BadRingLayout,

    #[error("unknown record tag {0:#04x}")]
    UnknownTag(u8),

    #[error("invalid trace level bits {0:#04x}")]
    InvalidLevel(u8),

    #[error("timestamp {0} is out of range")]
    InvalidTimestamp(i64),

    #[error("string field is not valid UTF-8")]
    InvalidUtf8,

    #[error("record is truncated")]
    Truncated,

    /// Non-EOF read failure in the middle of the stream.
    #[error("read failed: {0}")]
    Io(String),
}

impl From<std::io::Error> for FormatErrorKind {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            FormatErrorKind::Truncated
        } else {
            FormatErrorKind::Io(err.to_string())
        }
    }
}
