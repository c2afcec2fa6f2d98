//! Trace records and their severity levels.
//!
//! A [`Record`] is created once during load. Its core fields never change
//! afterwards; only the collapse, bookmark and row-index bookkeeping is
//! mutated by view operations.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::ops::BitOr;

use super::registry::{LoggerRef, ThreadNameRef, ThreadRef};

// ===== TraceLevel =====

/// Severity of a record. Each level occupies one bit so levels can be
/// combined into a [`LevelMask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum TraceLevel {
    Fatal = 0x01,
    Error = 0x02,
    Warn = 0x04,
    Info = 0x08,
    Verbose = 0x10,
    Debug = 0x20,
}

impl TraceLevel {
    /// Every level, most severe first.
    pub const ALL: [TraceLevel; 6] = [
        TraceLevel::Fatal,
        TraceLevel::Error,
        TraceLevel::Warn,
        TraceLevel::Info,
        TraceLevel::Verbose,
        TraceLevel::Debug,
    ];

    /// The level's bit.
    pub fn bit(self) -> u8 {
        self as u8
    }

    /// Decode a level from its on-disk byte. Exactly one known bit must be set.
    pub fn from_bits(bits: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.bit() == bits)
    }

    pub fn name(self) -> &'static str {
        match self {
            TraceLevel::Fatal => "Fatal",
            TraceLevel::Error => "Error",
            TraceLevel::Warn => "Warn",
            TraceLevel::Info => "Info",
            TraceLevel::Verbose => "Verbose",
            TraceLevel::Debug => "Debug",
        }
    }

    /// Case-insensitive lookup by name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|level| level.name().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for TraceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ===== LevelMask =====

/// A set of trace levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LevelMask(u8);

impl LevelMask {
    pub const NONE: Self = Self(0);
    pub const ALL: Self = Self(0x3f);

    pub fn from_bits(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, level: TraceLevel) -> bool {
        self.0 & level.bit() != 0
    }

    pub fn insert(&mut self, level: TraceLevel) {
        self.0 |= level.bit();
    }

    pub fn remove(&mut self, level: TraceLevel) {
        self.0 &= !level.bit();
    }

    pub fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Levels in `self` that are not in `other`.
    pub fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterate the member levels, most severe first.
    pub fn levels(self) -> impl Iterator<Item = TraceLevel> {
        TraceLevel::ALL
            .into_iter()
            .filter(move |level| self.contains(*level))
    }
}

impl From<TraceLevel> for LevelMask {
    fn from(level: TraceLevel) -> Self {
        Self(level.bit())
    }
}

impl BitOr for LevelMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOr<TraceLevel> for LevelMask {
    type Output = Self;

    fn bitor(self, rhs: TraceLevel) -> Self {
        Self(self.0 | rhs.bit())
    }
}

impl FromIterator<TraceLevel> for LevelMask {
    fn from_iter<I: IntoIterator<Item = TraceLevel>>(iter: I) -> Self {
        iter.into_iter().fold(Self::NONE, |mask, level| mask | level)
    }
}

// ===== RecordKind =====

/// What a record represents in the call structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RecordKind {
    /// Free-form message.
    Message,
    /// Method entry. Opens a nesting level on its thread.
    Entry,
    /// Method exit. Closes the matching entry at the same depth.
    Exit,
}

// ===== RawRecord =====

/// A record exactly as decoded from the file, before its identities are
/// interned into the per-file registries.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub msg_num: u32,
    pub time: DateTime<Utc>,
    pub thread_id: u32,
    pub thread_name: String,
    pub logger: String,
    pub level: TraceLevel,
    pub kind: RecordKind,
    pub depth: u8,
    pub method: String,
    pub text: String,
    /// Message number of the calling method's entry record (format 5+).
    pub caller_msg_num: Option<u32>,
}

// ===== Record =====

/// One trace record owned by a [`RecordStore`](super::store::RecordStore).
#[derive(Debug, Clone)]
pub struct Record {
    pub(crate) index: usize,
    pub(crate) msg_num: u32,
    pub(crate) time: DateTime<Utc>,
    pub(crate) thread: ThreadRef,
    pub(crate) thread_name: ThreadNameRef,
    pub(crate) logger: LoggerRef,
    pub(crate) level: TraceLevel,
    pub(crate) kind: RecordKind,
    pub(crate) depth: u8,
    pub(crate) method: String,
    pub(crate) lines: Vec<String>,
    pub(crate) caller_msg_num: Option<u32>,
    /// Resolved store index of the caller's entry record.
    pub(crate) caller: Option<usize>,
    /// Generated to repair nesting lost to ring-buffer wraparound.
    pub(crate) synthetic: bool,
    /// Entry: body hidden. Multi-line message: only the first line shown.
    pub(crate) collapsed: bool,
    /// Number of enclosing collapsed entries. Visible only at zero.
    pub(crate) collapsed_depth: u32,
    pub(crate) bookmarks: Vec<bool>,
    pub(crate) first_row: Option<usize>,
    pub(crate) row_indices: Vec<Option<usize>>,
}

impl Record {
    pub(crate) fn new(
        raw: RawRecord,
        thread: ThreadRef,
        thread_name: ThreadNameRef,
        logger: LoggerRef,
    ) -> Self {
        let lines = match raw.kind {
            RecordKind::Message => raw.text.split('\n').map(str::to_owned).collect(),
            RecordKind::Entry | RecordKind::Exit => vec![method_line(raw.kind, &raw.method)],
        };
        let line_count = lines.len();

        Self {
            index: 0,
            msg_num: raw.msg_num,
            time: raw.time,
            thread,
            thread_name,
            logger,
            level: raw.level,
            kind: raw.kind,
            depth: raw.depth,
            method: raw.method,
            lines,
            caller_msg_num: raw.caller_msg_num,
            caller: None,
            synthetic: false,
            collapsed: false,
            collapsed_depth: 0,
            bookmarks: vec![false; line_count],
            first_row: None,
            row_indices: vec![None; line_count],
        }
    }

    /// Build the synthetic counterpart of `self` with the given kind.
    ///
    /// Identity fields are copied; view state starts fresh.
    pub(crate) fn synthesize(&self, kind: RecordKind, msg_num: u32, time: DateTime<Utc>) -> Self {
        Self {
            index: 0,
            msg_num,
            time,
            thread: self.thread,
            thread_name: self.thread_name,
            logger: self.logger,
            level: self.level,
            kind,
            depth: self.depth,
            method: self.method.clone(),
            lines: vec![method_line(kind, &self.method)],
            caller_msg_num: None,
            caller: None,
            synthetic: true,
            collapsed: false,
            collapsed_depth: 0,
            bookmarks: vec![false],
            first_row: None,
            row_indices: vec![None],
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn msg_num(&self) -> u32 {
        self.msg_num
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn thread(&self) -> ThreadRef {
        self.thread
    }

    pub fn thread_name(&self) -> ThreadNameRef {
        self.thread_name
    }

    pub fn logger(&self) -> LoggerRef {
        self.logger
    }

    pub fn level(&self) -> TraceLevel {
        self.level
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn is_entry(&self) -> bool {
        self.kind == RecordKind::Entry
    }

    pub fn is_exit(&self) -> bool {
        self.kind == RecordKind::Exit
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn has_newlines(&self) -> bool {
        self.lines.len() > 1
    }

    /// All lines joined back into the original text.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn caller(&self) -> Option<usize> {
        self.caller
    }

    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    pub fn collapsed_depth(&self) -> u32 {
        self.collapsed_depth
    }

    /// Eligible for display (not hidden by any enclosing collapse).
    pub fn is_eligible_for_display(&self) -> bool {
        self.collapsed_depth == 0
    }

    pub fn is_bookmarked(&self, line: usize) -> bool {
        self.bookmarks.get(line).copied().unwrap_or(false)
    }

    /// First row index, if the record currently produces any rows.
    pub fn first_row(&self) -> Option<usize> {
        self.first_row
    }

    /// Row index of a specific line, if that line is currently shown.
    pub fn row_of_line(&self, line: usize) -> Option<usize> {
        self.row_indices.get(line).copied().flatten()
    }

    /// Number of lines currently projected into rows when visible.
    pub(crate) fn shown_line_count(&self) -> usize {
        if self.kind == RecordKind::Message && self.collapsed {
            1
        } else {
            self.lines.len()
        }
    }
}

fn method_line(kind: RecordKind, method: &str) -> String {
    match kind {
        RecordKind::Entry => format!("{method} entered"),
        RecordKind::Exit => format!("{method} exiting"),
        RecordKind::Message => method.to_owned(),
    }
}
