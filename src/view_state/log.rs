//! Top-level view-state for one loaded log file.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::debug;

use super::filter::VisibilityFilter;
use super::matcher::StringMatcher;
use super::rows::{Row, RowProjector};
use crate::model::record::{LevelMask, Record, RecordKind, TraceLevel};
use crate::model::registry::{LoggerRef, Registries, ThreadNameRef, ThreadRef};
use crate::model::store::RecordStore;

/// How timestamps are rendered in [`RowFields`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeDisplay {
    /// RFC 3339 with microseconds.
    #[default]
    Absolute,
    /// Seconds relative to the view's zero time.
    Relative,
}

/// Rendered fields of one row, as handed to a presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFields {
    pub row: usize,
    pub msg_num: u32,
    pub time: String,
    pub thread_id: u32,
    pub thread_name: String,
    pub logger: String,
    pub level: TraceLevel,
    pub depth: u8,
    pub method: String,
    /// Line text indented two spaces per stack depth.
    pub text: String,
    pub bookmarked: bool,
    pub kind: RecordKind,
    /// First line of a record with more than one line.
    pub multiline_head: bool,
    /// Collapsed method entry, or multi-line message showing one line.
    pub collapsed: bool,
    pub synthetic: bool,
}

/// Filter state that survives a reload. Registry values are keyed by raw
/// value so they can be re-applied to a fresh store's registries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSnapshot {
    pub hidden_threads: Vec<u32>,
    pub hidden_thread_names: Vec<String>,
    pub hidden_loggers: Vec<String>,
    pub hidden_levels: LevelMask,
    pub text: Option<StringMatcher>,
}

/// The record store plus everything needed to project it into rows.
///
/// Every mutation that can change visibility ends with a row rebuild and
/// focus relocation, so [`row_count`](Self::row_count) and
/// [`row`](Self::row) are always consistent with the current filter.
#[derive(Debug, Clone)]
pub struct LogView {
    store: RecordStore,
    filter: VisibilityFilter,
    rows: RowProjector,
    focus: Option<usize>,
    zero_time: DateTime<Utc>,
    time_display: TimeDisplay,
}

impl LogView {
    /// Project a freshly loaded store. The level mask starts as every level
    /// present in the file.
    pub fn new(store: RecordStore) -> Self {
        let zero_time = store
            .get(0)
            .map(Record::time)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let filter = VisibilityFilter::new(store.levels_found());
        let mut view = Self {
            store,
            filter,
            rows: RowProjector::new(),
            focus: None,
            zero_time,
            time_display: TimeDisplay::default(),
        };
        view.rebuild_all();
        view
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn registries(&self) -> &Registries {
        self.store.registries()
    }

    pub fn filter(&self) -> &VisibilityFilter {
        &self.filter
    }

    pub(crate) fn records_mut(&mut self) -> &mut [Record] {
        self.store.records_mut()
    }

    // ===== Rows =====

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn row_at(&self, index: usize) -> Option<Row> {
        self.rows.get(index)
    }

    pub fn record_of_row(&self, index: usize) -> Option<&Record> {
        self.rows
            .get(index)
            .and_then(|row| self.store.get(row.record))
    }

    /// Raw text of a row's line, without indentation.
    pub fn line_text(&self, index: usize) -> Option<&str> {
        let row = self.rows.get(index)?;
        self.store
            .get(row.record)?
            .lines()
            .get(row.line)
            .map(String::as_str)
    }

    /// Rendered fields for `index`, or None past the end.
    pub fn row(&self, index: usize) -> Option<RowFields> {
        let row = self.rows.get(index)?;
        let record = self.store.get(row.record)?;
        let registries = self.store.registries();
        let line = record.lines().get(row.line)?;
        let indent = usize::from(record.depth()) * 2;

        Some(RowFields {
            row: index,
            msg_num: record.msg_num(),
            time: self.format_time(record.time()),
            thread_id: registries.thread_id(record.thread()),
            thread_name: registries.thread_name(record.thread_name()).to_string(),
            logger: registries.logger_name(record.logger()).to_string(),
            level: record.level(),
            depth: record.depth(),
            method: record.method().to_string(),
            text: format!("{:indent$}{line}", ""),
            bookmarked: record.is_bookmarked(row.line),
            kind: record.kind(),
            multiline_head: row.line == 0 && record.has_newlines(),
            collapsed: record.is_collapsed(),
            synthetic: record.is_synthetic(),
        })
    }

    fn format_time(&self, time: DateTime<Utc>) -> String {
        match self.time_display {
            TimeDisplay::Absolute => time.to_rfc3339_opts(SecondsFormat::Micros, true),
            TimeDisplay::Relative => {
                let micros = (time - self.zero_time).num_microseconds().unwrap_or(0);
                let sign = if micros < 0 { "-" } else { "" };
                let abs = micros.unsigned_abs();
                format!("{sign}{}.{:06}", abs / 1_000_000, abs % 1_000_000)
            }
        }
    }

    // ===== Focus =====

    pub fn focus(&self) -> Option<usize> {
        self.focus
    }

    /// Focus a row. Returns false (and leaves focus alone) if out of range.
    pub fn set_focus(&mut self, row: usize) -> bool {
        if row < self.rows.len() {
            self.focus = Some(row);
            true
        } else {
            false
        }
    }

    pub fn clear_focus(&mut self) {
        self.focus = None;
    }

    pub fn focused_record(&self) -> Option<&Record> {
        self.focus.and_then(|row| self.record_of_row(row))
    }

    // ===== Time display =====

    pub fn time_display(&self) -> TimeDisplay {
        self.time_display
    }

    pub fn set_time_display(&mut self, display: TimeDisplay) {
        self.time_display = display;
    }

    pub fn zero_time(&self) -> DateTime<Utc> {
        self.zero_time
    }

    /// Measure relative timestamps from `record`. Returns false for an
    /// unknown record.
    pub fn set_zero_time(&mut self, record: usize) -> bool {
        match self.store.get(record) {
            Some(record) => {
                self.zero_time = record.time();
                true
            }
            None => false,
        }
    }

    // ===== Filters =====

    /// Set the level mask. Levels absent from the file are dropped.
    pub fn set_level_mask(&mut self, levels: LevelMask) {
        let levels = levels.intersection(self.store.levels_found());
        if self.filter.set_levels(levels) {
            self.rebuild_all();
        }
    }

    pub fn set_level_visible(&mut self, level: TraceLevel, visible: bool) {
        let mut levels = self.filter.levels();
        if visible {
            levels.insert(level);
        } else {
            levels.remove(level);
        }
        self.set_level_mask(levels);
    }

    pub fn set_text_filter(&mut self, matcher: Option<StringMatcher>) {
        self.filter.set_text(matcher);
        self.rebuild_all();
    }

    pub fn set_thread_visible(&mut self, thread: ThreadRef, visible: bool) {
        if self
            .store
            .registries_mut()
            .threads
            .set_visible(thread, visible)
        {
            self.rebuild_all();
        }
    }

    pub fn set_thread_name_visible(&mut self, name: ThreadNameRef, visible: bool) {
        if self
            .store
            .registries_mut()
            .thread_names
            .set_visible(name, visible)
        {
            self.rebuild_all();
        }
    }

    pub fn set_logger_visible(&mut self, logger: LoggerRef, visible: bool) {
        if self
            .store
            .registries_mut()
            .loggers
            .set_visible(logger, visible)
        {
            self.rebuild_all();
        }
    }

    pub fn show_only_threads(&mut self, threads: &[ThreadRef]) {
        if self.store.registries_mut().threads.show_only(threads) {
            self.rebuild_all();
        }
    }

    pub fn hide_threads(&mut self, threads: &[ThreadRef]) {
        let registry = &mut self.store.registries_mut().threads;
        let changed = threads
            .iter()
            .fold(false, |changed, &id| registry.set_visible(id, false) | changed);
        if changed {
            self.rebuild_all();
        }
    }

    pub fn show_only_thread_names(&mut self, names: &[ThreadNameRef]) {
        if self.store.registries_mut().thread_names.show_only(names) {
            self.rebuild_all();
        }
    }

    pub fn hide_thread_names(&mut self, names: &[ThreadNameRef]) {
        let registry = &mut self.store.registries_mut().thread_names;
        let changed = names
            .iter()
            .fold(false, |changed, &id| registry.set_visible(id, false) | changed);
        if changed {
            self.rebuild_all();
        }
    }

    pub fn show_only_loggers(&mut self, loggers: &[LoggerRef]) {
        if self.store.registries_mut().loggers.show_only(loggers) {
            self.rebuild_all();
        }
    }

    pub fn hide_loggers(&mut self, loggers: &[LoggerRef]) {
        let registry = &mut self.store.registries_mut().loggers;
        let changed = loggers
            .iter()
            .fold(false, |changed, &id| registry.set_visible(id, false) | changed);
        if changed {
            self.rebuild_all();
        }
    }

    /// Clear every filter axis: all levels in the file, every registry value
    /// visible, no text filter.
    pub fn clear_filters(&mut self) {
        let registries = self.store.registries_mut();
        registries.threads.show_all();
        registries.thread_names.show_all();
        registries.loggers.show_all();
        self.filter.set_levels(self.store.levels_found());
        self.filter.set_text(None);
        self.rebuild_all();
    }

    /// True if any axis hides something that would otherwise be shown.
    pub fn has_active_filter(&self) -> bool {
        self.filter.levels() != self.store.levels_found()
            || !self.store.registries().all_visible()
            || self.filter.text().is_some()
    }

    pub fn filter_snapshot(&self) -> FilterSnapshot {
        let registries = self.store.registries();
        FilterSnapshot {
            hidden_threads: registries.threads.hidden_keys(),
            hidden_thread_names: registries.thread_names.hidden_keys(),
            hidden_loggers: registries.loggers.hidden_keys(),
            hidden_levels: self.store.levels_found().difference(self.filter.levels()),
            text: self.filter.text().cloned(),
        }
    }

    /// Re-apply a snapshot taken from a previous load. Values not mentioned
    /// stay visible.
    pub fn apply_filter_snapshot(&mut self, snapshot: &FilterSnapshot) {
        let registries = self.store.registries_mut();
        for key in &snapshot.hidden_threads {
            if let Some(id) = registries.threads.find(key) {
                registries.threads.set_visible(id, false);
            }
        }
        for key in &snapshot.hidden_thread_names {
            if let Some(id) = registries.thread_names.find(key) {
                registries.thread_names.set_visible(id, false);
            }
        }
        for key in &snapshot.hidden_loggers {
            if let Some(id) = registries.loggers.find(key) {
                registries.loggers.set_visible(id, false);
            }
        }
        let levels = self
            .store
            .levels_found()
            .difference(snapshot.hidden_levels);
        self.filter.set_levels(levels);
        self.filter.set_text(snapshot.text.clone());
        self.rebuild_all();
    }

    // ===== Collapse =====

    /// Toggle a method entry's collapse. Returns false if `record` is not an
    /// entry.
    pub fn expand_collapse_method(&mut self, record: usize) -> bool {
        if !self.store.expand_collapse_method(record) {
            return false;
        }
        self.rebuild_from(record);
        true
    }

    /// Toggle a multi-line message between all lines and its first line.
    pub fn toggle_record_lines(&mut self, record: usize) -> bool {
        if !self.store.toggle_lines(record) {
            return false;
        }
        self.rebuild_from(record);
        true
    }

    pub fn expand_all(&mut self) {
        self.store.expand_all();
        self.rebuild_all();
    }

    // ===== Rebuild =====

    /// Rebuild starting at `record`'s first row. A hidden record gives no
    /// safe starting row, so that falls back to a full rebuild.
    fn rebuild_from(&mut self, record: usize) {
        match self.store.get(record).and_then(Record::first_row) {
            Some(start_row) => self.rebuild(start_row, record),
            None => self.rebuild_all(),
        }
    }

    pub(crate) fn rebuild_all(&mut self) {
        self.rebuild(0, 0);
    }

    fn rebuild(&mut self, start_row: usize, start_record: usize) {
        let anchor = self.focus.and_then(|row| self.rows.get(row));
        let (records, registries) = self.store.split_mut();
        let count = self
            .rows
            .rebuild_rows(start_row, start_record, records, registries, &self.filter);
        self.focus = anchor.and_then(|row| self.relocate(row));
        debug!(rows = count, focus = ?self.focus, "View rebuilt");
    }

    /// Row showing `anchor` after a rebuild, or the closest row before it.
    fn relocate(&self, anchor: Row) -> Option<usize> {
        let records = self.store.records();
        let record = records.get(anchor.record)?;
        if let Some(row) = record.row_of_line(anchor.line).or(record.first_row()) {
            return Some(row);
        }
        records[..anchor.record]
            .iter()
            .rev()
            .find_map(|r| r.row_indices.iter().rev().find_map(|row| *row))
            .or_else(|| (!self.rows.is_empty()).then_some(0))
    }
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
