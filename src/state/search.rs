//! Wrap-around search and bookmarks over the row sequence.
//!
//! Search walks rows starting just past the focused row, wraps at either end
//! and stops at the first match or after returning to the start row. Every
//! row is visited at most once per search. Bookmark mode makes the same walk
//! without stopping and bookmarks every matching line.

use tracing::debug;

use crate::model::record::{LevelMask, Record};
use crate::model::registry::{LoggerRef, ThreadRef};
use crate::view_state::matcher::StringMatcher;
use crate::view_state::LogView;

// ===== Direction =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Down,
    Up,
}

impl Direction {
    fn step(self, row: usize, count: usize) -> usize {
        match self {
            Direction::Down => (row + 1) % count,
            Direction::Up => (row + count - 1) % count,
        }
    }

    /// Start row when nothing is focused, chosen so the first row visited is
    /// the first (down) or last (up) row.
    fn unfocused_start(self, count: usize) -> usize {
        match self {
            Direction::Down => count - 1,
            Direction::Up => 0,
        }
    }
}

// ===== SearchOutcome =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Focus moved to this row.
    Found(usize),
    /// Bookmark mode finished; this many lines matched.
    Bookmarked(usize),
    NotFound,
}

// ===== SearchEngine =====

/// Remembers the last search so it can be repeated.
#[derive(Debug, Clone, Default)]
pub struct SearchEngine {
    last: Option<StringMatcher>,
}

impl SearchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_matcher(&self) -> Option<&StringMatcher> {
        self.last.as_ref()
    }

    pub fn search(
        &mut self,
        view: &mut LogView,
        matcher: StringMatcher,
        direction: Direction,
        bookmark_mode: bool,
    ) -> SearchOutcome {
        let outcome = search_by(view, direction, bookmark_mode, |text| matcher.matches(text));
        debug!(needle = matcher.needle(), ?direction, bookmark_mode, ?outcome, "Search");
        self.last = Some(matcher);
        outcome
    }

    /// Repeat the last search in `direction`. Returns `NotFound` if there was
    /// no previous search.
    pub fn search_again(&mut self, view: &mut LogView, direction: Direction) -> SearchOutcome {
        match &self.last {
            Some(matcher) => search_by(view, direction, false, |text| matcher.matches(text)),
            None => SearchOutcome::NotFound,
        }
    }
}

/// Search rows with an arbitrary predicate over the line text.
pub fn search_by(
    view: &mut LogView,
    direction: Direction,
    bookmark_mode: bool,
    mut predicate: impl FnMut(&str) -> bool,
) -> SearchOutcome {
    let count = view.row_count();
    if count == 0 {
        return SearchOutcome::NotFound;
    }

    let start = view
        .focus()
        .filter(|&row| row < count)
        .unwrap_or_else(|| direction.unfocused_start(count));
    let mut current = start;
    let mut marked = Vec::new();

    loop {
        current = direction.step(current, count);
        if view.line_text(current).is_some_and(&mut predicate) {
            if !bookmark_mode {
                view.set_focus(current);
                return SearchOutcome::Found(current);
            }
            marked.push(current);
        }
        if current == start {
            break;
        }
    }

    if !bookmark_mode {
        return SearchOutcome::NotFound;
    }
    for &row in &marked {
        set_row_bookmark(view, row, true);
    }
    SearchOutcome::Bookmarked(marked.len())
}

// ===== Bookmarks =====

fn set_row_bookmark(view: &mut LogView, row: usize, bookmarked: bool) -> Option<()> {
    let target = view.row_at(row)?;
    let record = view.records_mut().get_mut(target.record)?;
    *record.bookmarks.get_mut(target.line)? = bookmarked;
    Some(())
}

/// Flip the bookmark on a row's line. Returns the new state, or None for an
/// out-of-range row.
pub fn toggle_bookmark(view: &mut LogView, row: usize) -> Option<bool> {
    let target = view.row_at(row)?;
    let record = view.records_mut().get_mut(target.record)?;
    let flag = record.bookmarks.get_mut(target.line)?;
    *flag = !*flag;
    Some(*flag)
}

/// Remove every bookmark, including those on hidden records. Returns the
/// number removed.
pub fn clear_bookmarks(view: &mut LogView) -> usize {
    let mut cleared = 0;
    for record in view.records_mut() {
        for flag in &mut record.bookmarks {
            cleared += usize::from(*flag);
            *flag = false;
        }
    }
    cleared
}

fn is_row_bookmarked(view: &LogView, row: usize) -> bool {
    view.row_at(row)
        .and_then(|target| Some(view.store().get(target.record)?.is_bookmarked(target.line)))
        .unwrap_or(false)
}

fn find_bookmark(view: &mut LogView, direction: Direction) -> Option<usize> {
    let count = view.row_count();
    if count == 0 {
        return None;
    }
    let start = view
        .focus()
        .filter(|&row| row < count)
        .unwrap_or_else(|| direction.unfocused_start(count));
    let mut current = start;
    loop {
        current = direction.step(current, count);
        if is_row_bookmarked(view, current) {
            view.set_focus(current);
            return Some(current);
        }
        if current == start {
            return None;
        }
    }
}

/// Focus the next bookmarked row after the focused one, wrapping.
pub fn next_bookmark(view: &mut LogView) -> Option<usize> {
    find_bookmark(view, Direction::Down)
}

/// Focus the previous bookmarked row before the focused one, wrapping.
pub fn prev_bookmark(view: &mut LogView) -> Option<usize> {
    find_bookmark(view, Direction::Up)
}

/// Bookmark every line of every record matching `predicate`, shown or not.
/// Returns the number of records touched.
fn bookmark_records(view: &mut LogView, predicate: impl Fn(&Record) -> bool) -> usize {
    let mut touched = 0;
    for record in view.records_mut() {
        if predicate(record) {
            record.bookmarks.fill(true);
            touched += 1;
        }
    }
    touched
}

pub fn bookmark_threads(view: &mut LogView, threads: &[ThreadRef]) -> usize {
    bookmark_records(view, |record| threads.contains(&record.thread()))
}

pub fn bookmark_loggers(view: &mut LogView, loggers: &[LoggerRef]) -> usize {
    bookmark_records(view, |record| loggers.contains(&record.logger()))
}

pub fn bookmark_levels(view: &mut LogView, levels: LevelMask) -> usize {
    bookmark_records(view, |record| levels.contains(record.level()))
}

#[cfg(test)]
#[path = "search_tests.rs"]
mod tests;
