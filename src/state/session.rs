//! One open log file: the current view, an optional in-flight load and the
//! auto-refresh watch.
//!
//! A load never touches the current view until it finishes. A successful
//! load replaces the view in one step; a failed or cancelled one leaves it
//! as it was.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use tracing::{debug, info};

use crate::config::ResolvedConfig;
use crate::model::error::LoadError;
use crate::source::loader::{spawn_load, LoadEvent, LoadHandle, LoadNotice, LoadOutcome};
use crate::source::watch::FileWatch;
use crate::view_state::log::{FilterSnapshot, LogView, TimeDisplay};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub auto_refresh: bool,
    pub refresh_interval: Duration,
    pub keep_filter_on_refresh: bool,
    pub time_display: TimeDisplay,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&ResolvedConfig::default())
    }
}

impl From<&ResolvedConfig> for SessionOptions {
    fn from(config: &ResolvedConfig) -> Self {
        Self {
            auto_refresh: config.auto_refresh,
            refresh_interval: config.refresh_interval(),
            keep_filter_on_refresh: config.keep_filter_on_refresh,
            time_display: config.time_display(),
        }
    }
}

/// What [`LogSession::poll`] observed.
#[derive(Debug)]
pub enum SessionEvent {
    Progress(u8),
    /// The new view is in place.
    Loaded { notice: Option<LoadNotice> },
    /// The load produced nothing; the previous view, if any, is unchanged.
    Failed(LoadError),
}

/// View state carried from the old view to its replacement.
#[derive(Debug)]
struct Carryover {
    focus: Option<usize>,
    filter: Option<FilterSnapshot>,
}

#[derive(Debug)]
struct PendingLoad {
    handle: LoadHandle,
    mtime: Option<SystemTime>,
    carryover: Option<Carryover>,
}

#[derive(Debug)]
pub struct LogSession {
    path: PathBuf,
    options: SessionOptions,
    view: Option<LogView>,
    pending: Option<PendingLoad>,
    watch: FileWatch,
    progress: Option<u8>,
    notice: Option<LoadNotice>,
}

impl LogSession {
    /// Start loading `path`. Call [`poll`](Self::poll) or
    /// [`wait`](Self::wait) to collect the result.
    pub fn open(path: impl Into<PathBuf>, options: SessionOptions) -> Self {
        let path = path.into();
        let watch = FileWatch::new(&path, options.refresh_interval);
        let mut session = Self {
            path,
            options,
            view: None,
            pending: None,
            watch,
            progress: None,
            notice: None,
        };
        session.reload();
        session
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn view(&self) -> Option<&LogView> {
        self.view.as_ref()
    }

    pub fn view_mut(&mut self) -> Option<&mut LogView> {
        self.view.as_mut()
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Last progress reported by the in-flight load.
    pub fn progress(&self) -> Option<u8> {
        self.progress
    }

    /// Notice attached to the load that produced the current view.
    pub fn notice(&self) -> Option<&LoadNotice> {
        self.notice.as_ref()
    }

    /// Start a fresh load of the file, replacing any load already running.
    pub fn reload(&mut self) {
        if let Some(previous) = self.pending.take() {
            previous.handle.cancel();
        }
        let keep_filter = self.options.keep_filter_on_refresh;
        let carryover = self.view.as_ref().map(|view| Carryover {
            focus: view.focus(),
            filter: keep_filter.then(|| view.filter_snapshot()),
        });
        let mtime = self.watch.current_mtime();
        debug!(path = %self.path.display(), refresh = carryover.is_some(), "Starting load");

        self.progress = Some(0);
        self.pending = Some(PendingLoad {
            handle: spawn_load(self.path.clone()),
            mtime,
            carryover,
        });
    }

    /// Ask the in-flight load to stop. Returns false if nothing was loading.
    pub fn cancel_load(&mut self) -> bool {
        match &self.pending {
            Some(pending) => {
                pending.handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Drain pending load events without blocking.
    pub fn poll(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.pending.as_mut().and_then(|p| p.handle.try_next()) {
            match event {
                LoadEvent::Progress(percent) => {
                    self.progress = Some(percent);
                    events.push(SessionEvent::Progress(percent));
                }
                LoadEvent::Finished(outcome) => {
                    events.push(self.finish(outcome));
                    break;
                }
            }
        }
        events
    }

    /// Block until the in-flight load finishes. Returns None if nothing was
    /// loading.
    pub fn wait(&mut self, mut progress: impl FnMut(u8)) -> Option<SessionEvent> {
        while let Some(event) = self.pending.as_mut()?.handle.next_blocking() {
            match event {
                LoadEvent::Progress(percent) => {
                    self.progress = Some(percent);
                    progress(percent);
                }
                LoadEvent::Finished(outcome) => return Some(self.finish(outcome)),
            }
        }
        None
    }

    /// Reload if auto-refresh is on, no load is running, the check interval
    /// has passed and the file's modification time moved. Returns true if a
    /// reload started.
    pub fn poll_refresh(&mut self, now: Instant) -> bool {
        if !self.options.auto_refresh || self.pending.is_some() {
            return false;
        }
        if !self.watch.poll(now) {
            return false;
        }
        info!(path = %self.path.display(), "Log file changed, reloading");
        self.reload();
        true
    }

    fn finish(&mut self, outcome: LoadOutcome) -> SessionEvent {
        self.progress = None;
        let Some(pending) = self.pending.take() else {
            return SessionEvent::Failed(LoadError::WorkerLost);
        };
        // A failed load of this version is not retried until the file changes.
        self.watch.mark_loaded(pending.mtime);

        match outcome {
            LoadOutcome::Loaded { store, notice } => {
                let mut view = LogView::new(store);
                view.set_time_display(self.options.time_display);
                restore(&mut view, pending.carryover);
                self.view = Some(view);
                self.notice = notice.clone();
                SessionEvent::Loaded { notice }
            }
            LoadOutcome::Failed(err) => {
                debug!(error = %err, "Load failed, keeping previous view");
                SessionEvent::Failed(err)
            }
        }
    }
}

/// Re-apply carried filters, then focus the old row if it still exists and
/// the last row otherwise, so an unfocused view follows the tail.
fn restore(view: &mut LogView, carryover: Option<Carryover>) {
    let mut focus = None;
    if let Some(carryover) = carryover {
        if let Some(snapshot) = &carryover.filter {
            view.apply_filter_snapshot(snapshot);
        }
        focus = carryover.focus;
    }
    let rows = view.row_count();
    if rows == 0 {
        return;
    }
    view.set_focus(focus.filter(|&row| row < rows).unwrap_or(rows - 1));
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
