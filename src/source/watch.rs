//! Modification-time polling for auto-refresh.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

/// Tracks a file's modification time as of the last load.
#[derive(Debug, Clone)]
pub struct FileWatch {
    path: PathBuf,
    loaded_mtime: Option<SystemTime>,
    interval: Duration,
    last_check: Option<Instant>,
}

impl FileWatch {
    pub fn new(path: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            path: path.into(),
            loaded_mtime: None,
            interval,
            last_check: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current modification time, or None if it cannot be read.
    pub fn current_mtime(&self) -> Option<SystemTime> {
        std::fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .ok()
    }

    /// Remember `mtime` as the version now loaded.
    pub fn mark_loaded(&mut self, mtime: Option<SystemTime>) {
        self.loaded_mtime = mtime;
    }

    pub fn loaded_mtime(&self) -> Option<SystemTime> {
        self.loaded_mtime
    }

    /// True if the file's modification time differs from the loaded one.
    /// A file that cannot be stat'ed counts as unchanged.
    pub fn has_changed(&self) -> bool {
        match self.current_mtime() {
            Some(now) => self.loaded_mtime != Some(now),
            None => false,
        }
    }

    /// Rate-limited [`has_changed`](Self::has_changed): checks at most once
    /// per interval.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self
            .last_check
            .is_some_and(|last| now.duration_since(last) < self.interval)
        {
            return false;
        }
        self.last_check = Some(now);
        self.has_changed()
    }
}
