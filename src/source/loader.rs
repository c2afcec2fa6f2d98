//! Background file loading with cooperative cancellation and progress.
//!
//! A load runs the reader, the wrap reconciler and store construction on a
//! worker thread. The caller holds a [`LoadHandle`]: a shared cancel flag
//! checked once per record, and a channel carrying progress percentages and
//! exactly one terminal [`LoadEvent::Finished`]. Partial results never leave
//! the worker; a cancelled load reports [`LoadError::Cancelled`] and nothing
//! else.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use crate::model::error::{FormatError, InputError, LoadError};
use crate::model::store::{RecordStore, StoreBuilder};
use crate::parser::reader::LogReader;

/// Non-fatal condition attached to a successful load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadNotice {
    /// A malformed record stopped the read. Everything before it was kept.
    Incomplete(FormatError),
    /// The file holds no records.
    Empty,
}

#[derive(Debug)]
pub enum LoadOutcome {
    Loaded {
        store: RecordStore,
        notice: Option<LoadNotice>,
    },
    Failed(LoadError),
}

#[derive(Debug)]
pub enum LoadEvent {
    /// Percentage of the file consumed, sent whenever it changes.
    Progress(u8),
    Finished(LoadOutcome),
}

// ===== Synchronous load =====

/// Read a whole log from any seekable source.
///
/// `progress` receives each new percentage. `cancel` is polled once per
/// record.
pub fn load_from_reader<R: Read + Seek>(
    source: R,
    cancel: &AtomicBool,
    mut progress: impl FnMut(u8),
) -> LoadOutcome {
    let mut reader = match LogReader::new(source) {
        Ok(reader) => reader,
        Err(err) => {
            warn!(error = %err, "Log header rejected");
            return LoadOutcome::Failed(LoadError::Header(err));
        }
    };

    let mut builder = StoreBuilder::new();
    let mut last_percent = None;
    let mut failure = None;

    loop {
        if cancel.load(Ordering::Relaxed) {
            debug!(records = builder.len(), "Load cancelled");
            return LoadOutcome::Failed(LoadError::Cancelled);
        }
        match reader.read_record() {
            Ok(Some(raw)) => {
                builder.push(raw, reader.in_circular_part());
            }
            Ok(None) => break,
            Err(err) => {
                warn!(error = %err, records = builder.len(), "Load stopped at malformed record");
                failure = Some(err);
                break;
            }
        }
        let percent = reader.percent_read();
        if last_percent != Some(percent) {
            last_percent = Some(percent);
            progress(percent);
        }
    }

    let summary = reader.summary();
    reader.close_log_file();
    if last_percent != Some(100) {
        progress(100);
    }

    let store = builder.finish(summary);
    let notice = match failure {
        Some(err) => Some(LoadNotice::Incomplete(err)),
        None if store.is_empty() => Some(LoadNotice::Empty),
        None => None,
    };
    LoadOutcome::Loaded { store, notice }
}

/// Open `path` for reading.
///
/// # Errors
///
/// `FileNotFound` if the path does not exist, `Io` for any other failure.
pub fn open_log_file(path: &Path) -> Result<BufReader<File>, InputError> {
    if !path.exists() {
        return Err(InputError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    Ok(BufReader::new(File::open(path)?))
}

/// Open and read `path` on the calling thread.
pub fn load_blocking(path: &Path, cancel: &AtomicBool, progress: impl FnMut(u8)) -> LoadOutcome {
    match open_log_file(path) {
        Ok(file) => load_from_reader(file, cancel, progress),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Cannot open log file");
            LoadOutcome::Failed(LoadError::Io(err))
        }
    }
}

// ===== Background load =====

/// A load running on a worker thread. Dropping the handle cancels the load.
#[derive(Debug)]
pub struct LoadHandle {
    cancel: Arc<AtomicBool>,
    events: Receiver<LoadEvent>,
    worker: Option<JoinHandle<()>>,
    finished: bool,
}

/// Start loading `path` on a new thread.
pub fn spawn_load(path: PathBuf) -> LoadHandle {
    let cancel = Arc::new(AtomicBool::new(false));
    let (tx, events) = mpsc::channel();

    let worker_cancel = Arc::clone(&cancel);
    let worker_tx = tx.clone();
    let spawned = thread::Builder::new()
        .name("txview-load".to_string())
        .spawn(move || {
            let progress_tx = worker_tx.clone();
            let outcome = load_blocking(&path, &worker_cancel, |percent| {
                let _ = progress_tx.send(LoadEvent::Progress(percent));
            });
            if let LoadOutcome::Loaded { store, .. } = &outcome {
                info!(path = %path.display(), records = store.len(), "Load finished");
            }
            let _ = worker_tx.send(LoadEvent::Finished(outcome));
        });

    let worker = match spawned {
        Ok(worker) => Some(worker),
        Err(err) => {
            warn!(error = %err, "Cannot start load worker");
            let outcome = LoadOutcome::Failed(LoadError::Io(InputError::Io(err)));
            let _ = tx.send(LoadEvent::Finished(outcome));
            None
        }
    };

    LoadHandle {
        cancel,
        events,
        worker,
        finished: false,
    }
}

impl LoadHandle {
    /// Ask the worker to stop. It notices before the next record.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Next event without blocking.
    ///
    /// A worker that vanished without reporting yields a single
    /// `Finished(Failed(WorkerLost))`.
    pub fn try_next(&mut self) -> Option<LoadEvent> {
        if self.finished {
            return None;
        }
        match self.events.try_recv() {
            Ok(event) => Some(self.observe(event)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(self.lost()),
        }
    }

    /// Block until the next event.
    pub fn next_blocking(&mut self) -> Option<LoadEvent> {
        if self.finished {
            return None;
        }
        match self.events.recv() {
            Ok(event) => Some(self.observe(event)),
            Err(_) => Some(self.lost()),
        }
    }

    /// Block until the load finishes, forwarding progress to `progress`.
    pub fn wait(mut self, mut progress: impl FnMut(u8)) -> LoadOutcome {
        while let Some(event) = self.next_blocking() {
            match event {
                LoadEvent::Progress(percent) => progress(percent),
                LoadEvent::Finished(outcome) => return outcome,
            }
        }
        LoadOutcome::Failed(LoadError::WorkerLost)
    }

    /// A load cancelled after the worker already finished still reports
    /// `Cancelled`, so a cancel request always leaves prior state alone.
    fn observe(&mut self, event: LoadEvent) -> LoadEvent {
        let LoadEvent::Finished(outcome) = event else {
            return event;
        };
        self.finished = true;
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        match outcome {
            LoadOutcome::Loaded { .. } if self.is_cancelled() => {
                LoadEvent::Finished(LoadOutcome::Failed(LoadError::Cancelled))
            }
            outcome => LoadEvent::Finished(outcome),
        }
    }

    fn lost(&mut self) -> LoadEvent {
        self.finished = true;
        LoadEvent::Finished(LoadOutcome::Failed(LoadError::WorkerLost))
    }
}

impl Drop for LoadHandle {
    fn drop(&mut self) {
        if !self.finished {
            self.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::TraceScript;
    use crate::model::error::FormatErrorKind;
    use std::io::Cursor;

    fn script() -> TraceScript {
        let mut script = TraceScript::new();
        for i in 0..50 {
            script.message(&format!("message {i}"));
        }
        script
    }

    fn load_bytes(bytes: Vec<u8>) -> (LoadOutcome, Vec<u8>) {
        let mut seen = Vec::new();
        let outcome = load_from_reader(Cursor::new(bytes), &AtomicBool::new(false), |p| {
            seen.push(p)
        });
        (outcome, seen)
    }

    #[test]
    fn loads_every_record_and_reports_progress() {
        let (outcome, progress) = load_bytes(script().to_file().build().unwrap());
        match outcome {
            LoadOutcome::Loaded { store, notice } => {
                assert_eq!(store.len(), 50);
                assert_eq!(notice, None);
            }
            other => panic!("expected a loaded store, got {other:?}"),
        }
        assert_eq!(progress.last(), Some(&100));
        assert!(progress.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn malformed_record_keeps_earlier_records() {
        let mut bytes = script().to_file().build().unwrap();
        bytes.truncate(bytes.len() - 5);
        let (outcome, _) = load_bytes(bytes);
        match outcome {
            LoadOutcome::Loaded {
                store,
                notice: Some(LoadNotice::Incomplete(err)),
            } => {
                assert_eq!(store.len(), 49);
                assert_eq!(err.kind, FormatErrorKind::Truncated);
            }
            other => panic!("expected an incomplete load, got {other:?}"),
        }
    }

    #[test]
    fn empty_file_is_a_notice_not_an_error() {
        let bytes = TraceScript::new().to_file().build().unwrap();
        let (outcome, _) = load_bytes(bytes);
        assert!(matches!(
            outcome,
            LoadOutcome::Loaded {
                notice: Some(LoadNotice::Empty),
                ..
            }
        ));
    }

    #[test]
    fn bad_header_fails_the_load() {
        let (outcome, _) = load_bytes(b"not a trace log at all, clearly".to_vec());
        match outcome {
            LoadOutcome::Failed(LoadError::Header(err)) => {
                assert_eq!(err.kind, FormatErrorKind::BadMagic);
                assert_eq!(err.offset, 0);
            }
            other => panic!("expected a rejected header, got {other:?}"),
        }
    }

    #[test]
    fn zero_byte_file_fails_the_load() {
        let (outcome, _) = load_bytes(Vec::new());
        assert!(matches!(outcome, LoadOutcome::Failed(LoadError::Header(_))));
    }

    #[test]
    fn cancelled_load_discards_partial_results() {
        let cancel = AtomicBool::new(true);
        let bytes = script().to_file().build().unwrap();
        let outcome = load_from_reader(Cursor::new(bytes), &cancel, |_| {});
        assert!(matches!(outcome, LoadOutcome::Failed(LoadError::Cancelled)));
    }

    #[test]
    fn missing_file_fails_with_not_found() {
        let outcome = load_blocking(
            Path::new("/nonexistent/txview/missing.tx1"),
            &AtomicBool::new(false),
            |_| {},
        );
        assert!(matches!(
            outcome,
            LoadOutcome::Failed(LoadError::Io(InputError::FileNotFound { .. }))
        ));
    }

    #[test]
    fn spawned_load_delivers_single_finished_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.tx1");
        script().to_file().write_to(&path).unwrap();

        let mut handle = spawn_load(path);
        let mut finished = 0;
        let mut records = 0;
        while let Some(event) = handle.next_blocking() {
            if let LoadEvent::Finished(LoadOutcome::Loaded { store, .. }) = event {
                finished += 1;
                records = store.len();
            }
        }
        assert_eq!(finished, 1);
        assert_eq!(records, 50);
        assert!(handle.is_finished());
        assert!(handle.try_next().is_none());
    }

    #[test]
    fn cancel_before_wait_always_reports_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.tx1");
        script().to_file().write_to(&path).unwrap();

        let handle = spawn_load(path);
        handle.cancel();
        let outcome = handle.wait(|_| {});
        assert!(matches!(outcome, LoadOutcome::Failed(LoadError::Cancelled)));
    }

    #[test]
    fn wait_returns_outcome() {
        let handle = spawn_load(PathBuf::from("/nonexistent/txview/missing.tx1"));
        let outcome = handle.wait(|_| {});
        assert!(matches!(outcome, LoadOutcome::Failed(LoadError::Io(_))));
    }
}
