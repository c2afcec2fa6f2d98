//! Background loading through the session API, against real files.

use std::path::Path;
use std::time::{Duration, Instant};

use txview::fixture::TraceScript;
use txview::model::error::LoadError;
use txview::model::record::TraceLevel;
use txview::source::loader::LoadNotice;
use txview::state::search::{Direction, SearchEngine, SearchOutcome};
use txview::state::session::{LogSession, SessionEvent, SessionOptions};
use txview::view_state::matcher::{MatchMode, StringMatcher};

fn wrapped_log(path: &Path, extra: usize) {
    let mut script = TraceScript::new();
    script.enter("Main loop");
    for i in 0..20 {
        script.message(&format!("head {i}"));
    }
    script.start_ring();
    for i in 0..(40 + extra) {
        let level = if i % 10 == 0 {
            TraceLevel::Error
        } else {
            TraceLevel::Info
        };
        script.level(level).message(&format!("ring {i}"));
    }
    script.level(TraceLevel::Info).exit().overwrite_oldest(5);
    script.to_file().write_to(path).unwrap();
}

fn poll_until_done(session: &mut LogSession) -> SessionEvent {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        for event in session.poll() {
            if !matches!(event, SessionEvent::Progress(_)) {
                return event;
            }
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    panic!("load did not finish");
}

#[test]
fn wrapped_file_loads_in_background() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("service.tx1");
    wrapped_log(&path, 0);

    let mut session = LogSession::open(&path, SessionOptions::default());
    let event = poll_until_done(&mut session);
    assert!(matches!(event, SessionEvent::Loaded { notice: None }));

    let view = session.view().unwrap();
    // 1 entry + 20 head + 35 surviving ring + 1 exit + 2 synthetic
    assert_eq!(view.store().len(), 59);
    assert_eq!(view.store().synthetic_count(), 2);
    assert_eq!(view.row_count(), 59);
}

#[test]
fn search_and_filters_survive_refresh() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("service.tx1");
    wrapped_log(&path, 0);

    let options = SessionOptions {
        auto_refresh: true,
        refresh_interval: Duration::ZERO,
        ..SessionOptions::default()
    };
    let mut session = LogSession::open(&path, options);
    session.wait(|_| {});

    let view = session.view_mut().unwrap();
    view.set_level_visible(TraceLevel::Info, false);
    let errors = view.row_count();
    assert!(errors > 0);
    let mut engine = SearchEngine::new();
    let matcher = StringMatcher::new("ring 30", MatchMode::Substring).unwrap();
    let SearchOutcome::Found(row) = engine.search(view, matcher, Direction::Down, false) else {
        panic!("ring 30 is an error record and should be found");
    };

    wrapped_log(&path, 10);
    let file = std::fs::File::options().write(true).open(&path).unwrap();
    file.set_modified(std::time::SystemTime::now() + Duration::from_secs(30))
        .unwrap();
    assert!(session.poll_refresh(Instant::now()));
    assert!(matches!(
        poll_until_done(&mut session),
        SessionEvent::Loaded { .. }
    ));

    let view = session.view().unwrap();
    assert!(!view.filter().levels().contains(TraceLevel::Info));
    assert_eq!(view.row_count(), errors + 1, "one more error record");
    assert_eq!(view.focus(), Some(row));
}

#[test]
fn missing_file_reports_failure_and_no_view() {
    let mut session = LogSession::open("/nonexistent/txview/gone.tx1", SessionOptions::default());
    let event = poll_until_done(&mut session);
    assert!(matches!(event, SessionEvent::Failed(LoadError::Io(_))));
    assert!(session.view().is_none());
}

#[test]
fn empty_log_is_loaded_with_notice() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.tx1");
    TraceScript::new().to_file().write_to(&path).unwrap();

    let mut session = LogSession::open(&path, SessionOptions::default());
    let event = poll_until_done(&mut session);
    assert!(matches!(
        event,
        SessionEvent::Loaded {
            notice: Some(LoadNotice::Empty)
        }
    ));
    assert_eq!(session.view().unwrap().row_count(), 0);
    assert_eq!(session.view().unwrap().focus(), None);
}
