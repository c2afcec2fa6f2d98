//! Tests for store construction and collapse bookkeeping.

use super::*;
use crate::fixture::TraceScript;

fn nested() -> RecordStore {
    // 0 A entered
    // 1   a1
    // 2   B entered
    // 3     b1
    // 4   B exiting
    // 5 A exiting
    // 6 tail
    let mut script = TraceScript::new();
    script
        .enter("A")
        .message("a1")
        .enter("B")
        .message("b1")
        .exit()
        .exit()
        .message("tail");
    script.build_store()
}

fn collapsed_depths(store: &RecordStore) -> Vec<u32> {
    store.iter().map(Record::collapsed_depth).collect()
}

#[test]
fn finish_assigns_contiguous_indices() {
    let store = nested();
    assert_eq!(store.len(), 7);
    for (i, record) in store.iter().enumerate() {
        assert_eq!(record.index(), i);
    }
    assert_eq!(store.synthetic_count(), 0);
}

#[test]
fn registry_counts_match_records() {
    let mut script = TraceScript::new();
    script
        .message("main 1")
        .thread(2, "Worker")
        .logger("Net")
        .message("worker 1")
        .message("worker 2");
    let store = script.build_store();
    let regs = store.registries();

    let main = regs.threads.find(&1).unwrap();
    let worker = regs.threads.find(&2).unwrap();
    assert_eq!(regs.threads.get(main).unwrap().count(), 1);
    assert_eq!(regs.threads.get(worker).unwrap().count(), 2);

    let net = regs.loggers.find(&"Net".to_string()).unwrap();
    assert_eq!(regs.loggers.get(net).unwrap().count(), 2);
    assert_eq!(regs.thread_names.len(), 2);
}

#[test]
fn collapse_hides_body_but_not_exit() {
    let mut store = nested();
    assert!(store.expand_collapse_method(0));

    assert!(store.get(0).unwrap().is_collapsed());
    assert_eq!(collapsed_depths(&store), vec![0, 1, 1, 1, 1, 0, 0]);
}

#[test]
fn nested_collapse_stacks_and_unwinds() {
    let mut store = nested();
    store.expand_collapse_method(2);
    store.expand_collapse_method(0);
    assert_eq!(collapsed_depths(&store), vec![0, 1, 1, 2, 1, 0, 0]);

    store.expand_collapse_method(0);
    assert_eq!(collapsed_depths(&store), vec![0, 0, 0, 1, 0, 0, 0]);
    assert!(!store.get(3).unwrap().is_eligible_for_display());

    store.expand_collapse_method(2);
    assert_eq!(collapsed_depths(&store), vec![0; 7]);
}

#[test]
fn collapse_ignores_other_threads() {
    let mut script = TraceScript::new();
    script
        .enter("A")
        .thread(2, "Worker")
        .message("other thread")
        .thread(1, "Main")
        .message("inside A")
        .exit();
    let mut store = script.build_store();

    store.expand_collapse_method(0);
    assert_eq!(collapsed_depths(&store), vec![0, 0, 1, 0]);
}

#[test]
fn collapse_rejects_non_entries() {
    let mut store = nested();
    assert!(!store.expand_collapse_method(1));
    assert!(!store.expand_collapse_method(5));
    assert!(!store.expand_collapse_method(99));
    assert_eq!(collapsed_depths(&store), vec![0; 7]);
}

#[test]
fn collapse_of_unclosed_entry_runs_to_end() {
    let mut script = TraceScript::new();
    script.enter("Open").message("x").message("y");
    let mut store = script.build_store();
    store.expand_collapse_method(0);
    assert_eq!(collapsed_depths(&store), vec![0, 1, 1]);
}

#[test]
fn toggle_lines_only_applies_to_multiline_messages() {
    let mut script = TraceScript::new();
    script.message("one").message("two\nlines").enter("M");
    let mut store = script.build_store();

    assert!(!store.toggle_lines(0));
    assert!(store.toggle_lines(1));
    assert!(store.get(1).unwrap().is_collapsed());
    assert!(!store.toggle_lines(2));

    assert!(store.toggle_lines(1));
    assert!(!store.get(1).unwrap().is_collapsed());
}

#[test]
fn expand_all_clears_every_collapse() {
    let mut store = nested();
    store.expand_collapse_method(2);
    store.expand_collapse_method(0);
    store.expand_all();

    assert_eq!(collapsed_depths(&store), vec![0; 7]);
    assert!(store.iter().all(|r| !r.is_collapsed()));
}

#[test]
fn callers_resolve_to_enclosing_entries() {
    let store = nested();
    let callers: Vec<_> = store.iter().map(Record::caller).collect();
    assert_eq!(
        callers,
        vec![None, Some(0), Some(0), Some(2), Some(2), Some(0), None]
    );
}

#[test]
fn caller_reference_to_deeper_record_is_dropped() {
    let mut script = TraceScript::new();
    script.enter("A").message("inside").exit();
    let mut raws = script.records().to_vec();
    // Point the entry at its own exit, which is neither earlier nor shallower.
    raws[0].caller_msg_num = Some(3);

    let mut builder = StoreBuilder::new();
    for raw in raws {
        builder.push(raw, false);
    }
    let store = builder.finish(ReadSummary::default());
    assert_eq!(store.get(0).unwrap().caller(), None);
    assert_eq!(store.get(1).unwrap().caller(), Some(0));
}

#[test]
fn wrapped_store_counts_synthetic_records() {
    let mut script = TraceScript::new();
    script.enter("Outer").message("head");
    script.start_ring();
    script.message("lost").exit();
    script.overwrite_oldest(1);
    let store = script.build_store();

    // Outer stays open in the head and its exit arrives orphaned in the ring.
    assert_eq!(store.synthetic_count(), 2);
    assert!(store.get(2).unwrap().is_synthetic());
    assert!(store.get(2).unwrap().is_exit());
    assert!(store.get(3).unwrap().is_synthetic());
    assert!(store.get(3).unwrap().is_entry());
}
