//! Caller and end-of-method lookup by stack depth.
//!
//! Both scans only look at records on the same thread as the starting record.
//! A missing caller is a defined result: the record is either outermost or
//! its caller's entry was lost to ring-buffer wraparound, and the two cases
//! cannot be told apart.

use crate::model::record::Record;
use crate::model::store::RecordStore;
use crate::view_state::LogView;

/// Where a navigation request ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavTarget {
    /// The target record is shown; focus moved to this row.
    Row(usize),
    /// The target record exists but is filtered out or collapsed.
    Hidden(usize),
    /// No such record.
    NotFound,
}

/// Entry record of the method that contains `index`.
///
/// Uses the record's stored caller reference when one was resolved at load,
/// otherwise scans backward by stack depth.
pub fn find_caller(store: &RecordStore, index: usize) -> Option<usize> {
    let record = store.get(index)?;
    match record.caller() {
        Some(caller) if caller < index => Some(caller),
        _ => find_caller_by_depth(store, index),
    }
}

/// Backward scan for the nearest same-thread entry shallower than every
/// record passed on the way.
pub fn find_caller_by_depth(store: &RecordStore, index: usize) -> Option<usize> {
    let records = store.records();
    let record = records.get(index)?;
    let mut min_depth = u16::from(record.depth()) + u16::from(record.is_exit());

    for candidate in records[..index].iter().rev() {
        if min_depth == 0 {
            break;
        }
        if candidate.thread() != record.thread() {
            continue;
        }
        let depth = u16::from(candidate.depth());
        if depth < min_depth {
            if candidate.is_entry() {
                return Some(candidate.index());
            }
            min_depth = depth;
        }
    }
    None
}

/// First same-thread record after `index` that leaves the method.
///
/// For an entry this is its own exit; for anything else it is the exit of
/// the enclosing method.
pub fn end_of_method(store: &RecordStore, index: usize) -> Option<usize> {
    let records = store.records();
    let record = records.get(index)?;
    let trigger = u16::from(record.depth()) + u16::from(record.is_entry());

    records[index + 1..]
        .iter()
        .find(|r| r.thread() == record.thread() && u16::from(r.depth()) < trigger)
        .map(Record::index)
}

/// Callers of `index`, outermost first.
pub fn call_stack(store: &RecordStore, index: usize) -> Vec<usize> {
    let mut stack = Vec::new();
    let mut current = index;
    while let Some(caller) = find_caller(store, current) {
        stack.push(caller);
        current = caller;
    }
    stack.reverse();
    stack
}

/// Focus the row of `target` if it is shown.
pub fn go_to_record(view: &mut LogView, target: Option<usize>) -> NavTarget {
    let Some(index) = target else {
        return NavTarget::NotFound;
    };
    match view.store().get(index).and_then(Record::first_row) {
        Some(row) => {
            view.set_focus(row);
            NavTarget::Row(row)
        }
        None => NavTarget::Hidden(index),
    }
}

/// Move focus to the caller of the focused record.
pub fn go_to_caller(view: &mut LogView) -> NavTarget {
    let target = view
        .focused_record()
        .map(Record::index)
        .and_then(|index| find_caller(view.store(), index));
    go_to_record(view, target)
}

/// Move focus to the exit of the method containing the focused record.
pub fn go_to_end_of_method(view: &mut LogView) -> NavTarget {
    let target = view
        .focused_record()
        .map(Record::index)
        .and_then(|index| end_of_method(view.store(), index));
    go_to_record(view, target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::TraceScript;
    use crate::model::record::TraceLevel;

    // 0 A entered          (0)
    // 1   a1               (1)
    // 2   B entered        (1)
    // 3     b1             (2)
    // 4   B exiting        (1)
    // 5   a2               (1)
    // 6 A exiting          (0)
    // 7 top                (0)
    fn script() -> TraceScript {
        let mut script = TraceScript::new();
        script
            .enter("A")
            .message("a1")
            .enter("B")
            .message("b1")
            .exit()
            .message("a2")
            .exit()
            .message("top");
        script
    }

    /// Same records without caller references, as an old-format file reads.
    fn heuristic_store() -> RecordStore {
        let script = script();
        let mut builder = crate::model::store::StoreBuilder::new();
        for raw in script.records() {
            let mut raw = raw.clone();
            raw.caller_msg_num = None;
            builder.push(raw, false);
        }
        builder.finish(Default::default())
    }

    #[test]
    fn heuristic_finds_enclosing_entry() {
        let store = heuristic_store();
        assert_eq!(find_caller_by_depth(&store, 1), Some(0));
        assert_eq!(find_caller_by_depth(&store, 3), Some(2));
        assert_eq!(find_caller_by_depth(&store, 5), Some(0), "skips closed B");
        assert_eq!(find_caller_by_depth(&store, 2), Some(0));
    }

    #[test]
    fn exit_caller_is_its_own_entry() {
        let store = heuristic_store();
        assert_eq!(find_caller_by_depth(&store, 4), Some(2));
        assert_eq!(find_caller_by_depth(&store, 6), Some(0));
    }

    #[test]
    fn outermost_records_have_no_caller() {
        let store = heuristic_store();
        assert_eq!(find_caller_by_depth(&store, 0), None);
        assert_eq!(find_caller_by_depth(&store, 7), None);
    }

    #[test]
    fn stored_reference_agrees_with_heuristic() {
        let with_refs = script().build_store();
        let without = heuristic_store();
        for index in 0..with_refs.len() {
            assert_eq!(
                find_caller(&with_refs, index),
                find_caller(&without, index),
                "record {index}"
            );
        }
    }

    #[test]
    fn other_threads_are_ignored() {
        let mut script = TraceScript::new();
        script
            .enter("A")
            .thread(2, "Worker")
            .enter("W")
            .thread(1, "Main")
            .message("in A");
        let store = script.build_store();
        assert_eq!(find_caller_by_depth(&store, 2), Some(0));
    }

    #[test]
    fn end_of_method_for_entry_and_body() {
        let store = heuristic_store();
        assert_eq!(end_of_method(&store, 0), Some(6));
        assert_eq!(end_of_method(&store, 2), Some(4));
        assert_eq!(end_of_method(&store, 3), Some(4));
        assert_eq!(end_of_method(&store, 5), Some(6));
        assert_eq!(end_of_method(&store, 7), None);
    }

    #[test]
    fn call_stack_is_outermost_first() {
        let store = script().build_store();
        assert_eq!(call_stack(&store, 3), vec![0, 2]);
        assert!(call_stack(&store, 7).is_empty());
    }

    #[test]
    fn navigation_reports_hidden_targets() {
        let mut script = TraceScript::new();
        script
            .level(TraceLevel::Debug)
            .enter("Quiet")
            .level(TraceLevel::Info)
            .message("loud");
        let mut view = LogView::new(script.build_store());
        view.set_level_visible(TraceLevel::Debug, false);
        view.set_focus(0);

        assert_eq!(go_to_caller(&mut view), NavTarget::Hidden(0));
        assert_eq!(go_to_end_of_method(&mut view), NavTarget::NotFound);
    }

    #[test]
    fn navigation_moves_focus() {
        let mut view = LogView::new(script().build_store());
        view.set_focus(3);
        assert_eq!(go_to_caller(&mut view), NavTarget::Row(2));
        assert_eq!(view.focus(), Some(2));
        assert_eq!(go_to_end_of_method(&mut view), NavTarget::Row(4));
    }
}
