//! Repair of entry/exit pairs broken by ring-buffer wraparound.
//!
//! Once the ring region has wrapped, the last record of the head region and the
//! first surviving ring record are adjacent in the stream but not in time. Calls
//! still open at the end of the head lost their exits, and exits at the start of
//! the ring lost their entries. [`WrapReconciler`] watches records as they are
//! read and afterwards inserts one synthetic record per missing partner:
//!
//! - synthetic exits (deepest first per thread) right after the last head record,
//!   numbered upward from it and stamped with its time;
//! - synthetic entries (outermost first per thread) right after those, numbered so
//!   they end just before the first ring record and stamped with its time.
//!
//! Store positions from the insertion point onward are renumbered.

use std::collections::BTreeMap;
use tracing::debug;

use crate::model::record::{Record, RecordKind};
use crate::model::registry::ThreadRef;

/// Tracks open calls on both sides of the head/ring boundary.
#[derive(Debug, Default)]
pub struct WrapReconciler {
    /// Head region: per thread, `(depth, index)` of entries not yet exited.
    head_open: BTreeMap<ThreadRef, Vec<(u8, usize)>>,
    /// Ring region: per thread, depths of entries opened inside the ring.
    ring_open: BTreeMap<ThreadRef, Vec<u8>>,
    /// Ring exits whose entry was never seen, in read order.
    orphan_exits: Vec<usize>,
    last_head: Option<usize>,
    first_ring: Option<usize>,
}

impl WrapReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next record in read order. `record.index` must already be its
    /// position in the raw sequence.
    pub fn observe(&mut self, record: &Record, in_ring: bool) {
        if in_ring {
            self.first_ring.get_or_insert(record.index);
            let open = self.ring_open.entry(record.thread).or_default();
            match record.kind {
                RecordKind::Entry => open.push(record.depth),
                RecordKind::Exit => {
                    if !close_innermost(open, record.depth, |depth| *depth) {
                        self.orphan_exits.push(record.index);
                    }
                }
                RecordKind::Message => {}
            }
        } else {
            self.last_head = Some(record.index);
            let open = self.head_open.entry(record.thread).or_default();
            match record.kind {
                RecordKind::Entry => open.push((record.depth, record.index)),
                RecordKind::Exit => {
                    close_innermost(open, record.depth, |(depth, _)| *depth);
                }
                RecordKind::Message => {}
            }
        }
    }

    /// Number of synthetic exits that [`apply`](Self::apply) would insert.
    pub fn pending_exits(&self) -> usize {
        self.head_open.values().map(Vec::len).sum()
    }

    /// Number of synthetic entries that [`apply`](Self::apply) would insert.
    pub fn pending_entries(&self) -> usize {
        self.orphan_exits.len()
    }

    /// Insert the synthetic records into `records` and renumber positions.
    ///
    /// Does nothing unless ring records were read and the ring has wrapped; an
    /// unwrapped ring continues the head without loss. Returns the number of
    /// records inserted.
    pub fn apply(self, records: &mut Vec<Record>, ring_wrapped: bool) -> usize {
        let Some(first_ring) = self.first_ring else {
            return 0;
        };
        if !ring_wrapped {
            return 0;
        }

        let mut synthetic = Vec::with_capacity(self.pending_exits() + self.pending_entries());

        if let Some(last_head) = self.last_head {
            let anchor = &records[last_head];
            let (mut msg_num, time) = (anchor.msg_num, anchor.time);
            for open in self.head_open.values() {
                for &(_, index) in open.iter().rev() {
                    msg_num = msg_num.wrapping_add(1);
                    synthetic.push(records[index].synthesize(RecordKind::Exit, msg_num, time));
                }
            }
        }
        let exits = synthetic.len();

        let anchor = &records[first_ring];
        let time = anchor.time;
        let mut msg_num = anchor
            .msg_num
            .saturating_sub(self.orphan_exits.len() as u32);
        for &index in self.orphan_exits.iter().rev() {
            synthetic.push(records[index].synthesize(RecordKind::Entry, msg_num, time));
            msg_num = msg_num.wrapping_add(1);
        }

        let inserted = synthetic.len();
        debug!(
            exits,
            entries = inserted - exits,
            at = first_ring,
            "Reconciled ring-buffer wraparound"
        );

        if inserted > 0 {
            records.splice(first_ring..first_ring, synthetic);
            for (index, record) in records.iter_mut().enumerate().skip(first_ring) {
                record.index = index;
            }
        }
        inserted
    }
}

/// Pop the open call at `depth`, discarding any deeper calls left unclosed.
/// Returns false if no call at that depth is open.
fn close_innermost<T>(open: &mut Vec<T>, depth: u8, depth_of: impl Fn(&T) -> u8) -> bool {
    while open.last().is_some_and(|top| depth_of(top) > depth) {
        open.pop();
    }
    if open.last().is_some_and(|top| depth_of(top) == depth) {
        open.pop();
        true
    } else {
        false
    }
}
