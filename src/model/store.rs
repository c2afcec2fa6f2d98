//! The ordered, indexed record sequence of one loaded file.
//!
//! [`StoreBuilder`] receives records in read order, interns their identities,
//! and feeds the wrap reconciler. [`StoreBuilder::finish`] applies the
//! reconciliation, resolves caller back-references and computes registry
//! counts, producing a [`RecordStore`].

use tracing::{debug, info};

use super::record::{LevelMask, RawRecord, Record, RecordKind};
use super::registry::Registries;
use crate::parser::reconcile::WrapReconciler;

/// Facts about the read that the store needs once reading is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadSummary {
    pub format_version: u32,
    pub levels_found: LevelMask,
    /// The ring region exists and has overwritten its oldest records.
    pub ring_wrapped: bool,
}

// ===== StoreBuilder =====

/// Accumulates records during a load.
#[derive(Debug, Default)]
pub struct StoreBuilder {
    records: Vec<Record>,
    registries: Registries,
    reconciler: WrapReconciler,
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Append the next record read from the file.
    pub fn push(&mut self, raw: RawRecord, in_ring: bool) -> &Record {
        let thread = self.registries.threads.intern(raw.thread_id);
        let thread_name = self.registries.thread_names.intern(raw.thread_name.clone());
        let logger = self.registries.loggers.intern(raw.logger.clone());

        let mut record = Record::new(raw, thread, thread_name, logger);
        record.index = self.records.len();
        self.reconciler.observe(&record, in_ring);
        self.records.push(record);
        &self.records[self.records.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn finish(self, summary: ReadSummary) -> RecordStore {
        let Self {
            mut records,
            registries,
            reconciler,
        } = self;

        let inserted = reconciler.apply(&mut records, summary.ring_wrapped);

        let mut store = RecordStore {
            records,
            registries,
            levels_found: summary.levels_found,
            format_version: summary.format_version,
            synthetic_count: inserted,
        };
        store.resolve_callers();
        store.recount();

        info!(
            records = store.len(),
            synthetic = inserted,
            threads = store.registries.threads.len(),
            loggers = store.registries.loggers.len(),
            "Record store built"
        );
        store
    }
}

// ===== RecordStore =====

/// Owns every record of a loaded file plus its identity registries.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: Vec<Record>,
    registries: Registries,
    levels_found: LevelMask,
    format_version: u32,
    synthetic_count: usize,
}

impl RecordStore {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    pub fn registries_mut(&mut self) -> &mut Registries {
        &mut self.registries
    }

    /// Union of every level seen while reading.
    pub fn levels_found(&self) -> LevelMask {
        self.levels_found
    }

    pub fn format_version(&self) -> u32 {
        self.format_version
    }

    /// Number of records generated by wrap reconciliation.
    pub fn synthetic_count(&self) -> usize {
        self.synthetic_count
    }

    pub(crate) fn records_mut(&mut self) -> &mut [Record] {
        &mut self.records
    }

    /// Records mutably alongside the registries, for row projection.
    pub(crate) fn split_mut(&mut self) -> (&mut [Record], &Registries) {
        (&mut self.records, &self.registries)
    }

    /// Toggle the collapsed state of a method entry.
    ///
    /// Every same-thread record strictly between the entry and its exit (the
    /// next same-thread record at the entry's depth) has its collapsed depth
    /// raised or lowered by one. Returns false if `index` is not an entry.
    pub fn expand_collapse_method(&mut self, index: usize) -> bool {
        let Some(entry) = self.records.get_mut(index) else {
            return false;
        };
        if entry.kind != RecordKind::Entry {
            return false;
        }

        let collapse = !entry.collapsed;
        entry.collapsed = collapse;
        let (thread, depth) = (entry.thread, entry.depth);

        let mut touched = 0usize;
        for record in &mut self.records[index + 1..] {
            if record.thread != thread {
                continue;
            }
            if record.depth == depth {
                break;
            }
            if collapse {
                record.collapsed_depth += 1;
            } else {
                debug_assert!(record.collapsed_depth > 0, "collapsed depth underflow");
                record.collapsed_depth = record.collapsed_depth.saturating_sub(1);
            }
            touched += 1;
        }

        debug!(index, collapse, touched, "Toggled method collapse");
        true
    }

    /// Toggle whether a multi-line message shows all its lines or just the
    /// first. Returns false for single-line records and method records.
    pub fn toggle_lines(&mut self, index: usize) -> bool {
        match self.records.get_mut(index) {
            Some(record) if record.kind == RecordKind::Message && record.has_newlines() => {
                record.collapsed = !record.collapsed;
                true
            }
            _ => false,
        }
    }

    /// Clear every collapse, restoring all records to display eligibility.
    pub fn expand_all(&mut self) {
        for record in &mut self.records {
            record.collapsed = false;
            record.collapsed_depth = 0;
        }
    }

    /// Recompute registry record counts from scratch.
    pub fn recount(&mut self) {
        self.registries.threads.reset_counts();
        self.registries.thread_names.reset_counts();
        self.registries.loggers.reset_counts();
        for record in &self.records {
            self.registries.threads.bump(record.thread);
            self.registries.thread_names.bump(record.thread_name);
            self.registries.loggers.bump(record.logger);
        }
    }

    /// Turn stored caller message numbers into store indices.
    ///
    /// A reference is kept only if it points backward to an entry on the same
    /// thread that is shallower than the record (or equally deep, for exits,
    /// whose caller is their own entry). Anything else falls back to the
    /// stack-depth heuristic at lookup time.
    fn resolve_callers(&mut self) {
        let mut latest = std::collections::HashMap::new();
        let mut resolved = 0usize;

        for index in 0..self.records.len() {
            let record = &self.records[index];
            let caller = record
                .caller_msg_num
                .and_then(|msg_num| latest.get(&msg_num).copied())
                .filter(|&caller: &usize| {
                    let candidate = &self.records[caller];
                    let limit = u16::from(record.depth) + u16::from(record.is_exit());
                    candidate.is_entry()
                        && candidate.thread == record.thread
                        && u16::from(candidate.depth) < limit
                });
            if !record.synthetic {
                latest.insert(record.msg_num, index);
            }
            if caller.is_some() {
                resolved += 1;
            }
            self.records[index].caller = caller;
        }

        debug!(resolved, "Resolved caller back-references");
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
