//! Projection of visible records into a dense row sequence.
//!
//! A row is one displayed line: `(record, line)`. The projector owns the row
//! vector and writes each visible record's row indices back onto the record
//! so a record can find its rows in O(1).
//!
//! # Rebuild contract
//!
//! [`RowProjector::rebuild_rows`] keeps rows `[0, start_row)` and regenerates
//! everything after them by walking records from `start_record`. The caller
//! guarantees that no record before `start_record` changed visibility and
//! that `start_row` is the number of rows those records produce. Any change
//! to the filter axes must instead rebuild from zero.

use tracing::debug;

use super::filter::VisibilityFilter;
use crate::model::record::Record;
use crate::model::registry::Registries;

/// One displayed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Row {
    /// Store index of the record.
    pub record: usize,
    /// Line within the record.
    pub line: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RowProjector {
    rows: Vec<Row>,
}

impl RowProjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual row count.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Row> {
        self.rows.get(index).copied()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Regenerate rows from `start_row`, walking records from `start_record`.
    ///
    /// Returns the new row count.
    pub fn rebuild_rows(
        &mut self,
        start_row: usize,
        start_record: usize,
        records: &mut [Record],
        registries: &Registries,
        filter: &VisibilityFilter,
    ) -> usize {
        self.rows.truncate(start_row);

        let tail = records.get_mut(start_record..).unwrap_or_default();
        for record in tail {
            record.first_row = None;
            record.row_indices.fill(None);

            if !filter.is_visible(record, registries) {
                continue;
            }

            record.first_row = Some(self.rows.len());
            for line in 0..record.shown_line_count() {
                record.row_indices[line] = Some(self.rows.len());
                self.rows.push(Row {
                    record: record.index,
                    line,
                });
            }
        }

        debug!(start_row, start_record, rows = self.rows.len(), "Rebuilt rows");
        self.rows.len()
    }

    /// Full rebuild from the first record.
    pub fn rebuild_all(
        &mut self,
        records: &mut [Record],
        registries: &Registries,
        filter: &VisibilityFilter,
    ) -> usize {
        self.rebuild_rows(0, 0, records, registries, filter)
    }
}
