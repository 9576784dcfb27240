// Copyright 2025 Stoolap Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Index Lookup Operator.
//!
//! An in-memory table with a hash index on one key column. Without a bound it
//! scans every row; once a key is pushed with [`BoundPushable::push_bound`]
//! it yields only rows whose key equals the bound. A finished scan stays
//! exhausted until [`BoundPushable::reset_scan_state`] (or `open`) rewinds it.
//!
//! This is the lookup side of an index-probe nested loop join.

use std::sync::Arc;

use log::trace;
use rustc_hash::FxHashMap;

use crate::core::{Error, Result, Row, Value};
use crate::executor::batch::RowBatch;
use crate::executor::operator::{BatchOperator, BoundPushable, ColumnInfo};

/// Default number of rows per batch produced by a lookup
pub const DEFAULT_LOOKUP_BATCH_SIZE: usize = 1024;

/// Hash-indexed lookup source.
pub struct IndexLookupOperator {
    rows: Arc<[Row]>,
    schema: Vec<ColumnInfo>,
    key_column: usize,
    batch_size: usize,

    // Row ids per key; NULL keys are not indexed since NULL never equals
    index: FxHashMap<Value, Vec<usize>>,

    // Scan state
    bound: Option<Value>,
    cursor: usize,
    exhausted: bool,
    current: Option<RowBatch>,

    probes: usize,
    resets: usize,
}

impl IndexLookupOperator {
    /// Build the index over `rows` keyed on `key_column`.
    ///
    /// Fails with `ColumnIndexOutOfBounds` if a row has no such column.
    pub fn new(rows: Vec<Row>, schema: Vec<ColumnInfo>, key_column: usize) -> Result<Self> {
        let mut index: FxHashMap<Value, Vec<usize>> = FxHashMap::default();
        for (row_id, row) in rows.iter().enumerate() {
            let key = row.try_get(key_column)?;
            if !key.is_null() {
                index.entry(key.clone()).or_default().push(row_id);
            }
        }
        let rows: Arc<[Row]> = rows.into_iter().map(Row::into_shared).collect();

        Ok(Self {
            rows,
            schema,
            key_column,
            batch_size: DEFAULT_LOOKUP_BATCH_SIZE,
            index,
            bound: None,
            cursor: 0,
            exhausted: false,
            current: None,
            probes: 0,
            resets: 0,
        })
    }

    /// Set the maximum number of rows per produced batch.
    pub fn with_batch_size(mut self, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::invalid_argument("lookup batch size must be > 0"));
        }
        self.batch_size = batch_size;
        Ok(self)
    }

    pub fn key_column(&self) -> usize {
        self.key_column
    }

    /// The currently pushed bound, if any
    pub fn bound(&self) -> Option<&Value> {
        self.bound.as_ref()
    }

    /// Number of accepted bound pushes since construction
    pub fn probe_count(&self) -> usize {
        self.probes
    }

    /// Number of scan state resets since construction
    pub fn reset_count(&self) -> usize {
        self.resets
    }

    /// Number of distinct non-NULL keys in the index
    pub fn distinct_keys(&self) -> usize {
        self.index.len()
    }

    fn candidate_count(&self) -> usize {
        match &self.bound {
            None => self.rows.len(),
            Some(key) => self.index.get(key).map_or(0, Vec::len),
        }
    }

    fn rewind(&mut self) {
        self.cursor = 0;
        self.exhausted = false;
        self.current = None;
    }
}

impl BatchOperator for IndexLookupOperator {
    fn open(&mut self) -> Result<()> {
        self.bound = None;
        self.rewind();
        Ok(())
    }

    fn next_batch(&mut self) -> Result<Option<RowBatch>> {
        if self.exhausted {
            return Ok(None);
        }

        let total = self.candidate_count();
        if self.cursor >= total {
            self.exhausted = true;
            return Ok(None);
        }

        let end = (self.cursor + self.batch_size).min(total);
        let rows: Vec<Row> = match &self.bound {
            None => self.rows[self.cursor..end].to_vec(),
            Some(key) => match self.index.get(key) {
                Some(ids) => ids[self.cursor..end]
                    .iter()
                    .map(|&id| self.rows[id].clone())
                    .collect(),
                None => Vec::new(),
            },
        };
        trace!(
            "IndexLookup: rows {}..{} of {} for bound {:?}",
            self.cursor,
            end,
            total,
            self.bound
        );
        self.cursor = end;

        let batch = RowBatch::new(rows);
        self.current = Some(batch.clone());
        Ok(Some(batch))
    }

    fn current_batch(&self) -> Option<&RowBatch> {
        self.current.as_ref()
    }

    fn close(&mut self) -> Result<()> {
        self.current = None;
        Ok(())
    }

    fn schema(&self) -> &[ColumnInfo] {
        &self.schema
    }

    fn estimated_rows(&self) -> Option<usize> {
        Some(self.candidate_count())
    }

    fn name(&self) -> &str {
        "IndexLookup"
    }

    fn as_bound_pushable(&mut self) -> Option<&mut dyn BoundPushable> {
        Some(self)
    }
}

impl BoundPushable for IndexLookupOperator {
    fn push_bound(&mut self, column: usize, value: &Value) -> bool {
        if column != self.key_column {
            return false;
        }
        self.bound = Some(value.clone());
        self.probes += 1;
        true
    }

    fn reset_scan_state(&mut self) -> Result<()> {
        self.rewind();
        self.resets += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_lookup() -> IndexLookupOperator {
        let rows = vec![
            Row::from_values(vec![Value::integer(5), Value::text("a")]),
            Row::from_values(vec![Value::integer(6), Value::text("b")]),
            Row::from_values(vec![Value::integer(5), Value::text("c")]),
            Row::from_values(vec![Value::null_unknown(), Value::text("d")]),
        ];
        let schema = vec![ColumnInfo::new("k"), ColumnInfo::new("v")];
        IndexLookupOperator::new(rows, schema, 0).unwrap()
    }

    fn drain_values(op: &mut IndexLookupOperator) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(batch) = op.next_batch().unwrap() {
            out.extend(batch.iter_visible().map(|r| r[1].to_string()));
        }
        out
    }

    #[test]
    fn test_unbound_scans_everything() {
        let mut op = make_lookup();
        op.open().unwrap();
        assert_eq!(drain_values(&mut op), vec!["a", "b", "c", "d"]);
        assert_eq!(op.distinct_keys(), 2);
    }

    #[test]
    fn test_bound_scan_returns_matching_rows() {
        let mut op = make_lookup().with_batch_size(1).unwrap();
        op.open().unwrap();
        assert!(op.push_bound(0, &Value::integer(5)));
        assert_eq!(op.estimated_rows(), Some(2));
        assert_eq!(drain_values(&mut op), vec!["a", "c"]);
        assert_eq!(op.probe_count(), 1);
    }

    #[test]
    fn test_cross_type_numeric_bound() {
        let mut op = make_lookup();
        op.open().unwrap();
        assert!(op.push_bound(0, &Value::float(6.0)));
        assert_eq!(drain_values(&mut op), vec!["b"]);
    }

    #[test]
    fn test_exhausted_until_reset() {
        let mut op = make_lookup();
        op.open().unwrap();
        op.push_bound(0, &Value::integer(5));
        assert_eq!(drain_values(&mut op).len(), 2);

        op.push_bound(0, &Value::integer(6));
        assert!(op.next_batch().unwrap().is_none());

        op.reset_scan_state().unwrap();
        assert_eq!(drain_values(&mut op), vec!["b"]);
        assert_eq!(op.reset_count(), 1);
    }

    #[test]
    fn test_missing_and_null_keys_yield_nothing() {
        let mut op = make_lookup();
        op.open().unwrap();
        op.push_bound(0, &Value::integer(42));
        assert!(drain_values(&mut op).is_empty());

        op.reset_scan_state().unwrap();
        op.push_bound(0, &Value::null_unknown());
        assert!(drain_values(&mut op).is_empty());
    }

    #[test]
    fn test_rejects_other_column() {
        let mut op = make_lookup();
        assert!(!op.push_bound(1, &Value::text("a")));
        assert!(op.bound().is_none());
        assert_eq!(op.probe_count(), 0);
    }

    #[test]
    fn test_open_clears_bound() {
        let mut op = make_lookup();
        op.open().unwrap();
        op.push_bound(0, &Value::integer(6));
        op.open().unwrap();
        assert!(op.bound().is_none());
        assert_eq!(drain_values(&mut op).len(), 4);
    }

    #[test]
    fn test_construction_errors() {
        let rows = vec![Row::from_values(vec![Value::integer(1)])];
        assert!(matches!(
            IndexLookupOperator::new(rows, vec![], 2),
            Err(Error::ColumnIndexOutOfBounds { index: 2 })
        ));
        assert!(make_lookup().with_batch_size(0).is_err());
    }
}
