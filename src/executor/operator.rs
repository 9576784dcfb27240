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

//! Volcano-style batch operator interface.
//!
//! Operators pull batches from their children on demand. A join sits on top
//! of two children and pulls from each as its control loop requires:
//!
//! ```text
//! ┌──────────────┐
//! │ Consumer     │ ← Pulls batches via next_batch()
//! └──────┬───────┘
//!        │
//! ┌──────▼───────┐
//! │ NL Join      │ ← Buffers batches, pairs them, null-extends
//! └──────┬───────┘
//!        │
//! ┌──────┴──────┐
//! │             │
//! ▼             ▼
//! ┌─────┐   ┌────────┐
//! │Scan │   │ Lookup │ ← Optionally accepts a pushed key bound
//! └─────┘   └────────┘
//! ```

use crate::core::{Result, Row, Value};

use super::batch::RowBatch;

/// Column information for operator schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column name
    pub name: String,
    /// Original table alias (if from a table)
    pub table_alias: Option<String>,
}

impl ColumnInfo {
    /// Create a new column info with just a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table_alias: None,
        }
    }

    /// Create a column info with table alias.
    pub fn with_table(name: impl Into<String>, table_alias: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table_alias: Some(table_alias.into()),
        }
    }
}

/// Batch-at-a-time iterator interface for query operators.
///
/// Execution follows the open-next-close pattern:
///
/// 1. `open()` - Initialize (and re-initialize) the operator
/// 2. `next_batch()` - Pull the next batch until `None`
/// 3. `close()` - Release resources
///
/// # Thread Safety
///
/// Operators are `Send` so a plan can move to another thread, but a single
/// operator is driven by one caller at a time.
pub trait BatchOperator: Send {
    /// Initialize the operator. Calling it again restarts the operator.
    fn open(&mut self) -> Result<()>;

    /// Pull the next batch.
    ///
    /// Returns:
    /// - `Ok(Some(batch))` - A batch is available
    /// - `Ok(None)` - No more batches (exhausted)
    /// - `Err(e)` - An error occurred
    ///
    /// After returning `None`, subsequent calls should continue to return `None`.
    fn next_batch(&mut self) -> Result<Option<RowBatch>>;

    /// The batch returned by the most recent successful `next_batch`.
    fn current_batch(&self) -> Option<&RowBatch>;

    /// Close the operator and release resources.
    fn close(&mut self) -> Result<()>;

    /// Get the schema (column information) for this operator's output.
    fn schema(&self) -> &[ColumnInfo];

    /// Get an estimate of the number of rows this operator will produce.
    fn estimated_rows(&self) -> Option<usize> {
        None
    }

    /// Get a descriptive name for this operator (for EXPLAIN).
    fn name(&self) -> &str;

    /// Access the key-bound capability of a lookup operator, if it has one.
    fn as_bound_pushable(&mut self) -> Option<&mut dyn BoundPushable> {
        None
    }
}

/// A child that can scope its next scan to a pushed key value.
pub trait BoundPushable {
    /// Replace the key bound on `column` with `value`.
    ///
    /// Returns `false` if the operator cannot bound that column.
    fn push_bound(&mut self, column: usize, value: &Value) -> bool;

    /// Rewind the scan so the next pull starts a fresh lookup.
    fn reset_scan_state(&mut self) -> Result<()>;
}

// ============================================================================
// Helper Operators
// ============================================================================

/// An empty operator that produces no batches.
pub struct EmptyOperator {
    schema: Vec<ColumnInfo>,
}

impl EmptyOperator {
    /// Create an empty operator with no schema.
    pub fn new() -> Self {
        Self { schema: Vec::new() }
    }

    /// Create an empty operator with a specific schema.
    pub fn with_schema(schema: Vec<ColumnInfo>) -> Self {
        Self { schema }
    }
}

impl Default for EmptyOperator {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchOperator for EmptyOperator {
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    fn next_batch(&mut self) -> Result<Option<RowBatch>> {
        Ok(None)
    }

    fn current_batch(&self) -> Option<&RowBatch> {
        None
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn schema(&self) -> &[ColumnInfo] {
        &self.schema
    }

    fn estimated_rows(&self) -> Option<usize> {
        Some(0)
    }

    fn name(&self) -> &str {
        "Empty"
    }
}

/// An operator that yields pre-materialized batches.
///
/// Batches are kept after they are returned so the operator can be reopened
/// and scanned again.
pub struct MaterializedOperator {
    batches: Vec<RowBatch>,
    schema: Vec<ColumnInfo>,
    current_idx: usize,
    current: Option<RowBatch>,
}

impl MaterializedOperator {
    /// Create an operator that returns `rows` in batches of `batch_size`.
    ///
    /// A `batch_size` of zero puts all rows in one batch.
    pub fn new(rows: Vec<Row>, schema: Vec<ColumnInfo>, batch_size: usize) -> Self {
        let batches = if rows.is_empty() {
            Vec::new()
        } else if batch_size == 0 || batch_size >= rows.len() {
            vec![RowBatch::new(rows)]
        } else {
            rows.chunks(batch_size)
                .map(|chunk| RowBatch::new(chunk.to_vec()))
                .collect()
        };
        Self::from_batches(batches, schema)
    }

    /// Create an operator that returns the given batches as they are.
    pub fn from_batches(batches: Vec<RowBatch>, schema: Vec<ColumnInfo>) -> Self {
        Self {
            batches,
            schema,
            current_idx: 0,
            current: None,
        }
    }

    /// Number of batches this operator returns per scan.
    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }
}

impl BatchOperator for MaterializedOperator {
    fn open(&mut self) -> Result<()> {
        self.current_idx = 0;
        self.current = None;
        Ok(())
    }

    fn next_batch(&mut self) -> Result<Option<RowBatch>> {
        let Some(batch) = self.batches.get(self.current_idx) else {
            return Ok(None);
        };
        self.current_idx += 1;
        self.current = Some(batch.clone());
        Ok(Some(batch.clone()))
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
        Some(self.batches.iter().map(RowBatch::visible_count).sum())
    }

    fn name(&self) -> &str {
        "Materialized"
    }
}
