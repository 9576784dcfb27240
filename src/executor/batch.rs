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

//! Row batches and position-list views over them.
//!
//! A [`RowBatch`] is what one pull from an operator produces: a shared,
//! immutable slice of rows plus an optional visibility mask. Join output is a
//! [`JoinedBatch`], which does not copy any row. Each output row is a pair of
//! [`RowPosition`]s pointing into the source batches, and the output holds its
//! own reference-counted handles to those batches so it stays valid after the
//! join drops them from its buffers.
//!
//! ```text
//!   left sources [B0, B1]        right sources [R3]
//!   left  entries: (0,2) (1,0) (NULL)
//!   right entries: (0,1) (0,1) (0,4)
//!   row k = left entry k ++ right entry k
//! ```

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use roaring::RoaringBitmap;
use smallvec::SmallVec;

use crate::core::{Error, Result, Row, Value, NULL_VALUE};

/// An immutable batch of rows produced by one operator pull
///
/// Cloning is a reference count bump; the join buffers and every output view
/// share the same rows.
#[derive(Clone, Default)]
pub struct RowBatch {
    rows: Arc<[Row]>,
    /// Visible rows; `None` means every row is visible
    visibility: Option<Arc<RoaringBitmap>>,
}

impl RowBatch {
    /// Create a batch where every row is visible
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows: Arc::from(rows),
            visibility: None,
        }
    }

    /// Create a batch over already shared rows
    pub fn from_arc(rows: Arc<[Row]>) -> Self {
        Self {
            rows,
            visibility: None,
        }
    }

    /// Create a batch with no rows
    pub fn empty() -> Self {
        Self::default()
    }

    /// Restrict the batch to the rows set in `mask`
    ///
    /// Fails with `InvariantViolation` if the mask names a row past the end.
    pub fn with_visibility(mut self, mask: RoaringBitmap) -> Result<Self> {
        if let Some(max) = mask.max() {
            if max as usize >= self.rows.len() {
                return Err(Error::invariant(format!(
                    "visibility mask names row {} of a {}-row batch",
                    max,
                    self.rows.len()
                )));
            }
        }
        self.visibility = Some(Arc::new(mask));
        Ok(self)
    }

    /// Number of physical rows, visible or not
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Number of visible rows
    pub fn visible_count(&self) -> usize {
        match &self.visibility {
            None => self.rows.len(),
            Some(mask) => mask.len() as usize,
        }
    }

    /// True when no row is visible
    pub fn is_empty(&self) -> bool {
        self.visible_count() == 0
    }

    #[inline]
    pub fn is_visible(&self, row: usize) -> bool {
        match &self.visibility {
            None => row < self.rows.len(),
            Some(mask) => u32::try_from(row).is_ok_and(|r| mask.contains(r)),
        }
    }

    /// Indices of the visible rows in ascending order
    pub fn visible_rows(&self) -> VisibleRows<'_> {
        match &self.visibility {
            None => VisibleRows::All(0..self.rows.len()),
            Some(mask) => VisibleRows::Masked(mask.iter()),
        }
    }

    /// Iterate over visible rows
    pub fn iter_visible(&self) -> impl Iterator<Item = &Row> + '_ {
        self.visible_rows().map(move |i| &self.rows[i])
    }

    /// Get a row by physical index, ignoring visibility
    #[inline]
    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    /// Project one column of one row
    pub fn value(&self, row: usize, column: usize) -> Result<&Value> {
        let row = self.rows.get(row).ok_or_else(|| {
            Error::invariant(format!(
                "row {} out of range for a {}-row batch",
                row,
                self.rows.len()
            ))
        })?;
        row.try_get(column)
    }

    /// All physical rows
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Clone the visible rows out of the batch
    pub fn to_rows(&self) -> Vec<Row> {
        self.iter_visible().cloned().collect()
    }

    /// True when both handles share the same row storage
    #[inline]
    pub fn ptr_eq(&self, other: &RowBatch) -> bool {
        Arc::ptr_eq(&self.rows, &other.rows)
    }
}

impl fmt::Debug for RowBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowBatch")
            .field("rows", &self.rows.len())
            .field("visible", &self.visible_count())
            .finish()
    }
}

impl From<Vec<Row>> for RowBatch {
    fn from(rows: Vec<Row>) -> Self {
        RowBatch::new(rows)
    }
}

/// Iterator over the visible row indices of a [`RowBatch`]
pub enum VisibleRows<'a> {
    All(Range<usize>),
    Masked(roaring::bitmap::Iter<'a>),
}

impl Iterator for VisibleRows<'_> {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        match self {
            VisibleRows::All(range) => range.next(),
            VisibleRows::Masked(iter) => iter.next().map(|r| r as usize),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            VisibleRows::All(range) => range.size_hint(),
            VisibleRows::Masked(iter) => iter.size_hint(),
        }
    }
}

/// Address of one row inside a position list's source batches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowPosition {
    source: u32,
    row: u32,
}

impl RowPosition {
    /// The null-row sentinel used for outer join padding
    pub const NULL: RowPosition = RowPosition {
        source: u32::MAX,
        row: u32::MAX,
    };

    pub fn new(source: u32, row: u32) -> Self {
        Self { source, row }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.source == u32::MAX
    }

    /// Index into the side's source list, `None` for the null sentinel
    #[inline]
    pub fn source(&self) -> Option<usize> {
        (!self.is_null()).then_some(self.source as usize)
    }

    #[inline]
    pub fn row(&self) -> usize {
        self.row as usize
    }
}

/// One side of a position-list pair
///
/// Holds the distinct batches its entries point into; most outputs reference
/// a single batch per side, hence the inline capacity of one.
#[derive(Debug, Clone, Default)]
pub struct SidePositions {
    sources: SmallVec<[RowBatch; 1]>,
    entries: Vec<RowPosition>,
}

impl SidePositions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sources: SmallVec::new(),
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Register a source batch, returning its id for [`push`](Self::push)
    ///
    /// Registering the same batch twice returns the same id.
    pub fn add_source(&mut self, batch: &RowBatch) -> u32 {
        if let Some(id) = self.sources.iter().position(|b| b.ptr_eq(batch)) {
            return id as u32;
        }
        self.sources.push(batch.clone());
        (self.sources.len() - 1) as u32
    }

    #[inline]
    pub fn push(&mut self, source: u32, row: usize) {
        debug_assert!((source as usize) < self.sources.len());
        self.entries.push(RowPosition::new(source, row as u32));
    }

    #[inline]
    pub fn push_null(&mut self) {
        self.entries.push(RowPosition::NULL);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve entry `k`; `None` for a null entry or out of range
    pub fn get(&self, k: usize) -> Option<&Row> {
        let pos = self.entries.get(k)?;
        let source = self.sources.get(pos.source()?)?;
        source.row(pos.row())
    }

    pub fn entries(&self) -> &[RowPosition] {
        &self.entries
    }

    pub fn sources(&self) -> &[RowBatch] {
        &self.sources
    }
}

/// Output of a join: a position-list pair plus the column width of each side
#[derive(Debug, Clone)]
pub struct JoinedBatch {
    left: SidePositions,
    right: SidePositions,
    left_width: usize,
    right_width: usize,
}

impl JoinedBatch {
    /// Assemble an output batch; both sides must have the same length
    pub fn from_sides(
        left: SidePositions,
        right: SidePositions,
        left_width: usize,
        right_width: usize,
    ) -> Result<Self> {
        if left.len() != right.len() {
            return Err(Error::invariant(format!(
                "position lists differ in length: left {} right {}",
                left.len(),
                right.len()
            )));
        }
        Ok(Self {
            left,
            right,
            left_width,
            right_width,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.left.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Number of output columns (left columns followed by right columns)
    pub fn width(&self) -> usize {
        self.left_width + self.right_width
    }

    pub fn left_positions(&self) -> &SidePositions {
        &self.left
    }

    pub fn right_positions(&self) -> &SidePositions {
        &self.right
    }

    /// Zero-copy view of output row `k`
    pub fn row(&self, k: usize) -> Option<JoinedRow<'_>> {
        if k >= self.len() {
            return None;
        }
        Some(JoinedRow {
            left: self.left.get(k),
            right: self.right.get(k),
            left_width: self.left_width,
            right_width: self.right_width,
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = JoinedRow<'_>> + '_ {
        (0..self.len()).filter_map(move |k| self.row(k))
    }

    /// Copy output row `k` into an owned row
    pub fn materialize_row(&self, k: usize) -> Option<Row> {
        self.row(k).map(|r| r.to_row())
    }

    /// Copy every output row into a new batch
    pub fn materialize(&self) -> RowBatch {
        RowBatch::new(self.rows().map(|r| r.to_row()).collect())
    }
}

/// Borrowed view of one joined output row
#[derive(Debug, Clone, Copy)]
pub struct JoinedRow<'a> {
    left: Option<&'a Row>,
    right: Option<&'a Row>,
    left_width: usize,
    right_width: usize,
}

impl<'a> JoinedRow<'a> {
    /// Left row, `None` when null-extended
    pub fn left(&self) -> Option<&'a Row> {
        self.left
    }

    /// Right row, `None` when null-extended
    pub fn right(&self) -> Option<&'a Row> {
        self.right
    }

    /// Value of output column `column`
    pub fn get(&self, column: usize) -> Option<&'a Value> {
        if column < self.left_width {
            return Some(match self.left {
                Some(row) => row.get(column)?,
                None => &NULL_VALUE,
            });
        }
        let column = column - self.left_width;
        if column < self.right_width {
            return Some(match self.right {
                Some(row) => row.get(column)?,
                None => &NULL_VALUE,
            });
        }
        None
    }

    pub fn to_row(&self) -> Row {
        let mut values = Vec::with_capacity(self.left_width + self.right_width);
        match self.left {
            Some(row) => values.extend(row.iter().cloned()),
            None => values.resize(self.left_width, Value::null_unknown()),
        }
        match self.right {
            Some(row) => values.extend(row.iter().cloned()),
            None => values.resize(values.len() + self.right_width, Value::null_unknown()),
        }
        Row::from_values(values)
    }
}
