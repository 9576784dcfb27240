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

//! Per-batch match bitsets for outer joins.

use roaring::RoaringBitmap;

use crate::core::{Error, Result, Side};

/// Which rows of one buffered batch produced at least one match
#[derive(Debug, Clone, Default)]
pub struct MatchBitset {
    bits: RoaringBitmap,
    rows: usize,
}

impl MatchBitset {
    pub fn new(rows: usize) -> Self {
        Self {
            bits: RoaringBitmap::new(),
            rows,
        }
    }

    /// Mark `row` matched. Returns true if it was not marked before.
    #[inline]
    pub fn set(&mut self, row: usize) -> bool {
        debug_assert!(row < self.rows);
        self.bits.insert(row as u32)
    }

    #[inline]
    pub fn is_set(&self, row: usize) -> bool {
        u32::try_from(row).is_ok_and(|r| self.bits.contains(r))
    }

    /// Row count of the batch this bitset covers
    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn matched_count(&self) -> usize {
        self.bits.len() as usize
    }
}

impl PartialEq for MatchBitset {
    fn eq(&self, other: &Self) -> bool {
        self.rows == other.rows && self.bits == other.bits
    }
}

/// Match bookkeeping for both sides, indexed by batch id
///
/// A side that is never null-extended is not tracked, so inner joins pay
/// nothing here.
#[derive(Debug, Default)]
pub(crate) struct MatchTracker {
    track_left: bool,
    track_right: bool,
    left: Vec<MatchBitset>,
    right: Vec<MatchBitset>,
}

impl MatchTracker {
    pub fn new(track_left: bool, track_right: bool) -> Self {
        Self {
            track_left,
            track_right,
            left: Vec::new(),
            right: Vec::new(),
        }
    }

    pub fn tracks(&self, side: Side) -> bool {
        match side {
            Side::Left => self.track_left,
            Side::Right => self.track_right,
        }
    }

    /// Create the bitset for a newly buffered batch
    pub fn register(&mut self, side: Side, batch_id: usize, rows: usize) -> Result<()> {
        if !self.tracks(side) {
            return Ok(());
        }
        let bitsets = self.side_mut(side);
        if batch_id != bitsets.len() {
            return Err(Error::invariant(format!(
                "{} batch {} registered out of order (expected {})",
                side,
                batch_id,
                bitsets.len()
            )));
        }
        bitsets.push(MatchBitset::new(rows));
        Ok(())
    }

    #[inline]
    pub fn record_matched_left_row(&mut self, batch_id: usize, row: usize) {
        if self.track_left {
            if let Some(bits) = self.left.get_mut(batch_id) {
                bits.set(row);
            }
        }
    }

    #[inline]
    pub fn record_matched_right_row(&mut self, batch_id: usize, row: usize) {
        if self.track_right {
            if let Some(bits) = self.right.get_mut(batch_id) {
                bits.set(row);
            }
        }
    }

    pub fn bitset(&self, side: Side, batch_id: usize) -> Option<&MatchBitset> {
        match side {
            Side::Left => self.left.get(batch_id),
            Side::Right => self.right.get(batch_id),
        }
    }

    pub fn clear(&mut self) {
        self.left.clear();
        self.right.clear();
    }

    fn side_mut(&mut self, side: Side) -> &mut Vec<MatchBitset> {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }
}
