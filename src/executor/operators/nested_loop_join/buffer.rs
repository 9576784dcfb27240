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

//! Buffered batch lists for both join inputs.
//!
//! Every batch pulled from a child gets a batch id, which counts up from zero
//! for the whole run. Retiring drops batches from the front without
//! renumbering the rest, so the cursor and match bitsets can keep using ids.

use std::collections::VecDeque;

use crate::core::{Error, Result, Side};
use crate::executor::batch::RowBatch;

/// Ordered batches retained from one child
#[derive(Debug, Default)]
pub(crate) struct BatchList {
    batches: VecDeque<RowBatch>,
    /// Batches dropped from the front; also the id of the first live batch
    retired: usize,
}

impl BatchList {
    /// Buffer a batch and return its id
    pub fn push(&mut self, batch: RowBatch) -> usize {
        self.batches.push_back(batch);
        self.retired + self.batches.len() - 1
    }

    pub fn get(&self, id: usize) -> Option<&RowBatch> {
        id.checked_sub(self.retired)
            .and_then(|pos| self.batches.get(pos))
    }

    /// Id of the oldest live batch
    pub fn first_id(&self) -> Option<usize> {
        (!self.batches.is_empty()).then_some(self.retired)
    }

    /// Id of the newest live batch
    pub fn last_id(&self) -> Option<usize> {
        (!self.batches.is_empty()).then(|| self.retired + self.batches.len() - 1)
    }

    /// Batches ever buffered in this run, including retired ones
    pub fn total(&self) -> usize {
        self.retired + self.batches.len()
    }

    /// Batches still held
    pub fn live(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Drop every batch with an id lower than `id`
    pub fn retire_before(&mut self, id: usize) {
        while self.retired < id && self.batches.pop_front().is_some() {
            self.retired += 1;
        }
    }

    pub fn clear(&mut self) {
        self.batches.clear();
        self.retired = 0;
    }
}

/// Buffered batches of both children
#[derive(Debug, Default)]
pub(crate) struct BatchBuffer {
    pub left: BatchList,
    pub right: BatchList,
}

impl BatchBuffer {
    pub fn side(&self, side: Side) -> &BatchList {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    /// Look up a live batch, failing if it was never buffered or was retired
    pub fn expect(&self, side: Side, id: usize) -> Result<&RowBatch> {
        self.side(side).get(id).ok_or_else(|| {
            Error::invariant(format!("{} batch {} is not buffered", side, id))
        })
    }

    /// Rows held across both lists
    pub fn buffered_rows(&self) -> usize {
        self.left
            .batches
            .iter()
            .chain(self.right.batches.iter())
            .map(RowBatch::len)
            .sum()
    }

    pub fn clear(&mut self) {
        self.left.clear();
        self.right.clear();
    }
}
