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

//! Pairwise matching of one left batch against one right batch.
//!
//! Right rows form the outer loop and left rows the inner loop. A pair is
//! skipped only when the condition evaluates to false; a true or unknown
//! result appends the pair to the output position lists.

use std::sync::Arc;

use crate::core::Result;
use crate::executor::batch::{JoinedBatch, RowBatch, SidePositions};
use crate::executor::context::ExecutionContext;
use crate::executor::predicate::JoinPredicate;

use super::tracker::MatchTracker;

/// Which rows of the left batch take part in a pairing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LeftRows {
    /// Every visible row
    Visible,
    /// A single row, for a correlated probe
    Single(usize),
}

/// One batch of a pairing, with its buffer id
pub(crate) struct Input<'a> {
    pub batch: &'a RowBatch,
    pub id: usize,
}

/// Result of one pairing
pub(crate) struct PairOutcome {
    pub output: JoinedBatch,
    /// Condition evaluations performed
    pub evaluated: usize,
}

#[derive(Debug)]
pub(crate) struct PairwiseMatcher {
    predicate: Option<Arc<dyn JoinPredicate>>,
    left_width: usize,
    right_width: usize,
}

impl PairwiseMatcher {
    pub fn new(
        predicate: Option<Arc<dyn JoinPredicate>>,
        left_width: usize,
        right_width: usize,
    ) -> Self {
        Self {
            predicate,
            left_width,
            right_width,
        }
    }

    pub fn left_width(&self) -> usize {
        self.left_width
    }

    pub fn right_width(&self) -> usize {
        self.right_width
    }

    /// Pair `left` against `right`, recording matches in `tracker`
    pub fn pair(
        &self,
        ctx: &ExecutionContext,
        tracker: &mut MatchTracker,
        left: Input<'_>,
        rows: LeftRows,
        right: Input<'_>,
    ) -> Result<PairOutcome> {
        let mut left_pos = SidePositions::new();
        let mut right_pos = SidePositions::new();
        let left_src = left_pos.add_source(left.batch);
        let right_src = right_pos.add_source(right.batch);
        let mut evaluated = 0;

        for j in right.batch.visible_rows() {
            let right_row = &right.batch.rows()[j];
            let mut right_matched = false;

            let mut consider = |i: usize| -> Result<()> {
                let left_row = &left.batch.rows()[i];
                if let Some(predicate) = &self.predicate {
                    evaluated += 1;
                    if predicate.evaluate(left_row, right_row, ctx)?.is_false() {
                        return Ok(());
                    }
                }
                tracker.record_matched_left_row(left.id, i);
                right_matched = true;
                left_pos.push(left_src, i);
                right_pos.push(right_src, j);
                Ok(())
            };

            match rows {
                LeftRows::Visible => {
                    for i in left.batch.visible_rows() {
                        consider(i)?;
                    }
                }
                LeftRows::Single(i) => {
                    if left.batch.is_visible(i) {
                        consider(i)?;
                    }
                }
            }

            if right_matched {
                tracker.record_matched_right_row(right.id, j);
            }
        }

        let output =
            JoinedBatch::from_sides(left_pos, right_pos, self.left_width, self.right_width)?;
        Ok(PairOutcome { output, evaluated })
    }
}
