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

//! Outer-join completion: null-extends every buffered row that never matched.
//!
//! The emitter is resumable. Its position (phase, batch id, row) lives on the
//! struct, each call returns at most `limit` rows, and once it reports `None`
//! it keeps reporting `None` until reset.

use log::debug;

use crate::core::{Error, Result, Side};
use crate::executor::batch::{JoinedBatch, SidePositions};

use super::buffer::BatchBuffer;
use super::tracker::MatchTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    NotStarted,
    Emitting(Side),
    Done,
}

#[derive(Debug)]
pub(crate) struct OuterEmitter {
    emit_left: bool,
    emit_right: bool,
    phase: Phase,
    batch: usize,
    row: usize,
    emitted: usize,
}

impl OuterEmitter {
    pub fn new(emit_left: bool, emit_right: bool) -> Self {
        Self {
            emit_left,
            emit_right,
            phase: Phase::NotStarted,
            batch: 0,
            row: 0,
            emitted: 0,
        }
    }

    pub fn reset(&mut self) {
        self.phase = Phase::NotStarted;
        self.batch = 0;
        self.row = 0;
        self.emitted = 0;
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    /// Rows null-extended so far
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Produce the next batch of null-extended rows, or `None` when drained
    pub fn next_batch(
        &mut self,
        buffer: &BatchBuffer,
        tracker: &MatchTracker,
        left_width: usize,
        right_width: usize,
        limit: usize,
    ) -> Result<Option<JoinedBatch>> {
        if self.phase == Phase::NotStarted {
            debug!(
                "outer completion: left={} right={}",
                self.emit_left, self.emit_right
            );
            self.enter_phase_after(None, buffer);
        }

        let mut left = SidePositions::new();
        let mut right = SidePositions::new();
        let limit = limit.max(1);

        while left.len() < limit {
            let side = match self.phase {
                Phase::Emitting(side) => side,
                Phase::Done | Phase::NotStarted => break,
            };

            let Some(batch) = buffer.side(side).get(self.batch) else {
                self.enter_phase_after(Some(side), buffer);
                continue;
            };
            let bits = tracker.bitset(side, self.batch).ok_or_else(|| {
                Error::invariant(format!(
                    "no match bitset for {} batch {}",
                    side, self.batch
                ))
            })?;

            let (kept, padded) = match side {
                Side::Left => (&mut left, &mut right),
                Side::Right => (&mut right, &mut left),
            };
            let mut source = None;
            while self.row < batch.len() && kept.len() < limit {
                let row = self.row;
                self.row += 1;
                if batch.is_visible(row) && !bits.is_set(row) {
                    let id = *source.get_or_insert_with(|| kept.add_source(batch));
                    kept.push(id, row);
                    padded.push_null();
                }
            }
            if self.row >= batch.len() {
                self.batch += 1;
                self.row = 0;
            }
        }

        if left.is_empty() {
            return Ok(None);
        }
        self.emitted += left.len();
        JoinedBatch::from_sides(left, right, left_width, right_width).map(Some)
    }

    fn enter_phase_after(&mut self, finished: Option<Side>, buffer: &BatchBuffer) {
        let next = match finished {
            None if self.emit_left => Some(Side::Left),
            None | Some(Side::Left) if self.emit_right => Some(Side::Right),
            _ => None,
        };
        match next {
            Some(side) => {
                self.phase = Phase::Emitting(side);
                self.batch = buffer.side(side).first_id().unwrap_or(0);
                self.row = 0;
            }
            None => {
                if self.phase != Phase::Done {
                    debug!("outer completion finished: {} rows", self.emitted);
                }
                self.phase = Phase::Done;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Row, Value};
    use crate::executor::batch::RowBatch;

    fn batch(n: i64) -> RowBatch {
        RowBatch::new((0..n).map(|i| Row::from_values(vec![Value::integer(i)])).collect())
    }

    fn setup(left: &[i64], right: &[i64]) -> (BatchBuffer, MatchTracker) {
        let mut buffer = BatchBuffer::default();
        let mut tracker = MatchTracker::new(true, true);
        for &n in left {
            let id = buffer.left.push(batch(n));
            tracker.register(Side::Left, id, n as usize).unwrap();
        }
        for &n in right {
            let id = buffer.right.push(batch(n));
            tracker.register(Side::Right, id, n as usize).unwrap();
        }
        (buffer, tracker)
    }

    fn drain(
        emitter: &mut OuterEmitter,
        buffer: &BatchBuffer,
        tracker: &MatchTracker,
        limit: usize,
    ) -> Vec<JoinedBatch> {
        let mut out = Vec::new();
        while let Some(b) = emitter.next_batch(buffer, tracker, 1, 1, limit).unwrap() {
            out.push(b);
        }
        out
    }

    #[test]
    fn test_left_unmatched_only() {
        let (buffer, mut tracker) = setup(&[3, 2], &[4]);
        tracker.record_matched_left_row(0, 1);
        tracker.record_matched_left_row(1, 0);

        let mut emitter = OuterEmitter::new(true, false);
        let out = drain(&mut emitter, &buffer, &tracker, 100);
        assert_eq!(out.len(), 1);
        let rows: Vec<String> = out[0].rows().map(|r| r.to_row().to_string()).collect();
        assert_eq!(rows, vec!["(0, NULL)", "(2, NULL)", "(1, NULL)"]);
        assert!(emitter.is_done());
        assert_eq!(emitter.emitted(), 3);
    }

    #[test]
    fn test_resumes_across_small_limits() {
        let (buffer, tracker) = setup(&[3, 4], &[]);
        let mut emitter = OuterEmitter::new(true, false);
        let out = drain(&mut emitter, &buffer, &tracker, 2);
        let sizes: Vec<usize> = out.iter().map(JoinedBatch::len).collect();
        assert_eq!(sizes, vec![2, 2, 2, 1]);
        assert_eq!(
            emitter.next_batch(&buffer, &tracker, 1, 1, 2).unwrap().map(|b| b.len()),
            None
        );
    }

    #[test]
    fn test_full_emits_left_then_right() {
        let (buffer, mut tracker) = setup(&[2], &[2]);
        tracker.record_matched_left_row(0, 0);
        tracker.record_matched_right_row(0, 0);

        let mut emitter = OuterEmitter::new(true, true);
        let out = drain(&mut emitter, &buffer, &tracker, 1);
        assert_eq!(out.len(), 2);
        let first = out[0].row(0).unwrap();
        assert!(first.left().is_some() && first.right().is_none());
        let second = out[1].row(0).unwrap();
        assert!(second.left().is_none() && second.right().is_some());
    }

    #[test]
    fn test_inner_emits_nothing() {
        let (buffer, tracker) = setup(&[2], &[2]);
        let mut emitter = OuterEmitter::new(false, false);
        assert!(drain(&mut emitter, &buffer, &tracker, 10).is_empty());
        assert!(emitter.is_done());
    }

    #[test]
    fn test_empty_buffers() {
        let (buffer, tracker) = setup(&[], &[]);
        let mut emitter = OuterEmitter::new(true, true);
        assert!(drain(&mut emitter, &buffer, &tracker, 10).is_empty());
    }

    #[test]
    fn test_reset_restarts() {
        let (buffer, tracker) = setup(&[1], &[]);
        let mut emitter = OuterEmitter::new(true, false);
        assert_eq!(drain(&mut emitter, &buffer, &tracker, 10).len(), 1);
        emitter.reset();
        assert_eq!(drain(&mut emitter, &buffer, &tracker, 10).len(), 1);
    }
}
