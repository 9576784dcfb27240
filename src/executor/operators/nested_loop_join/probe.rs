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

//! Correlated probe driver (index nested loop).
//!
//! For each visible left row, the join key is pushed into the right child as
//! a bound and the right child is pulled until it reports exhaustion. Each
//! right batch is paired only with the row whose key produced it.
//!
//! The right child's scan state is reset lazily, right before the next bound
//! push. When the left child runs out, the right side is closed out as
//! exhausted without a final reset.

use std::collections::VecDeque;

use log::{debug, trace};

use crate::core::{Error, Result, Side};
use crate::executor::batch::JoinedBatch;
use crate::executor::operator::BatchOperator;
use crate::executor::predicate::EquiKey;

use super::matcher::LeftRows;
use super::{pull, wrap_child_error, JoinCore};

/// A left row whose key bound is currently pushed into the right child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ActiveProbe {
    batch: usize,
    row: usize,
}

#[derive(Debug)]
pub(crate) struct ProbeDriver {
    key: EquiKey,
    left_batch: Option<usize>,
    pending_rows: VecDeque<usize>,
    active: Option<ActiveProbe>,
    needs_reset: bool,
}

impl ProbeDriver {
    pub fn new(key: EquiKey) -> Self {
        Self {
            key,
            left_batch: None,
            pending_rows: VecDeque::new(),
            active: None,
            needs_reset: false,
        }
    }

    pub fn key(&self) -> EquiKey {
        self.key
    }

    pub fn reset(&mut self) {
        self.left_batch = None;
        self.pending_rows.clear();
        self.active = None;
        self.needs_reset = false;
    }

    pub fn next(
        &mut self,
        core: &mut JoinCore,
        left: &mut dyn BatchOperator,
        right: &mut dyn BatchOperator,
    ) -> Result<Option<JoinedBatch>> {
        loop {
            if core.left_done && core.right_done {
                return core.complete();
            }
            core.check_cancelled()?;

            if let Some(probe) = self.active {
                match pull(right, Side::Right)? {
                    Some(batch) => {
                        let right_id = core.buffer_batch(Side::Right, batch)?;
                        let out = core.pair(probe.batch, LeftRows::Single(probe.row), right_id)?;
                        if core.config.release_paired_batches {
                            core.retire(Side::Right, right_id + 1);
                        }
                        if !out.is_empty() {
                            return Ok(Some(out));
                        }
                    }
                    None => {
                        trace!(
                            "probe for left row {}:{} exhausted",
                            probe.batch,
                            probe.row
                        );
                        self.active = None;
                        self.needs_reset = true;
                    }
                }
                continue;
            }

            if let Some(row) = self.pending_rows.pop_front() {
                self.start_probe(core, right, row)?;
                continue;
            }

            // current left batch is fully probed
            if let Some(done) = self.left_batch.take() {
                if core.config.release_paired_batches && !core.join_type.needs_left_completion() {
                    core.retire(Side::Left, done + 1);
                }
            }

            match pull(left, Side::Left)? {
                Some(batch) => {
                    self.pending_rows = batch.visible_rows().collect();
                    let id = core.buffer_batch(Side::Left, batch)?;
                    self.left_batch = Some(id);
                }
                None => {
                    debug!(
                        "left exhausted after {} probes; closing right side",
                        core.stats.probes
                    );
                    core.left_done = true;
                    core.right_done = true;
                }
            }
        }
    }

    fn start_probe(
        &mut self,
        core: &mut JoinCore,
        right: &mut dyn BatchOperator,
        row: usize,
    ) -> Result<()> {
        let batch = self
            .left_batch
            .ok_or_else(|| Error::invariant("pending probe row without a left batch"))?;
        let key = core
            .buffer
            .expect(Side::Left, batch)?
            .value(row, self.key.left_column)?
            .clone();

        // NULL never equals anything, so the lookup would return nothing
        if key.is_null() {
            core.stats.null_keys_skipped += 1;
            return Ok(());
        }

        if self.needs_reset {
            let reset = match right.as_bound_pushable() {
                Some(pushable) => pushable.reset_scan_state(),
                None => return Err(not_pushable(right.name())),
            };
            reset.map_err(|e| wrap_child_error(Side::Right, right.name(), e))?;
            self.needs_reset = false;
        }

        let accepted = match right.as_bound_pushable() {
            Some(pushable) => pushable.push_bound(self.key.right_column, &key),
            None => return Err(not_pushable(right.name())),
        };
        if !accepted {
            return Err(Error::unsupported_pushdown(format!(
                "right child '{}' rejected a bound on column {}",
                right.name(),
                self.key.right_column
            )));
        }

        trace!("probe {}:{} pushed key {}", batch, row, key);
        core.stats.probes += 1;
        self.active = Some(ActiveProbe { batch, row });
        Ok(())
    }
}

pub(crate) fn not_pushable(operator: &str) -> Error {
    Error::unsupported_pushdown(format!(
        "right child '{}' cannot accept a key bound",
        operator
    ))
}
