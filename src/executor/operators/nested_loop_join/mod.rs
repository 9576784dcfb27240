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

//! Nested Loop Join Operator.
//!
//! A resumable, batch-at-a-time nested loop join over two child operators.
//! It supports INNER, LEFT, RIGHT, FULL and CROSS joins with any join
//! condition. Two strategies are available and one is chosen at construction:
//!
//! - **Buffered**: left batches are buffered for the whole run. Every new
//!   right batch is paired against every buffered left batch, so each
//!   (left row, right row) combination is evaluated exactly once.
//! - **Correlated probe**: for each left row the join key is pushed into a
//!   bound-pushable right child (an index lookup), turning the loop into an
//!   index nested loop join. Requires a single column equality condition.
//!
//! Each call to [`NestedLoopJoin::next`] returns one non-empty
//! [`JoinedBatch`] or `None` once the join is exhausted. Output rows reference
//! the buffered batches by position; nothing is copied until a consumer
//! materializes them.

mod buffer;
mod matcher;
mod outer;
mod probe;
mod tracker;

pub use tracker::MatchBitset;

use std::fmt;
use std::sync::Arc;

use log::{debug, trace};

use crate::core::{Error, Result, Side};
use crate::executor::batch::{JoinedBatch, RowBatch};
use crate::executor::config::NestedLoopJoinConfig;
use crate::executor::context::ExecutionContext;
use crate::executor::operator::{BatchOperator, ColumnInfo};
use crate::executor::predicate::JoinPredicate;

use buffer::BatchBuffer;
use matcher::{Input, LeftRows, PairwiseMatcher};
use outer::OuterEmitter;
use probe::{not_pushable, ProbeDriver};
use tracker::MatchTracker;

/// Join type for nested loop joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinType {
    /// INNER JOIN - only matching rows
    Inner,
    /// LEFT OUTER JOIN - all left rows
    Left,
    /// RIGHT OUTER JOIN - all right rows
    Right,
    /// FULL OUTER JOIN - all rows from both sides
    Full,
    /// CROSS JOIN - cartesian product, no condition
    Cross,
}

impl JoinType {
    /// Parse join type from a SQL join clause such as `"LEFT OUTER JOIN"`.
    pub fn parse(s: &str) -> Self {
        let s_lower = s.to_lowercase();
        if s_lower.contains("left") {
            JoinType::Left
        } else if s_lower.contains("right") {
            JoinType::Right
        } else if s_lower.contains("full") {
            JoinType::Full
        } else if s_lower.contains("cross") {
            JoinType::Cross
        } else {
            JoinType::Inner
        }
    }

    /// Unmatched left rows are null-extended (LEFT, FULL).
    pub fn needs_left_completion(&self) -> bool {
        matches!(self, JoinType::Left | JoinType::Full)
    }

    /// Unmatched right rows are null-extended (RIGHT, FULL).
    pub fn needs_right_completion(&self) -> bool {
        matches!(self, JoinType::Right | JoinType::Full)
    }

    pub fn is_outer(&self) -> bool {
        self.needs_left_completion() || self.needs_right_completion()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER",
            JoinType::Left => "LEFT",
            JoinType::Right => "RIGHT",
            JoinType::Full => "FULL",
            JoinType::Cross => "CROSS",
        }
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which control loop drives the join
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinMode {
    /// Generic buffered nested loop
    #[default]
    Buffered,
    /// Push each left key into a bound-pushable right child
    CorrelatedProbe,
}

/// Counters for one execution, reset by `open`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinStats {
    /// Batches pulled from the left child
    pub left_batches: usize,
    /// Batches pulled from the right child
    pub right_batches: usize,
    /// Batch pairings handed to the matcher
    pub pairings: usize,
    /// Join condition evaluations
    pub evaluations: usize,
    /// Matched rows emitted
    pub matched_rows: usize,
    /// Null-extended rows emitted by outer completion
    pub outer_rows: usize,
    /// Bounds pushed into the right child
    pub probes: usize,
    /// Left rows not probed because their key was NULL
    pub null_keys_skipped: usize,
    /// Buffered batches dropped before the end of the run
    pub retired_batches: usize,
}

enum JoinStrategy {
    Buffered,
    CorrelatedProbe(ProbeDriver),
}

/// State shared by both strategies, kept apart from the children so a
/// strategy can borrow it and the children mutably at the same time.
pub(crate) struct JoinCore {
    join_type: JoinType,
    config: NestedLoopJoinConfig,
    ctx: ExecutionContext,
    matcher: PairwiseMatcher,
    buffer: BatchBuffer,
    tracker: MatchTracker,
    emitter: OuterEmitter,
    /// Left batch id paired against the newest right batch (buffered mode)
    cursor: usize,
    left_done: bool,
    right_done: bool,
    advance_right: bool,
    stats: JoinStats,
}

impl JoinCore {
    fn new(
        join_type: JoinType,
        config: NestedLoopJoinConfig,
        ctx: ExecutionContext,
        matcher: PairwiseMatcher,
    ) -> Self {
        let left = join_type.needs_left_completion();
        let right = join_type.needs_right_completion();
        Self {
            join_type,
            config,
            ctx,
            matcher,
            buffer: BatchBuffer::default(),
            tracker: MatchTracker::new(left, right),
            emitter: OuterEmitter::new(left, right),
            cursor: 0,
            left_done: false,
            right_done: false,
            advance_right: false,
            stats: JoinStats::default(),
        }
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.tracker.clear();
        self.emitter.reset();
        self.cursor = 0;
        self.left_done = false;
        self.right_done = false;
        self.advance_right = false;
        self.stats = JoinStats::default();
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.config.check_cancellation {
            self.ctx.check_cancelled()?;
        }
        Ok(())
    }

    /// Buffer a freshly pulled batch and create its match bitset
    fn buffer_batch(&mut self, side: Side, batch: RowBatch) -> Result<usize> {
        let rows = batch.len();
        let id = match side {
            Side::Left => {
                self.stats.left_batches += 1;
                self.buffer.left.push(batch)
            }
            Side::Right => {
                self.stats.right_batches += 1;
                self.buffer.right.push(batch)
            }
        };
        self.tracker.register(side, id, rows)?;
        trace!("{} batch {} buffered ({} rows)", side, id, rows);
        Ok(id)
    }

    /// Drop buffered batches of `side` with ids lower than `before`
    fn retire(&mut self, side: Side, before: usize) {
        let list = match side {
            Side::Left => &mut self.buffer.left,
            Side::Right => &mut self.buffer.right,
        };
        let live = list.live();
        list.retire_before(before);
        self.stats.retired_batches += live - list.live();
    }

    fn pair(&mut self, left_id: usize, rows: LeftRows, right_id: usize) -> Result<JoinedBatch> {
        let left = self.buffer.expect(Side::Left, left_id)?;
        let right = self.buffer.expect(Side::Right, right_id)?;
        let outcome = self.matcher.pair(
            &self.ctx,
            &mut self.tracker,
            Input {
                batch: left,
                id: left_id,
            },
            rows,
            Input {
                batch: right,
                id: right_id,
            },
        )?;
        self.stats.pairings += 1;
        self.stats.evaluations += outcome.evaluated;
        self.stats.matched_rows += outcome.output.len();
        if outcome.output.is_empty() {
            trace!("left batch {} x right batch {}: no rows", left_id, right_id);
        }
        Ok(outcome.output)
    }

    /// Next outer-completion batch; only valid once both sides are exhausted
    fn complete(&mut self) -> Result<Option<JoinedBatch>> {
        let out = self.emitter.next_batch(
            &self.buffer,
            &self.tracker,
            self.matcher.left_width(),
            self.matcher.right_width(),
            self.config.outer_batch_size,
        )?;
        self.stats.outer_rows = self.emitter.emitted();
        Ok(out)
    }

    fn exhausted(&self) -> bool {
        self.emitter.is_done()
    }

    /// One step of the buffered strategy
    fn next_buffered(
        &mut self,
        left: &mut dyn BatchOperator,
        right: &mut dyn BatchOperator,
    ) -> Result<Option<JoinedBatch>> {
        loop {
            // draining outer completion is never cancelled
            if self.left_done && self.right_done {
                return self.complete();
            }
            self.check_cancelled()?;

            if !self.left_done {
                match pull(left, Side::Left)? {
                    Some(batch) => {
                        self.cursor = self.buffer_batch(Side::Left, batch)?;
                    }
                    None => {
                        self.left_done = true;
                        debug!(
                            "left exhausted after {} batches",
                            self.buffer.left.total()
                        );
                        match self.buffer.left.first_id() {
                            Some(first) => self.cursor = first,
                            None if !self.join_type.needs_right_completion() => {
                                // no left rows and no right rows to keep
                                self.right_done = true;
                                continue;
                            }
                            None => {}
                        }
                        self.advance_right = true;
                    }
                }
            } else if let Some(last) = self.buffer.left.last_id() {
                self.cursor += 1;
                if self.cursor > last {
                    self.cursor = self.buffer.left.first_id().unwrap_or(0);
                    self.advance_right = true;
                }
            } else {
                self.advance_right = true;
            }

            if !self.right_done && (self.advance_right || self.buffer.right.is_empty()) {
                match pull(right, Side::Right)? {
                    Some(batch) => {
                        self.advance_right = false;
                        if self.config.release_paired_batches
                            && !self.join_type.needs_right_completion()
                        {
                            let next_id = self.buffer.right.total();
                            self.retire(Side::Right, next_id);
                        }
                        self.buffer_batch(Side::Right, batch)?;
                    }
                    None => {
                        self.right_done = true;
                        debug!(
                            "right exhausted after {} batches",
                            self.buffer.right.total()
                        );
                        if self.buffer.right.total() == 0
                            && !self.join_type.needs_left_completion()
                        {
                            // empty right input: nothing can match
                            self.left_done = true;
                        }
                        continue;
                    }
                }
            }

            let Some(right_id) = self.buffer.right.last_id() else {
                continue;
            };
            if self.buffer.left.is_empty() {
                continue;
            }
            let out = self.pair(self.cursor, LeftRows::Visible, right_id)?;
            if !out.is_empty() {
                return Ok(Some(out));
            }
        }
    }
}

/// Pull a batch from a child, attributing failures to that child
pub(crate) fn pull(child: &mut dyn BatchOperator, side: Side) -> Result<Option<RowBatch>> {
    child
        .next_batch()
        .map_err(|e| wrap_child_error(side, child.name(), e))
}

pub(crate) fn wrap_child_error(side: Side, operator: &str, error: Error) -> Error {
    match error {
        // cancellation is not a child failure; keep it recognizable
        Error::QueryCancelled => Error::QueryCancelled,
        other => Error::child_failure(side, operator, other),
    }
}

/// Nested loop join operator.
///
/// ```text
/// open() -> next() ... next() == None -> close()
/// ```
///
/// `open` may be called again to re-run the join from scratch; every buffer,
/// bitset and cursor is cleared.
pub struct NestedLoopJoin {
    left: Box<dyn BatchOperator>,
    right: Box<dyn BatchOperator>,
    strategy: JoinStrategy,
    core: JoinCore,
    schema: Vec<ColumnInfo>,
    name: String,
    opened: bool,
    failure: Option<Error>,
    current: Option<RowBatch>,
}

impl NestedLoopJoin {
    /// Create a buffered nested loop join with default configuration.
    ///
    /// # Arguments
    /// * `left` - Left (outer) input operator
    /// * `right` - Right (inner) input operator
    /// * `join_type` - Type of join (INNER, LEFT, RIGHT, FULL, CROSS)
    /// * `predicate` - Join condition (None for CROSS JOIN)
    pub fn new(
        left: Box<dyn BatchOperator>,
        right: Box<dyn BatchOperator>,
        join_type: JoinType,
        predicate: Option<Arc<dyn JoinPredicate>>,
    ) -> Result<Self> {
        let mut builder = Self::builder(left, right).join_type(join_type);
        if let Some(predicate) = predicate {
            builder = builder.predicate(predicate);
        }
        builder.build()
    }

    /// Start building a join over two children.
    pub fn builder(
        left: Box<dyn BatchOperator>,
        right: Box<dyn BatchOperator>,
    ) -> NestedLoopJoinBuilder {
        NestedLoopJoinBuilder {
            left,
            right,
            join_type: JoinType::Inner,
            predicate: None,
            mode: JoinMode::Buffered,
            config: NestedLoopJoinConfig::default(),
            ctx: ExecutionContext::new(),
        }
    }

    /// Initialize (or re-initialize) the join and open both children.
    pub fn open(&mut self) -> Result<()> {
        self.core.reset();
        if let JoinStrategy::CorrelatedProbe(driver) = &mut self.strategy {
            driver.reset();
        }
        self.failure = None;
        self.current = None;
        self.opened = false;

        self.left
            .open()
            .map_err(|e| wrap_child_error(Side::Left, self.left.name(), e))?;
        if let Err(e) = self.right.open() {
            let error = wrap_child_error(Side::Right, self.right.name(), e);
            if let Err(close_error) = self.left.close() {
                debug!("{}: closing left child failed: {}", self.name, close_error);
            }
            return Err(error);
        }

        self.opened = true;
        debug!("{}: opened", self.name);
        Ok(())
    }

    /// Produce the next non-empty joined batch, or `None` when exhausted.
    pub fn next(&mut self) -> Result<Option<JoinedBatch>> {
        if !self.opened {
            return Err(Error::invariant(format!(
                "{}: next called before open",
                self.name
            )));
        }
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        if self.core.exhausted() {
            return Ok(None);
        }

        let result = match &mut self.strategy {
            JoinStrategy::Buffered => self
                .core
                .next_buffered(self.left.as_mut(), self.right.as_mut()),
            JoinStrategy::CorrelatedProbe(driver) => {
                driver.next(&mut self.core, self.left.as_mut(), self.right.as_mut())
            }
        };

        match result {
            Ok(None) => {
                debug!("{}: exhausted, stats {:?}", self.name, self.core.stats);
                Ok(None)
            }
            Ok(batch) => Ok(batch),
            Err(error) => {
                debug!("{}: failed: {}", self.name, error);
                self.failure = Some(error.clone());
                Err(error)
            }
        }
    }

    /// Close both children and release every buffered batch.
    pub fn close(&mut self) -> Result<()> {
        self.core.reset();
        self.current = None;
        self.opened = false;
        self.left
            .close()
            .map_err(|e| wrap_child_error(Side::Left, self.left.name(), e))?;
        self.right
            .close()
            .map_err(|e| wrap_child_error(Side::Right, self.right.name(), e))?;
        Ok(())
    }

    pub fn join_type(&self) -> JoinType {
        self.core.join_type
    }

    pub fn mode(&self) -> JoinMode {
        match self.strategy {
            JoinStrategy::Buffered => JoinMode::Buffered,
            JoinStrategy::CorrelatedProbe(_) => JoinMode::CorrelatedProbe,
        }
    }

    pub fn config(&self) -> &NestedLoopJoinConfig {
        &self.core.config
    }

    /// Counters for the current execution
    pub fn stats(&self) -> &JoinStats {
        &self.core.stats
    }

    /// Number of batches currently buffered per side (left, right)
    pub fn buffered_batches(&self) -> (usize, usize) {
        (self.core.buffer.left.live(), self.core.buffer.right.live())
    }

    /// Rows held by the buffered batches
    pub fn buffered_rows(&self) -> usize {
        self.core.buffer.buffered_rows()
    }

    /// Match bitset of a buffered batch, when that side is tracked
    pub fn match_bitset(&self, side: Side, batch_id: usize) -> Option<&MatchBitset> {
        self.core.tracker.bitset(side, batch_id)
    }
}

impl fmt::Debug for NestedLoopJoin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NestedLoopJoin")
            .field("name", &self.name)
            .field("left", &self.left.name())
            .field("right", &self.right.name())
            .field("opened", &self.opened)
            .finish()
    }
}

impl BatchOperator for NestedLoopJoin {
    fn open(&mut self) -> Result<()> {
        NestedLoopJoin::open(self)
    }

    fn next_batch(&mut self) -> Result<Option<RowBatch>> {
        let batch = self.next()?.map(|joined| joined.materialize());
        self.current = batch.clone();
        Ok(batch)
    }

    fn current_batch(&self) -> Option<&RowBatch> {
        self.current.as_ref()
    }

    fn close(&mut self) -> Result<()> {
        NestedLoopJoin::close(self)
    }

    fn schema(&self) -> &[ColumnInfo] {
        &self.schema
    }

    fn estimated_rows(&self) -> Option<usize> {
        let left_est = self.left.estimated_rows()?;
        let right_est = self.right.estimated_rows()?;

        Some(match self.core.join_type {
            JoinType::Inner => left_est.saturating_mul(right_est) / 10, // Assume 10% selectivity
            JoinType::Left => left_est,
            JoinType::Right => right_est,
            JoinType::Full => left_est.saturating_add(right_est),
            JoinType::Cross => left_est.saturating_mul(right_est),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Builder for [`NestedLoopJoin`]
pub struct NestedLoopJoinBuilder {
    left: Box<dyn BatchOperator>,
    right: Box<dyn BatchOperator>,
    join_type: JoinType,
    predicate: Option<Arc<dyn JoinPredicate>>,
    mode: JoinMode,
    config: NestedLoopJoinConfig,
    ctx: ExecutionContext,
}

impl NestedLoopJoinBuilder {
    pub fn join_type(mut self, join_type: JoinType) -> Self {
        self.join_type = join_type;
        self
    }

    /// Join condition evaluated for every candidate pair
    pub fn predicate(mut self, predicate: Arc<dyn JoinPredicate>) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn mode(mut self, mode: JoinMode) -> Self {
        self.mode = mode;
        self
    }

    /// Shorthand for `mode(JoinMode::CorrelatedProbe)`
    pub fn correlated(self) -> Self {
        self.mode(JoinMode::CorrelatedProbe)
    }

    pub fn config(mut self, config: NestedLoopJoinConfig) -> Self {
        self.config = config;
        self
    }

    pub fn context(mut self, ctx: ExecutionContext) -> Self {
        self.ctx = ctx;
        self
    }

    /// Validate the plan shape and create the operator.
    ///
    /// Fails with `UnsupportedPushdown` when the correlated mode is asked for
    /// but the condition is not a single column equality, the join type
    /// null-extends right rows, or the right child cannot accept a bound.
    pub fn build(mut self) -> Result<NestedLoopJoin> {
        self.config.validate()?;

        if self.join_type == JoinType::Cross && self.predicate.is_some() {
            return Err(Error::invalid_argument(
                "CROSS JOIN does not take a join condition",
            ));
        }

        let strategy = match self.mode {
            JoinMode::Buffered => JoinStrategy::Buffered,
            JoinMode::CorrelatedProbe => {
                if !matches!(self.join_type, JoinType::Inner | JoinType::Left) {
                    return Err(Error::unsupported_pushdown(format!(
                        "correlated probe cannot run a {} join",
                        self.join_type
                    )));
                }
                let key = self
                    .predicate
                    .as_ref()
                    .and_then(|p| p.equi_key())
                    .ok_or_else(|| {
                        Error::unsupported_pushdown(
                            "correlated probe needs a single column equality condition",
                        )
                    })?;
                if self.right.as_bound_pushable().is_none() {
                    return Err(not_pushable(self.right.name()));
                }
                JoinStrategy::CorrelatedProbe(ProbeDriver::new(key))
            }
        };

        let left_width = self.left.schema().len();
        let right_width = self.right.schema().len();
        let mut schema = Vec::with_capacity(left_width + right_width);
        schema.extend(self.left.schema().iter().cloned());
        schema.extend(self.right.schema().iter().cloned());

        let name = match &strategy {
            JoinStrategy::Buffered => format!("NestedLoop ({})", self.join_type),
            JoinStrategy::CorrelatedProbe(driver) => {
                let key = driver.key();
                debug!(
                    "correlated probe on left.#{} = right.#{}",
                    key.left_column, key.right_column
                );
                format!("IndexProbeNL ({})", self.join_type)
            }
        };
        debug!(
            "{}: left '{}' ({} cols), right '{}' ({} cols)",
            name,
            self.left.name(),
            left_width,
            self.right.name(),
            right_width
        );

        let matcher = PairwiseMatcher::new(self.predicate, left_width, right_width);
        Ok(NestedLoopJoin {
            left: self.left,
            right: self.right,
            strategy,
            core: JoinCore::new(self.join_type, self.config, self.ctx, matcher),
            schema,
            name,
            opened: false,
            failure: None,
            current: None,
        })
    }
}
