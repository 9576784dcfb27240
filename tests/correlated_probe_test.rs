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

//! Correlated Probe Tests
//!
//! Index nested loop joins where each left key is pushed into the right child:
//! - Per-row pairing and NULL keys
//! - Lazy scan state resets between probes
//! - Plan shapes the probe cannot run

use std::sync::{Arc, Mutex};

use nljoin::{
    BatchOperator, BoundPushable, ColumnComparison, ColumnInfo, Error, IndexLookupOperator,
    JoinMode, JoinType, MaterializedOperator, NestedLoopJoin, NestedLoopJoinConfig, Operator,
    Result, Row, RowBatch, Value,
};

type EventLog = Arc<Mutex<Vec<String>>>;

/// Index lookup that records every bound push, reset and exhaustion
struct RecordingLookup {
    inner: IndexLookupOperator,
    log: EventLog,
    reset_error: Option<Error>,
}

impl RecordingLookup {
    fn new(inner: IndexLookupOperator) -> (Self, EventLog) {
        let log = EventLog::default();
        (
            Self {
                inner,
                log: Arc::clone(&log),
                reset_error: None,
            },
            log,
        )
    }

    fn record(&self, event: String) {
        self.log.lock().unwrap().push(event);
    }
}

impl BatchOperator for RecordingLookup {
    fn open(&mut self) -> Result<()> {
        self.inner.open()
    }

    fn next_batch(&mut self) -> Result<Option<RowBatch>> {
        let batch = self.inner.next_batch()?;
        if batch.is_none() {
            self.record("exhausted".to_string());
        }
        Ok(batch)
    }

    fn current_batch(&self) -> Option<&RowBatch> {
        self.inner.current_batch()
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }

    fn schema(&self) -> &[ColumnInfo] {
        self.inner.schema()
    }

    fn name(&self) -> &str {
        "RecordingLookup"
    }

    fn as_bound_pushable(&mut self) -> Option<&mut dyn BoundPushable> {
        Some(self)
    }
}

impl BoundPushable for RecordingLookup {
    fn push_bound(&mut self, column: usize, value: &Value) -> bool {
        self.record(format!("push {}", value));
        self.inner.push_bound(column, value)
    }

    fn reset_scan_state(&mut self) -> Result<()> {
        self.record("reset".to_string());
        if let Some(error) = &self.reset_error {
            return Err(error.clone());
        }
        self.inner.reset_scan_state()
    }
}

fn keyed_rows(data: &[(Option<i64>, &str)]) -> Vec<Row> {
    data.iter()
        .map(|(k, v)| {
            let key = k.map(Value::integer).unwrap_or_else(Value::null_unknown);
            Row::from_values(vec![key, Value::text(*v)])
        })
        .collect()
}

fn left_keys(keys: &[Option<i64>], batch_size: usize) -> Box<dyn BatchOperator> {
    let rows = keys
        .iter()
        .map(|k| Row::from_values(vec![k.map(Value::integer).unwrap_or_else(Value::null_unknown)]))
        .collect();
    Box::new(MaterializedOperator::new(rows, vec![ColumnInfo::new("k")], batch_size))
}

fn lookup(data: &[(Option<i64>, &str)]) -> IndexLookupOperator {
    IndexLookupOperator::new(
        keyed_rows(data),
        vec![ColumnInfo::new("k"), ColumnInfo::new("payload")],
        0,
    )
    .unwrap()
}

fn probe_join(
    left: Box<dyn BatchOperator>,
    right: Box<dyn BatchOperator>,
    join_type: JoinType,
) -> NestedLoopJoin {
    NestedLoopJoin::builder(left, right)
        .join_type(join_type)
        .predicate(Arc::new(ColumnComparison::eq(0, 0)))
        .correlated()
        .build()
        .unwrap()
}

fn drain(join: &mut NestedLoopJoin) -> Vec<String> {
    join.open().unwrap();
    let mut out = Vec::new();
    while let Some(batch) = join.next().unwrap() {
        assert!(!batch.is_empty());
        out.extend(batch.rows().map(|r| r.to_row().to_string()));
    }
    out
}

#[test]
fn test_inner_probe_pairs_only_matching_key() {
    let right = Box::new(lookup(&[(Some(5), "rowA")]));
    let mut join = probe_join(left_keys(&[Some(5), Some(7)], 0), right, JoinType::Inner);
    assert_eq!(join.mode(), JoinMode::CorrelatedProbe);

    assert_eq!(drain(&mut join), vec!["(5, 5, rowA)"]);
    assert_eq!(join.stats().probes, 2);
}

#[test]
fn test_left_probe_pads_rows_without_matches() {
    let right = Box::new(lookup(&[(Some(5), "rowA")]));
    let mut join = probe_join(left_keys(&[Some(5), Some(7)], 0), right, JoinType::Left);

    assert_eq!(drain(&mut join), vec!["(5, 5, rowA)", "(7, NULL, NULL)"]);
    assert_eq!(join.stats().outer_rows, 1);
}

#[test]
fn test_null_key_is_not_probed() {
    let right = Box::new(lookup(&[(Some(5), "rowA"), (None, "nullkey")]));
    let mut join = probe_join(left_keys(&[None, Some(5)], 1), right, JoinType::Left);

    let mut rows = drain(&mut join);
    rows.sort();
    assert_eq!(rows, vec!["(5, 5, rowA)", "(NULL, NULL, NULL)"]);
    assert_eq!(join.stats().probes, 1);
    assert_eq!(join.stats().null_keys_skipped, 1);
}

#[test]
fn test_each_right_batch_pairs_with_its_probe_row() {
    let inner = lookup(&[(Some(5), "x"), (Some(5), "y"), (Some(7), "z")])
        .with_batch_size(1)
        .unwrap();
    let mut join = probe_join(
        left_keys(&[Some(5), Some(5), Some(7), Some(9)], 0),
        Box::new(inner),
        JoinType::Inner,
    );

    let rows = drain(&mut join);
    assert_eq!(
        rows,
        vec!["(5, 5, x)", "(5, 5, y)", "(5, 5, x)", "(5, 5, y)", "(7, 7, z)"]
    );
    // one evaluation per returned right row, never against other left rows
    assert_eq!(join.stats().evaluations, 5);
    assert_eq!(join.stats().probes, 4);
}

#[test]
fn test_scan_state_reset_lazily_before_next_push() {
    let (right, log) = RecordingLookup::new(lookup(&[(Some(5), "rowA"), (Some(7), "rowB")]));
    let mut join = probe_join(left_keys(&[Some(5), Some(7)], 1), Box::new(right), JoinType::Inner);

    assert_eq!(drain(&mut join), vec!["(5, 5, rowA)", "(7, 7, rowB)"]);
    let events = log.lock().unwrap().clone();
    assert_eq!(
        events,
        vec!["push 5", "exhausted", "reset", "push 7", "exhausted"]
    );
}

#[test]
fn test_probe_retires_buffered_batches() {
    let right = Box::new(lookup(&[(Some(1), "a"), (Some(2), "b")]));
    let mut join = probe_join(left_keys(&[Some(1), Some(2), Some(3)], 1), right, JoinType::Inner);

    drain(&mut join);
    assert_eq!(join.buffered_rows(), 0);
    assert!(join.stats().retired_batches > 0);
}

#[test]
fn test_probe_keeps_batches_when_release_disabled() {
    let right = Box::new(lookup(&[(Some(1), "a")]));
    let mut join = NestedLoopJoin::builder(left_keys(&[Some(1), Some(2)], 1), right)
        .predicate(Arc::new(ColumnComparison::eq(0, 0)))
        .config(NestedLoopJoinConfig::new().with_release_paired_batches(false))
        .correlated()
        .build()
        .unwrap();

    drain(&mut join);
    assert_eq!(join.buffered_batches(), (2, 1));
    assert_eq!(join.stats().retired_batches, 0);
}

#[test]
fn test_probe_rejected_bound_fails() {
    // lookup is keyed on column 0, the condition binds column 1
    let right = Box::new(lookup(&[(Some(1), "a")]));
    let mut join = NestedLoopJoin::builder(left_keys(&[Some(1)], 1), right)
        .predicate(Arc::new(ColumnComparison::eq(0, 1)))
        .correlated()
        .build()
        .unwrap();

    join.open().unwrap();
    assert!(matches!(join.next(), Err(Error::UnsupportedPushdown(_))));
}

#[test]
fn test_probe_rejects_outer_right_and_full() {
    for join_type in [JoinType::Right, JoinType::Full, JoinType::Cross] {
        let right = Box::new(lookup(&[(Some(1), "a")]));
        let mut builder = NestedLoopJoin::builder(left_keys(&[Some(1)], 1), right)
            .join_type(join_type)
            .correlated();
        if join_type != JoinType::Cross {
            builder = builder.predicate(Arc::new(ColumnComparison::eq(0, 0)));
        }
        let err = builder.build().unwrap_err();
        assert!(err.is_fatal_configuration(), "{:?}", err);
    }
}

#[test]
fn test_probe_rejects_non_equality() {
    let right = Box::new(lookup(&[(Some(1), "a")]));
    let err = NestedLoopJoin::builder(left_keys(&[Some(1)], 1), right)
        .predicate(Arc::new(ColumnComparison::new(0, Operator::Lt, 0)))
        .correlated()
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedPushdown(_)));
}

#[test]
fn test_probe_reopen() {
    let right = Box::new(lookup(&[(Some(5), "rowA")]));
    let mut join = probe_join(left_keys(&[Some(5), Some(7)], 1), right, JoinType::Left);

    let first = drain(&mut join);
    join.close().unwrap();
    let second = drain(&mut join);
    assert_eq!(first, second);
}

#[test]
fn test_reset_cancellation_is_not_wrapped() {
    let (mut right, _log) = RecordingLookup::new(lookup(&[(Some(5), "rowA")]));
    right.reset_error = Some(Error::QueryCancelled);
    let mut join = probe_join(left_keys(&[Some(5), Some(7)], 0), Box::new(right), JoinType::Inner);

    join.open().unwrap();
    assert!(join.next().unwrap().is_some());
    assert_eq!(join.next().unwrap_err(), Error::QueryCancelled);
}

#[test]
fn test_reset_failure_is_child_failure() {
    let (mut right, _log) = RecordingLookup::new(lookup(&[(Some(5), "rowA")]));
    right.reset_error = Some(Error::internal("index dropped"));
    let mut join = probe_join(left_keys(&[Some(5), Some(7)], 0), Box::new(right), JoinType::Inner);

    join.open().unwrap();
    assert!(join.next().unwrap().is_some());
    let err = join.next().unwrap_err();
    assert!(err.is_child_failure());
    assert_eq!(err.root_cause(), &Error::internal("index dropped"));
}
