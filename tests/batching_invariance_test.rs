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

//! Batching Invariance Tests
//!
//! The multiset of joined rows must not depend on how the inputs are split
//! into batches, on outer-completion batch size or on batch retirement.
//! Randomized inputs are checked against a naive row-at-a-time model.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;

use nljoin::{
    BatchOperator, ColumnComparison, ColumnInfo, IndexLookupOperator, JoinType,
    MaterializedOperator, NestedLoopJoin, NestedLoopJoinConfig, Row, Value,
};

const SEEDS: [u64; 4] = [7, 42, 1234, 9001];
const BATCH_SIZES: [usize; 5] = [0, 1, 2, 3, 7];

fn random_rows(rng: &mut StdRng, count: usize, id_base: i64, nulls: bool) -> Vec<Row> {
    (0..count)
        .map(|i| {
            let key = if nulls && rng.random_range(0..8) == 0 {
                Value::null_unknown()
            } else {
                Value::integer(rng.random_range(0..5))
            };
            Row::from_values(vec![key, Value::integer(id_base + i as i64)])
        })
        .collect()
}

fn source(rows: &[Row], batch_size: usize) -> Box<dyn BatchOperator> {
    Box::new(MaterializedOperator::new(
        rows.to_vec(),
        vec![ColumnInfo::new("k"), ColumnInfo::new("id")],
        batch_size,
    ))
}

/// NULL compares as Unknown, which keeps the pair
fn model_matches(l: &Row, r: &Row) -> bool {
    l[0].is_null() || r[0].is_null() || l[0] == r[0]
}

fn padded(left: Option<&Row>, right: Option<&Row>) -> String {
    let l = left.cloned().unwrap_or_else(|| Row::nulls(2));
    let r = right.cloned().unwrap_or_else(|| Row::nulls(2));
    Row::from_combined(&l, &r).to_string()
}

fn expected(left: &[Row], right: &[Row], join_type: JoinType) -> FxHashMap<String, usize> {
    let mut out: FxHashMap<String, usize> = FxHashMap::default();
    let mut right_matched = vec![false; right.len()];
    for l in left {
        let mut matched = false;
        for (j, r) in right.iter().enumerate() {
            if join_type == JoinType::Cross || model_matches(l, r) {
                matched = true;
                right_matched[j] = true;
                *out.entry(padded(Some(l), Some(r))).or_default() += 1;
            }
        }
        if !matched && join_type.needs_left_completion() {
            *out.entry(padded(Some(l), None)).or_default() += 1;
        }
    }
    if join_type.needs_right_completion() {
        for (j, r) in right.iter().enumerate() {
            if !right_matched[j] {
                *out.entry(padded(None, Some(r))).or_default() += 1;
            }
        }
    }
    out
}

fn actual(join: &mut NestedLoopJoin) -> FxHashMap<String, usize> {
    let mut out: FxHashMap<String, usize> = FxHashMap::default();
    join.open().unwrap();
    while let Some(batch) = join.next().unwrap() {
        assert!(!batch.is_empty());
        for row in batch.rows() {
            *out.entry(row.to_row().to_string()).or_default() += 1;
        }
    }
    join.close().unwrap();
    out
}

fn build(
    left: Box<dyn BatchOperator>,
    right: Box<dyn BatchOperator>,
    join_type: JoinType,
    config: NestedLoopJoinConfig,
) -> NestedLoopJoin {
    let mut builder = NestedLoopJoin::builder(left, right)
        .join_type(join_type)
        .config(config);
    if join_type != JoinType::Cross {
        builder = builder.predicate(Arc::new(ColumnComparison::eq(0, 0)));
    }
    builder.build().unwrap()
}

#[test]
fn test_buffered_join_matches_model() {
    let join_types = [
        JoinType::Inner,
        JoinType::Left,
        JoinType::Right,
        JoinType::Full,
        JoinType::Cross,
    ];
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let left_count = rng.random_range(0..12);
        let right_count = rng.random_range(0..12);
        let left = random_rows(&mut rng, left_count, 0, true);
        let right = random_rows(&mut rng, right_count, 1000, true);

        for join_type in join_types {
            let want = expected(&left, &right, join_type);
            for lb in BATCH_SIZES {
                for rb in BATCH_SIZES {
                    for release in [true, false] {
                        let config = NestedLoopJoinConfig::new()
                            .with_outer_batch_size(rng.random_range(1..5))
                            .with_release_paired_batches(release);
                        let mut join =
                            build(source(&left, lb), source(&right, rb), join_type, config);
                        assert_eq!(
                            actual(&mut join),
                            want,
                            "seed {} {} left batch {} right batch {} release {}",
                            seed,
                            join_type,
                            lb,
                            rb,
                            release
                        );
                    }
                }
            }
        }
    }
}

#[test]
fn test_full_join_is_symmetric() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let a = random_rows(&mut rng, 9, 0, true);
        let b = random_rows(&mut rng, 6, 1000, true);

        let mut ab = build(
            source(&a, 2),
            source(&b, 3),
            JoinType::Full,
            NestedLoopJoinConfig::new(),
        );
        let mut ba = build(
            source(&b, 4),
            source(&a, 1),
            JoinType::Full,
            NestedLoopJoinConfig::new(),
        );

        let forward = actual(&mut ab);
        let mut swapped: FxHashMap<String, usize> = FxHashMap::default();
        ba.open().unwrap();
        while let Some(batch) = ba.next().unwrap() {
            for row in batch.rows() {
                let row = row.to_row();
                let flipped = Row::from_values(vec![
                    row[2].clone(),
                    row[3].clone(),
                    row[0].clone(),
                    row[1].clone(),
                ]);
                *swapped.entry(flipped.to_string()).or_default() += 1;
            }
        }
        assert_eq!(forward, swapped, "seed {}", seed);
    }
}

#[test]
fn test_correlated_probe_agrees_with_buffered() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let left = random_rows(&mut rng, 10, 0, false);
        let right = random_rows(&mut rng, 8, 1000, false);

        for join_type in [JoinType::Inner, JoinType::Left] {
            let want = expected(&left, &right, join_type);
            for lb in BATCH_SIZES {
                let lookup = IndexLookupOperator::new(
                    right.clone(),
                    vec![ColumnInfo::new("k"), ColumnInfo::new("id")],
                    0,
                )
                .unwrap()
                .with_batch_size(rng.random_range(1..4))
                .unwrap();
                let mut join = NestedLoopJoin::builder(source(&left, lb), Box::new(lookup))
                    .join_type(join_type)
                    .predicate(Arc::new(ColumnComparison::eq(0, 0)))
                    .correlated()
                    .build()
                    .unwrap();
                assert_eq!(actual(&mut join), want, "seed {} {} batch {}", seed, join_type, lb);
            }
        }
    }
}
