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

//! # nljoin - Batch-at-a-time nested loop join
//!
//! A resumable nested loop join operator for Volcano-style query engines.
//! It pulls row batches from two child operators, evaluates an arbitrary
//! join condition for every candidate pair and returns joined rows as
//! position lists that reference the input batches.
//!
//! ## Key Features
//!
//! - **All join types** - INNER, LEFT, RIGHT, FULL and CROSS
//! - **Outer completion** - Match bitsets per buffered batch drive
//!   null-extension of unmatched rows, resumable across calls
//! - **Correlated probe** - Pushes each left key into an indexed right child
//! - **Three-valued conditions** - Only FALSE rejects a pair
//! - **Cooperative cancellation** - Checked on every step
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use nljoin::{
//!     ColumnComparison, ColumnInfo, JoinType, MaterializedOperator,
//!     NestedLoopJoin, Row, Value,
//! };
//!
//! let users = MaterializedOperator::new(
//!     vec![Row::from_values(vec![Value::integer(1), Value::text("alice")])],
//!     vec![ColumnInfo::new("id"), ColumnInfo::new("name")],
//!     0,
//! );
//! let orders = MaterializedOperator::new(
//!     vec![Row::from_values(vec![Value::integer(1), Value::float(9.5)])],
//!     vec![ColumnInfo::new("user_id"), ColumnInfo::new("total")],
//!     0,
//! );
//!
//! let mut join = NestedLoopJoin::new(
//!     Box::new(users),
//!     Box::new(orders),
//!     JoinType::Left,
//!     Some(Arc::new(ColumnComparison::eq(0, 0))),
//! )
//! .unwrap();
//!
//! join.open().unwrap();
//! while let Some(batch) = join.next().unwrap() {
//!     for row in batch.rows() {
//!         println!("{}", row.to_row());
//!     }
//! }
//! join.close().unwrap();
//! ```
//!
//! ## Modules
//!
//! - [`core`] - Core types ([`DataType`], [`Value`], [`Row`], [`Error`])
//! - [`executor`] - Batches, predicates, operators and the join itself

pub mod core;
pub mod executor;

// Re-export main types for convenience
pub use core::{DataType, Error, Operator, Result, Row, Side, Value};

pub use executor::{
    BatchOperator, BoundPushable, CancellationHandle, ColumnComparison, ColumnInfo, Conjunction,
    EmptyOperator, EquiKey, ExecutionContext, FnPredicate, IndexLookupOperator, JoinMode,
    JoinPredicate, JoinStats, JoinType, JoinedBatch, JoinedRow, MaterializedOperator,
    NestedLoopJoin, NestedLoopJoinBuilder, NestedLoopJoinConfig, PredicateResult, RowBatch,
};
