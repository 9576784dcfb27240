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

//! Join executor
//!
//! Operators follow a pull-based lifecycle:
//!
//! ```text
//! open()
//!   ↓
//! next_batch() ... until None
//!   ↓
//! close()
//! ```
//!
//! # Components
//!
//! - [`BatchOperator`] - The child operator interface
//! - [`RowBatch`] / [`JoinedBatch`] - Input batches and position-list output
//! - [`JoinPredicate`] - Three-valued join conditions
//! - [`NestedLoopJoin`] - The join operator itself
//! - [`ExecutionContext`] - Parameters and cancellation

pub mod batch;
pub mod config;
pub mod context;
pub mod operator;
pub mod operators;
pub mod predicate;

pub use batch::{JoinedBatch, JoinedRow, RowBatch, RowPosition, SidePositions, VisibleRows};
pub use config::{NestedLoopJoinConfig, DEFAULT_OUTER_BATCH_SIZE};
pub use context::{CancellationHandle, ExecutionContext, ExecutionContextBuilder};
pub use operator::{BatchOperator, BoundPushable, ColumnInfo, EmptyOperator, MaterializedOperator};
pub use operators::{
    IndexLookupOperator, JoinMode, JoinStats, JoinType, MatchBitset, NestedLoopJoin,
    NestedLoopJoinBuilder,
};
pub use predicate::{
    ColumnComparison, Conjunction, EquiKey, FnPredicate, JoinPredicate, PredicateResult,
};
