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

//! Volcano-style batch operators.
//!
//! - `NestedLoopJoin` - Buffered nested loop join for any join condition,
//!   or a correlated index probe for single column equalities
//! - `IndexLookupOperator` - In-memory keyed scan that accepts a key bound
//!
//! # Strategy Selection
//!
//! | Condition | Mode |
//! |-----------|------|
//! | Any condition, any join type | `JoinMode::Buffered` |
//! | `left.k = right.k`, INNER or LEFT, right side indexed | `JoinMode::CorrelatedProbe` |
//! | CROSS JOIN | `JoinMode::Buffered`, no condition |

pub mod index_lookup;
pub mod nested_loop_join;

pub use index_lookup::{IndexLookupOperator, DEFAULT_LOOKUP_BATCH_SIZE};
pub use nested_loop_join::{
    JoinMode, JoinStats, JoinType, MatchBitset, NestedLoopJoin, NestedLoopJoinBuilder,
};
