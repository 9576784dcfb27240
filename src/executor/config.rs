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

//! Configuration for the nested loop join operator

use crate::core::{Error, Result};

/// Default maximum number of rows in one outer-completion batch
pub const DEFAULT_OUTER_BATCH_SIZE: usize = 1024;

/// Tuning options for [`NestedLoopJoin`](super::operators::NestedLoopJoin)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedLoopJoinConfig {
    /// Maximum rows in one null-extended output batch
    /// Default: 1024
    pub outer_batch_size: usize,

    /// Drop buffered batches once neither pairing nor outer completion
    /// will read them again
    /// Default: true
    pub release_paired_batches: bool,

    /// Observe the context's cancellation flag between loop iterations
    /// Default: true
    pub check_cancellation: bool,
}

impl Default for NestedLoopJoinConfig {
    fn default() -> Self {
        Self {
            outer_batch_size: DEFAULT_OUTER_BATCH_SIZE,
            release_paired_batches: true,
            check_cancellation: true,
        }
    }
}

impl NestedLoopJoinConfig {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a config that emits small outer-completion batches, for
    /// consumers that want the first rows early
    pub fn small_batches() -> Self {
        Self {
            outer_batch_size: 64,
            ..Self::default()
        }
    }

    /// Builder method to set the outer-completion batch size
    pub fn with_outer_batch_size(mut self, rows: usize) -> Self {
        self.outer_batch_size = rows;
        self
    }

    /// Builder method to enable/disable batch retirement
    pub fn with_release_paired_batches(mut self, enabled: bool) -> Self {
        self.release_paired_batches = enabled;
        self
    }

    /// Builder method to enable/disable cancellation checks
    pub fn with_check_cancellation(mut self, enabled: bool) -> Self {
        self.check_cancellation = enabled;
        self
    }

    /// Reject settings the join cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.outer_batch_size == 0 {
            return Err(Error::invalid_argument(
                "outer_batch_size must be greater than zero",
            ));
        }
        Ok(())
    }
}
