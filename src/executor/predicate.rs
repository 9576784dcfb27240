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

//! Join conditions.
//!
//! A join condition evaluates a (left row, right row) pair to a three-valued
//! result. Only [`PredicateResult::False`] rejects a pair.

use std::fmt;
use std::sync::Arc;

use crate::core::{Error, Operator, Result, Row};

use super::context::ExecutionContext;

/// Three-valued outcome of a join condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredicateResult {
    True,
    False,
    /// The condition involved a NULL and could not be decided
    Unknown,
}

impl PredicateResult {
    #[inline]
    pub fn from_bool(value: bool) -> Self {
        if value {
            PredicateResult::True
        } else {
            PredicateResult::False
        }
    }

    #[inline]
    pub fn is_false(self) -> bool {
        self == PredicateResult::False
    }

    /// SQL three-valued AND
    #[inline]
    pub fn and(self, other: PredicateResult) -> PredicateResult {
        match (self, other) {
            (PredicateResult::False, _) | (_, PredicateResult::False) => PredicateResult::False,
            (PredicateResult::True, PredicateResult::True) => PredicateResult::True,
            _ => PredicateResult::Unknown,
        }
    }
}

/// A single-column equality between the two sides
///
/// The correlated probe pushes the left row's `left_column` value into the
/// right child as a bound on `right_column`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EquiKey {
    pub left_column: usize,
    pub right_column: usize,
}

/// A join condition over a pair of rows.
pub trait JoinPredicate: Send + Sync + fmt::Debug {
    /// Evaluate the condition for one pair.
    fn evaluate(&self, left: &Row, right: &Row, ctx: &ExecutionContext)
        -> Result<PredicateResult>;

    /// The column pair when this condition is exactly one column equality.
    fn equi_key(&self) -> Option<EquiKey> {
        None
    }
}

/// `left[left_column] <op> right[right_column]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnComparison {
    pub left_column: usize,
    pub op: Operator,
    pub right_column: usize,
}

impl ColumnComparison {
    pub fn new(left_column: usize, op: Operator, right_column: usize) -> Self {
        Self {
            left_column,
            op,
            right_column,
        }
    }

    /// `left[left_column] = right[right_column]`
    pub fn eq(left_column: usize, right_column: usize) -> Self {
        Self::new(left_column, Operator::Eq, right_column)
    }
}

impl JoinPredicate for ColumnComparison {
    fn evaluate(
        &self,
        left: &Row,
        right: &Row,
        _ctx: &ExecutionContext,
    ) -> Result<PredicateResult> {
        let l = left.try_get(self.left_column)?;
        let r = right.try_get(self.right_column)?;
        if l.is_null() || r.is_null() {
            return Ok(PredicateResult::Unknown);
        }
        match l.compare(r) {
            Ok(ordering) => Ok(PredicateResult::from_bool(self.op.holds(ordering))),
            Err(Error::NullComparison) => Ok(PredicateResult::Unknown),
            Err(e) => Err(e),
        }
    }

    fn equi_key(&self) -> Option<EquiKey> {
        (self.op == Operator::Eq).then_some(EquiKey {
            left_column: self.left_column,
            right_column: self.right_column,
        })
    }
}

impl fmt::Display for ColumnComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "left.#{} {} right.#{}",
            self.left_column, self.op, self.right_column
        )
    }
}

/// AND of several conditions
#[derive(Debug, Clone, Default)]
pub struct Conjunction {
    terms: Vec<Arc<dyn JoinPredicate>>,
}

impl Conjunction {
    pub fn new(terms: Vec<Arc<dyn JoinPredicate>>) -> Self {
        Self { terms }
    }

    pub fn and(mut self, term: impl JoinPredicate + 'static) -> Self {
        self.terms.push(Arc::new(term));
        self
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl JoinPredicate for Conjunction {
    fn evaluate(
        &self,
        left: &Row,
        right: &Row,
        ctx: &ExecutionContext,
    ) -> Result<PredicateResult> {
        let mut result = PredicateResult::True;
        for term in &self.terms {
            result = result.and(term.evaluate(left, right, ctx)?);
            if result.is_false() {
                break;
            }
        }
        Ok(result)
    }

    fn equi_key(&self) -> Option<EquiKey> {
        // more than one term is not a single equality, even if one term is
        match self.terms.as_slice() {
            [only] => only.equi_key(),
            _ => None,
        }
    }
}

type PredicateFn =
    dyn Fn(&Row, &Row, &ExecutionContext) -> Result<PredicateResult> + Send + Sync;

/// Condition backed by a closure
#[derive(Clone)]
pub struct FnPredicate {
    name: String,
    func: Arc<PredicateFn>,
}

impl FnPredicate {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Row, &Row, &ExecutionContext) -> Result<PredicateResult> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }
}

impl fmt::Debug for FnPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnPredicate").field("name", &self.name).finish()
    }
}

impl JoinPredicate for FnPredicate {
    fn evaluate(
        &self,
        left: &Row,
        right: &Row,
        ctx: &ExecutionContext,
    ) -> Result<PredicateResult> {
        (self.func)(left, right, ctx)
    }
}
