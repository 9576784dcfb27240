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

//! Error types for the join executor
//!
//! Clean exhaustion of an operator is `Ok(None)` and never an error. Every
//! variant here aborts the current call; none are retried internally.

use std::fmt;

use thiserror::Error;

/// Result type alias for executor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Which input of a binary operator an error or batch belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Outer (left) input
    Left,
    /// Inner (right) input
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}

/// Main error type for the executor
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // =========================================================================
    // Join errors
    // =========================================================================
    /// A child operator failed for a reason other than clean exhaustion
    #[error("{side} child '{operator}' failed: {source}")]
    ChildFailure {
        side: Side,
        operator: String,
        #[source]
        source: Box<Error>,
    },

    /// Correlated probe configured against a child or predicate that cannot
    /// accept a pushed key bound
    #[error("unsupported pushdown: {0}")]
    UnsupportedPushdown(String),

    /// Internal consistency check failed (caller or configuration bug)
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Query cancelled
    #[error("query cancelled")]
    QueryCancelled,

    // =========================================================================
    // Comparison errors
    // =========================================================================
    /// Cannot compare NULL with non-NULL value
    #[error("cannot compare NULL with non-NULL value")]
    NullComparison,

    /// Cannot compare incompatible types
    #[error("cannot compare incompatible types")]
    IncomparableTypes,

    // =========================================================================
    // Other errors
    // =========================================================================
    /// Column index out of bounds
    #[error("column index {index} out of bounds")]
    ColumnIndexOutOfBounds { index: usize },

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Parse error
    #[error("parse error: {0}")]
    Parse(String),

    /// Internal error for unexpected conditions
    #[error("{message}")]
    Internal { message: String },
}

impl Error {
    /// Wrap an error returned by a child operator
    pub fn child_failure(side: Side, operator: impl Into<String>, source: Error) -> Self {
        Error::ChildFailure {
            side,
            operator: operator.into(),
            source: Box::new(source),
        }
    }

    /// Create a new UnsupportedPushdown error
    pub fn unsupported_pushdown(message: impl Into<String>) -> Self {
        Error::UnsupportedPushdown(message.into())
    }

    /// Create a new InvariantViolation error
    pub fn invariant(message: impl Into<String>) -> Self {
        Error::InvariantViolation(message.into())
    }

    /// Create a new Parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Error::Parse(message.into())
    }

    /// Create a new Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
        }
    }

    /// Create a new InvalidArgument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }

    /// Check if this error was raised by a child operator
    pub fn is_child_failure(&self) -> bool {
        matches!(self, Error::ChildFailure { .. })
    }

    /// Check if this error indicates a plan or configuration bug rather
    /// than a runtime condition
    pub fn is_fatal_configuration(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedPushdown(_) | Error::InvariantViolation(_)
        )
    }

    /// The innermost error, unwrapping nested child failures
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::ChildFailure { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(Error::QueryCancelled.to_string(), "query cancelled");
        assert_eq!(
            Error::unsupported_pushdown("right child 'Scan' cannot accept a key bound")
                .to_string(),
            "unsupported pushdown: right child 'Scan' cannot accept a key bound"
        );
        assert_eq!(
            Error::invariant("cursor 3 out of range").to_string(),
            "invariant violation: cursor 3 out of range"
        );
        assert_eq!(
            Error::NullComparison.to_string(),
            "cannot compare NULL with non-NULL value"
        );
    }

    #[test]
    fn test_child_failure_wraps_source() {
        let err = Error::child_failure(Side::Left, "Materialized", Error::internal("disk gone"));
        assert_eq!(err.to_string(), "left child 'Materialized' failed: disk gone");
        assert!(err.is_child_failure());
        assert_eq!(err.root_cause(), &Error::internal("disk gone"));

        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("disk gone"));
    }

    #[test]
    fn test_nested_child_failure_root_cause() {
        let inner = Error::child_failure(Side::Right, "IndexLookup", Error::QueryCancelled);
        let outer = Error::child_failure(Side::Left, "NestedLoop (INNER)", inner);
        assert_eq!(outer.root_cause(), &Error::QueryCancelled);
    }

    #[test]
    fn test_error_classification() {
        assert!(Error::unsupported_pushdown("x").is_fatal_configuration());
        assert!(Error::invariant("x").is_fatal_configuration());
        assert!(!Error::QueryCancelled.is_fatal_configuration());
        assert!(!Error::internal("x").is_child_failure());
    }

    #[test]
    fn test_side_display() {
        assert_eq!(Side::Left.to_string(), "left");
        assert_eq!(Side::Right.to_string(), "right");
    }
}
