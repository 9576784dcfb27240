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

//! Row type - an ordered collection of column values

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Deref, Index};
use std::sync::Arc;

use super::error::{Error, Result};
use super::types::DataType;
use super::value::Value;

/// Internal storage for Row - either owned Vec or shared Arc
#[derive(Debug, Clone)]
enum RowStorage {
    Owned(Vec<Value>),
    /// O(1) clone; rows held by batches are usually shared
    Shared(Arc<[Value]>),
}

impl Default for RowStorage {
    fn default() -> Self {
        RowStorage::Owned(Vec::new())
    }
}

impl RowStorage {
    #[inline]
    fn as_slice(&self) -> &[Value] {
        match self {
            RowStorage::Owned(v) => v,
            RowStorage::Shared(a) => a,
        }
    }

    #[inline]
    fn into_vec(self) -> Vec<Value> {
        match self {
            RowStorage::Owned(v) => v,
            RowStorage::Shared(arc) => arc.to_vec(),
        }
    }
}

/// A row of column values
///
/// Rows are immutable once built. A row created with [`Row::from_arc`] shares
/// its values, so cloning it is a reference count bump.
#[derive(Debug, Clone, Default)]
pub struct Row {
    storage: RowStorage,
}

impl Row {
    /// Create a new empty row
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a row from a vector of values
    #[inline]
    pub fn from_values(values: Vec<Value>) -> Self {
        Self {
            storage: RowStorage::Owned(values),
        }
    }

    /// Create a row from an Arc slice - O(1) clone
    #[inline]
    pub fn from_arc(values: Arc<[Value]>) -> Self {
        Self {
            storage: RowStorage::Shared(values),
        }
    }

    /// Create a row of `width` untyped NULLs (outer join padding)
    pub fn nulls(width: usize) -> Self {
        Self::repeat(Value::null(DataType::Null), width)
    }

    /// Create a row by repeating a value
    pub fn repeat(value: Value, count: usize) -> Row {
        Row::from_values(vec![value; count])
    }

    /// Create a row by combining two rows (for JOINs) - clones values
    #[inline]
    pub fn from_combined(left: &Row, right: &Row) -> Self {
        let mut values = Vec::with_capacity(left.len() + right.len());
        values.extend(left.iter().cloned());
        values.extend(right.iter().cloned());
        Self::from_values(values)
    }

    /// Get the number of values in the row
    #[inline]
    pub fn len(&self) -> usize {
        self.storage.as_slice().len()
    }

    /// Check if the row is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get a value by index
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.storage.as_slice().get(index)
    }

    /// Get a value by index, failing with `ColumnIndexOutOfBounds`
    pub fn try_get(&self, index: usize) -> Result<&Value> {
        self.get(index)
            .ok_or(Error::ColumnIndexOutOfBounds { index })
    }

    /// Get an iterator over the values
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.storage.as_slice().iter()
    }

    /// Get the underlying vector of values
    #[inline]
    pub fn into_values(self) -> Vec<Value> {
        self.storage.into_vec()
    }

    #[inline]
    pub fn as_slice(&self) -> &[Value] {
        self.storage.as_slice()
    }

    /// Convert to shared storage so further clones are cheap
    pub fn into_shared(self) -> Row {
        match self.storage {
            RowStorage::Shared(_) => self,
            RowStorage::Owned(v) => Row::from_arc(Arc::from(v)),
        }
    }
}

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for Row {}

impl Hash for Row {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_slice().hash(state);
    }
}

impl Deref for Row {
    type Target = [Value];

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.storage.as_slice()
    }
}

impl Index<usize> for Row {
    type Output = Value;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        &self.storage.as_slice()[index]
    }
}

impl FromIterator<Value> for Row {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Row::from_values(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Row {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.storage.as_slice().iter()
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Row::from_values(values)
    }
}

impl From<Arc<[Value]>> for Row {
    fn from(values: Arc<[Value]>) -> Self {
        Row::from_arc(values)
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, value) in self.storage.as_slice().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
        }
        write!(f, ")")
    }
}

/// Macro for creating rows conveniently
#[macro_export]
macro_rules! row {
    () => {
        $crate::core::Row::new()
    };
    ($($value:expr),+ $(,)?) => {
        $crate::core::Row::from_values(vec![$($crate::core::Value::from($value)),+])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_from_values() {
        let row = Row::from_values(vec![
            Value::integer(1),
            Value::text("hello"),
            Value::null(DataType::Text),
        ]);
        assert_eq!(row.len(), 3);
        assert_eq!(row.get(0), Some(&Value::integer(1)));
        assert!(row[2].is_null());
        assert!(row.get(3).is_none());
    }

    #[test]
    fn test_try_get_out_of_bounds() {
        let row = Row::from_values(vec![Value::integer(1)]);
        assert_eq!(
            row.try_get(4),
            Err(Error::ColumnIndexOutOfBounds { index: 4 })
        );
    }

    #[test]
    fn test_from_combined() {
        let left = Row::from_values(vec![Value::integer(1)]);
        let right = Row::from_values(vec![Value::text("a"), Value::boolean(true)]);
        let combined = Row::from_combined(&left, &right);
        assert_eq!(combined.len(), 3);
        assert_eq!(combined.to_string(), "(1, a, true)");
    }

    #[test]
    fn test_nulls() {
        let row = Row::nulls(2);
        assert_eq!(row.len(), 2);
        assert!(row.iter().all(Value::is_null));
        assert_eq!(row.to_string(), "(NULL, NULL)");
    }

    #[test]
    fn test_shared_equals_owned() {
        let owned = Row::from_values(vec![Value::integer(1), Value::text("x")]);
        let shared = owned.clone().into_shared();
        assert_eq!(owned, shared);
        assert_eq!(shared.clone().into_values().len(), 2);
    }

    #[test]
    fn test_row_macro() {
        let row = crate::row![1i64, "two", 3.0];
        assert_eq!(row.len(), 3);
        assert_eq!(row[1], Value::text("two"));
        assert!(crate::row![].is_empty());
    }
}
