//! Materialized result rows.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::db::{DbError, Result};
use crate::value::{FromValue, Value};

/// Column names of a prepared statement and their positions, shared by
/// every row the statement produces.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct ColumnIndex {
    names: Vec<String>,
    positions: HashMap<String, usize>,
}

impl ColumnIndex {
    pub(crate) fn new(names: Vec<String>) -> Self {
        let mut positions = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            // First occurrence wins for duplicated names (`SELECT a.id, b.id`).
            positions.entry(name.clone()).or_insert(i);
        }
        Self { names, positions }
    }

    pub(crate) fn names(&self) -> &[String] {
        &self.names
    }

    pub(crate) fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }
}

/// Something that addresses a column: a position or a name.
pub trait RowIndex {
    fn position(&self, columns: &[String], lookup: impl Fn(&str) -> Option<usize>) -> Result<usize>;
}

impl RowIndex for usize {
    fn position(&self, columns: &[String], _lookup: impl Fn(&str) -> Option<usize>) -> Result<usize> {
        if *self < columns.len() {
            Ok(*self)
        } else {
            Err(DbError::MissingColumn {
                name: format!("#{}", self),
            })
        }
    }
}

impl RowIndex for &str {
    fn position(&self, _columns: &[String], lookup: impl Fn(&str) -> Option<usize>) -> Result<usize> {
        lookup(self).ok_or_else(|| DbError::MissingColumn {
            name: self.to_string(),
        })
    }
}

/// One result row: the statement's column names plus this row's values.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<ColumnIndex>,
    values: Vec<Value>,
}

impl Row {
    pub(crate) fn new(columns: Arc<ColumnIndex>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn column_names(&self) -> &[String] {
        self.columns.names()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Raw value at a position or name.
    pub fn value(&self, index: impl RowIndex) -> Result<&Value> {
        let i = index.position(self.columns.names(), |n| self.columns.position(n))?;
        Ok(&self.values[i])
    }

    /// Typed value at a position or name.
    ///
    /// NULL read as a non-`Option` type, or any other storage class that
    /// does not convert, is a [`DbError::TypeMismatch`].
    pub fn get<T: FromValue>(&self, index: impl RowIndex) -> Result<T> {
        let i = index.position(self.columns.names(), |n| self.columns.position(n))?;
        let value = &self.values[i];
        T::from_value(value).ok_or_else(|| DbError::TypeMismatch {
            column: self.columns.names()[i].clone(),
            expected: T::EXPECTED,
            actual: value.column_type(),
        })
    }
}

impl Serialize for Row {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.columns.names().iter().zip(&self.values) {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Conversion of a result row into a Rust value.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> Result<Self>;
}

impl FromRow for Row {
    fn from_row(row: &Row) -> Result<Self> {
        Ok(row.clone())
    }
}

impl FromRow for Vec<Value> {
    fn from_row(row: &Row) -> Result<Self> {
        Ok(row.values.clone())
    }
}

macro_rules! tuple_from_row {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: FromValue),+> FromRow for ($($name,)+) {
            fn from_row(row: &Row) -> Result<Self> {
                Ok(($(row.get::<$name>($idx as usize)?,)+))
            }
        }
    };
}

tuple_from_row!(A: 0);
tuple_from_row!(A: 0, B: 1);
tuple_from_row!(A: 0, B: 1, C: 2);
tuple_from_row!(A: 0, B: 1, C: 2, D: 3);
tuple_from_row!(A: 0, B: 1, C: 2, D: 3, E: 4);
tuple_from_row!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
