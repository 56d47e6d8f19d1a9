//! Splitting a flat joined row back into per-table slices.

use std::ops::Range;

use crate::value::Value;

/// For each source of a multi-table query, the half-open range of result
/// columns it contributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinLayout {
    slices: Vec<(String, Range<usize>)>,
}

impl JoinLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source contributing `width` columns.
    pub fn push(&mut self, name: &str, width: usize) {
        let start = self.width();
        self.slices.push((name.to_string(), start..start + width));
    }

    /// Total number of result columns.
    pub fn width(&self) -> usize {
        self.slices.last().map(|(_, r)| r.end).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    pub fn range(&self, index: usize) -> Option<Range<usize>> {
        self.slices.get(index).map(|(_, r)| r.clone())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.slices.iter().position(|(n, _)| n == name)
    }

    /// The values belonging to source `index`, or `None` when every one of
    /// them is NULL (an outer join found no match) or the row is too short.
    pub fn entity<'a>(&self, index: usize, values: &'a [Value]) -> Option<&'a [Value]> {
        let range = self.range(index)?;
        let slice = values.get(range)?;
        if slice.iter().all(Value::is_null) {
            None
        } else {
            Some(slice)
        }
    }

    pub fn entity_named<'a>(&self, name: &str, values: &'a [Value]) -> Option<&'a [Value]> {
        self.entity(self.index_of(name)?, values)
    }

    /// Every source's entity, in join order.
    pub fn split<'a>(&self, values: &'a [Value]) -> Vec<Option<&'a [Value]>> {
        (0..self.slices.len()).map(|i| self.entity(i, values)).collect()
    }
}
