use crate::{Result, Value};
use std::sync::Arc;

/// Shared reference-counted column name list.
pub type RowNames = Arc<[String]>;
/// Owned row value slice matching `RowNames` length.
pub type Row = Box<[Value]>;

/// A result row with its corresponding column labels.
#[derive(Debug, Clone, PartialEq)]
pub struct RowLabeled {
    /// Column names.
    pub labels: RowNames,
    /// Data values (aligned by index with `labels`).
    pub values: Row,
}

impl RowLabeled {
    pub fn new(labels: RowNames, values: Row) -> Self {
        Self { labels, values }
    }
    pub fn names(&self) -> &[String] {
        &self.labels
    }
    pub fn values(&self) -> &[Value] {
        &self.values
    }
    pub fn len(&self) -> usize {
        self.values.len()
    }
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
    /// Column by label, labels are compared case insensitively.
    pub fn get_column(&self, name: &str) -> Option<&Value> {
        self.labels
            .iter()
            .position(|v| v.eq_ignore_ascii_case(name))
            .map(|i| &self.values[i])
    }
    /// Column by 1-based index.
    pub fn get(&self, index: usize) -> Option<&Value> {
        index.checked_sub(1).and_then(|i| self.values.get(i))
    }
}

/// Forward only iteration over a tabular result.
pub trait Cursor {
    /// Column labels, available before the first row is read.
    fn labels(&self) -> &RowNames;
    /// Advance and return the next row, `None` once exhausted.
    fn next_row(&mut self) -> Result<Option<RowLabeled>>;
}

impl<C: Cursor + ?Sized> Cursor for &mut C {
    fn labels(&self) -> &RowNames {
        (**self).labels()
    }
    fn next_row(&mut self) -> Result<Option<RowLabeled>> {
        (**self).next_row()
    }
}
