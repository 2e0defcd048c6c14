use crate::{Context, Parameters, Result, RowWriter};
use std::{fmt, iter};

type RowFn<'a> = Box<dyn FnOnce(&[String], &Context) -> Result<Parameters> + 'a>;

/// The parameters of one batch execution, produced when the row is reached.
pub struct BatchRow<'a> {
    produce: RowFn<'a>,
}

impl<'a> BatchRow<'a> {
    pub fn new<F>(produce: F) -> Self
    where
        F: FnOnce(&[String], &Context) -> Result<Parameters> + 'a,
    {
        Self {
            produce: Box::new(produce),
        }
    }

    /// Produce the parameters for a statement using `names`.
    pub fn parameters(self, names: &[String], context: &Context) -> Result<Parameters> {
        (self.produce)(names, context)
    }
}

impl From<Parameters> for BatchRow<'_> {
    fn from(value: Parameters) -> Self {
        Self::new(move |_, _| Ok(value))
    }
}

impl fmt::Debug for BatchRow<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BatchRow(..)")
    }
}

/// Ordered, single pass sequence of [`BatchRow`].
///
/// Rows are pulled one at a time while the batch runs, a lazy source is never
/// materialized upfront.
pub struct Batch<'a> {
    rows: Box<dyn Iterator<Item = BatchRow<'a>> + 'a>,
}

impl<'a> Batch<'a> {
    pub fn new<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = BatchRow<'a>>,
        I::IntoIter: 'a,
    {
        Self {
            rows: Box::new(rows.into_iter()),
        }
    }

    pub fn empty() -> Self {
        Self::new(iter::empty())
    }

    /// One row per parameter set.
    pub fn of<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = Parameters>,
        I::IntoIter: 'a,
    {
        Self::new(rows.into_iter().map(BatchRow::from))
    }

    /// One row per item, parameters are the fields of `writer` matching the statement
    /// names.
    pub fn using<T, I>(writer: &'a RowWriter<T>, items: I) -> Self
    where
        T: 'static,
        I: IntoIterator<Item = &'a T>,
        I::IntoIter: 'a,
    {
        Self::new(items.into_iter().map(move |item| {
            BatchRow::new(move |names: &[String], context: &Context| {
                writer.parameters_for(item, names, context)
            })
        }))
    }

    /// Rows of `self` followed by the rows of `other`.
    pub fn chain(self, other: Batch<'a>) -> Self {
        Self {
            rows: Box::new(self.rows.chain(other.rows)),
        }
    }
}

impl<'a> Iterator for Batch<'a> {
    type Item = BatchRow<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl fmt::Debug for Batch<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Batch(..)")
    }
}
