use crate::{AsValue, Context, Cursor, Error, Result, RowLabeled, Value};
use anyhow::Context as _;
use std::{any, fmt, sync::Arc};

type ReadFn<T> = dyn Fn(&RowLabeled, &Context) -> Result<T> + Send + Sync;
type ReadAllFn<T> = dyn Fn(&mut dyn Cursor, &Context) -> Result<T> + Send + Sync;

/// Converts one result row into a `T`.
///
/// Readers are stateless and cheap to clone, build them once and reuse them for every
/// row. They compose:
/// * [`map`](RowReader::map) post-processes the value;
/// * [`flat_map`](RowReader::flat_map) uses the value to choose another reader, applied
///   to the same row (e.g. a discriminator column selecting the variant);
/// * [`compose!`](crate::compose) reads several columns and hands them to a constructor.
///
/// ```rust
/// use sluice_core::{RowReader, column, compose, string};
///
/// struct Person {
///     name: String,
///     email: String,
/// }
/// impl Person {
///     fn new(name: String, email: String) -> Self {
///         Self { name, email }
///     }
/// }
///
/// let person: RowReader<Person> = compose!(Person::new, string("name"), string("email"));
/// let id: RowReader<i64> = column("id");
/// ```
pub struct RowReader<T> {
    read: Arc<ReadFn<T>>,
}

impl<T> Clone for RowReader<T> {
    fn clone(&self) -> Self {
        Self {
            read: self.read.clone(),
        }
    }
}

impl<T> fmt::Debug for RowReader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RowReader<{}>", any::type_name::<T>())
    }
}

impl<T: 'static> RowReader<T> {
    pub fn new<F>(read: F) -> Self
    where
        F: Fn(&RowLabeled, &Context) -> Result<T> + Send + Sync + 'static,
    {
        Self {
            read: Arc::new(read),
        }
    }

    pub fn read(&self, row: &RowLabeled, context: &Context) -> Result<T> {
        (self.read)(row, context)
    }

    pub fn map<U, F>(self, f: F) -> RowReader<U>
    where
        U: 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        RowReader::new(move |row, context| self.read(row, context).map(&f))
    }

    pub fn try_map<U, F>(self, f: F) -> RowReader<U>
    where
        U: 'static,
        F: Fn(T) -> Result<U> + Send + Sync + 'static,
    {
        RowReader::new(move |row, context| self.read(row, context).and_then(&f))
    }

    /// Read a value, then read the same row again with the reader it selects.
    pub fn flat_map<U, F>(self, f: F) -> RowReader<U>
    where
        U: 'static,
        F: Fn(T) -> RowReader<U> + Send + Sync + 'static,
    {
        RowReader::new(move |row, context| f(self.read(row, context)?).read(row, context))
    }

    /// Read both values from the same row.
    pub fn and<U: 'static>(self, other: RowReader<U>) -> RowReader<(T, U)> {
        RowReader::new(move |row, context| {
            Ok((self.read(row, context)?, other.read(row, context)?))
        })
    }

    /// Exactly one row: zero rows or more than one row is an error.
    pub fn single(self) -> ResultReader<T> {
        ResultReader::new(move |cursor, context| {
            let Some(row) = cursor.next_row()? else {
                return Err(Error::msg(
                    "Expected exactly one row but the result is empty",
                ));
            };
            let result = self.read(&row, context)?;
            if cursor.next_row()?.is_some() {
                return Err(Error::msg(
                    "Expected exactly one row but the result has more",
                ));
            }
            Ok(result)
        })
    }

    /// At most one row: `None` when the result is empty, more than one row is an error.
    pub fn optional(self) -> ResultReader<Option<T>> {
        ResultReader::new(move |cursor, context| {
            let Some(row) = cursor.next_row()? else {
                return Ok(None);
            };
            let result = self.read(&row, context)?;
            if cursor.next_row()?.is_some() {
                return Err(Error::msg(
                    "Expected at most one row but the result has more",
                ));
            }
            Ok(Some(result))
        })
    }

    /// At most one row: `default` when the result is empty.
    pub fn single_or(self, default: T) -> ResultReader<T>
    where
        T: Clone + Send + Sync,
    {
        self.optional()
            .map(move |v| v.unwrap_or_else(|| default.clone()))
    }

    /// Zero or more rows, in cursor order.
    pub fn list(self) -> ResultReader<Vec<T>> {
        ResultReader::new(move |cursor, context| {
            let mut result = Vec::new();
            while let Some(row) = cursor.next_row()? {
                result.push(self.read(&row, context)?);
            }
            Ok(result)
        })
    }
}

/// Converts a whole result cursor into a `T`, usually obtained from one of the
/// terminal methods of [`RowReader`].
pub struct ResultReader<T> {
    read: Arc<ReadAllFn<T>>,
}

impl<T> Clone for ResultReader<T> {
    fn clone(&self) -> Self {
        Self {
            read: self.read.clone(),
        }
    }
}

impl<T: 'static> ResultReader<T> {
    pub fn new<F>(read: F) -> Self
    where
        F: Fn(&mut dyn Cursor, &Context) -> Result<T> + Send + Sync + 'static,
    {
        Self {
            read: Arc::new(read),
        }
    }

    pub fn read(&self, cursor: &mut dyn Cursor, context: &Context) -> Result<T> {
        (self.read)(cursor, context)
    }

    pub fn map<U, F>(self, f: F) -> ResultReader<U>
    where
        U: 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        ResultReader::new(move |cursor, context| self.read(cursor, context).map(&f))
    }
}

/// Types that know how to read themselves from a row, see `#[derive(FromRow)]`.
pub trait FromRow: Sized + 'static {
    fn row_reader() -> RowReader<Self>;
}

/// Column by label converted through [`AsValue`].
pub fn column<T: AsValue + 'static>(name: impl Into<String>) -> RowReader<T> {
    let name = name.into();
    RowReader::new(move |row, _| {
        let value = row.get_column(&name).ok_or_else(|| {
            Error::msg(format!("Column `{name}` does not exist in the row provided"))
        })?;
        T::try_from_value(value.clone()).with_context(|| format!("While reading column `{name}`"))
    })
}

/// Column by 1-based index converted through [`AsValue`].
pub fn column_at<T: AsValue + 'static>(index: usize) -> RowReader<T> {
    RowReader::new(move |row, _| {
        let value = row.get(index).ok_or_else(|| {
            Error::msg(format!(
                "Column {index} does not exist, the row has {} columns",
                row.len()
            ))
        })?;
        T::try_from_value(value.clone()).with_context(|| format!("While reading column {index}"))
    })
}

pub fn string(name: impl Into<String>) -> RowReader<String> {
    column(name)
}

/// The first column of the row, for single value queries like `SELECT COUNT(*)`.
pub fn scalar<T: AsValue + 'static>() -> RowReader<T> {
    column_at(1)
}

/// Column by label as the driver returned it.
pub fn raw(name: impl Into<String>) -> RowReader<Value> {
    let name = name.into();
    RowReader::new(move |row, _| {
        row.get_column(&name).cloned().ok_or_else(|| {
            Error::msg(format!("Column `{name}` does not exist in the row provided"))
        })
    })
}

/// Combine independent readers: each one reads the same row, in the listed order, and
/// the results are passed positionally to the constructor.
///
/// ```rust
/// use sluice_core::{RowReader, column, compose, string};
/// let pair: RowReader<(i64, String)> =
///     compose!(|id, name| (id, name), column::<i64>("id"), string("name"));
/// ```
#[macro_export]
macro_rules! compose {
    (@build $constructor:ident; [$($done:ident)*]; $head:expr, $($tail:expr,)*) => {{
        let reader = $head;
        $crate::compose!(@build $constructor; [$($done)* reader]; $($tail,)*)
    }};
    (@build $constructor:ident; [$($done:ident)*];) => {
        $crate::RowReader::new(move |row, context| {
            ::std::result::Result::Ok($constructor($($done.read(row, context)?),*))
        })
    };
    ($constructor:expr, $($reader:expr),+ $(,)?) => {{
        let constructor = $constructor;
        $crate::compose!(@build constructor; []; $($reader,)+)
    }};
}
