use crate::{
    CBox, SqliteConnection, last_error,
    extract::{extract_names, extract_value},
};
use libsqlite3_sys::*;
use rust_decimal::prelude::ToPrimitive;
use sluice_core::{
    Cursor, Error, Prepared, Result, Row, RowLabeled, RowNames, Value, truncate_long,
};
use std::{
    borrow::Cow,
    ffi::{CStr, c_char, c_int, c_void},
    fmt::{self, Display},
    marker::PhantomData,
};
use time::{format_description::BorrowedFormatItem, macros::format_description};

const TIME: &[BorrowedFormatItem<'static>] =
    format_description!("[hour]:[minute]:[second].[subsecond]");
const TIMESTAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]");
const TIMESTAMP_WITH_TIMEZONE: &[BorrowedFormatItem<'static>] = format_description!(
    "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond][offset_hour sign:mandatory]:[offset_minute]"
);

/// Label of the column holding the generated rowid.
pub const GENERATED_KEY: &str = "last_insert_rowid()";

/// Statement prepared on a [`SqliteConnection`], finalized when dropped.
pub struct SqlitePrepared<'c> {
    pub(crate) statement: CBox<*mut sqlite3_stmt>,
    pub(crate) connection: *mut sqlite3,
    pub(crate) labels: RowNames,
    pub(crate) inserted: Option<i64>,
    pub(crate) inserts: bool,
    _connection: PhantomData<&'c mut SqliteConnection>,
}

impl<'c> SqlitePrepared<'c> {
    pub(crate) fn new(
        statement: CBox<*mut sqlite3_stmt>,
        connection: *mut sqlite3,
    ) -> Result<Self> {
        let labels = extract_names(*statement)?;
        let mut result = Self {
            statement,
            connection,
            labels,
            inserted: None,
            inserts: false,
            _connection: PhantomData,
        };
        let inserts = inserts_rows(&result.sql());
        result.inserts = inserts;
        Ok(result)
    }

    /// The SQL text the statement was prepared from.
    pub fn sql(&self) -> Cow<'_, str> {
        unsafe {
            let sql = sqlite3_sql(*self.statement);
            if sql.is_null() {
                Cow::Borrowed("")
            } else {
                CStr::from_ptr(sql).to_string_lossy()
            }
        }
    }

    pub fn labels(&self) -> &RowNames {
        &self.labels
    }

    fn failure(&self, context: &str) -> Error {
        let error = last_error(self.connection)
            .context(format!("{}:\n{}", context, truncate_long!(self.sql())));
        log::error!("{:#}", error);
        error
    }

    /// Step the statement to completion, discarding any row produced.
    fn run(&mut self) -> Result<u64> {
        let statement = *self.statement;
        unsafe {
            sqlite3_reset(statement);
            let rowid = sqlite3_last_insert_rowid(self.connection);
            let total = sqlite3_total_changes64(self.connection);
            loop {
                match sqlite3_step(statement) {
                    SQLITE_ROW => continue,
                    SQLITE_DONE => break,
                    _ => {
                        let error = self.failure("While executing the query");
                        sqlite3_reset(statement);
                        self.inserted = None;
                        return Err(error);
                    }
                }
            }
            sqlite3_reset(statement);
            let affected = if sqlite3_total_changes64(self.connection) != total {
                sqlite3_changes64(self.connection).max(0) as u64
            } else {
                0
            };
            // An INSERT reusing the previous rowid leaves last_insert_rowid unchanged
            let last = sqlite3_last_insert_rowid(self.connection);
            self.inserted = (affected > 0 && (self.inserts || last != rowid)).then_some(last);
            Ok(affected)
        }
    }

    fn bind_text(&mut self, index: c_int, value: &str) -> Result<c_int> {
        let len = length(value.len())?;
        Ok(unsafe {
            sqlite3_bind_text(
                *self.statement,
                index,
                value.as_ptr() as *const c_char,
                len,
                SQLITE_TRANSIENT(),
            )
        })
    }
}

/// Byte length as accepted by the sqlite bind functions.
fn length(len: usize) -> Result<c_int> {
    c_int::try_from(len).map_err(|_| {
        let error = Error::msg(format!(
            "Cannot bind a value of {} bytes, sqlite accepts at most {} bytes",
            len,
            c_int::MAX
        ));
        log::error!("{:#}", error);
        error
    })
}

/// Whether the statement starts with `INSERT` or `REPLACE`.
fn inserts_rows(sql: &str) -> bool {
    let keyword = sql
        .trim_start()
        .split(|c: char| !c.is_ascii_alphabetic())
        .next()
        .unwrap_or_default();
    keyword.eq_ignore_ascii_case("INSERT") || keyword.eq_ignore_ascii_case("REPLACE")
}

impl<'c> Prepared for SqlitePrepared<'c> {
    type Cursor<'s>
        = SqliteCursor<'s>
    where
        Self: 's;

    fn bind_index(&mut self, value: Value, position: usize) -> Result<()> {
        let index = c_int::try_from(position)
            .map_err(|_| Error::msg(format!("Parameter position {} is out of range", position)))?;
        let statement = *self.statement;
        let rc = unsafe {
            match value {
                ref v if v.is_null() => sqlite3_bind_null(statement, index),
                Value::Boolean(Some(v)) => sqlite3_bind_int(statement, index, v as c_int),
                Value::Int8(Some(v)) => sqlite3_bind_int(statement, index, v as c_int),
                Value::Int16(Some(v)) => sqlite3_bind_int(statement, index, v as c_int),
                Value::Int32(Some(v)) => sqlite3_bind_int(statement, index, v as c_int),
                Value::Int64(Some(v)) => sqlite3_bind_int64(statement, index, v),
                Value::UInt8(Some(v)) => sqlite3_bind_int(statement, index, v as c_int),
                Value::UInt16(Some(v)) => sqlite3_bind_int(statement, index, v as c_int),
                Value::UInt32(Some(v)) => sqlite3_bind_int64(statement, index, v as sqlite3_int64),
                Value::UInt64(Some(v)) => {
                    let Ok(v) = sqlite3_int64::try_from(v) else {
                        let error = Error::msg(format!(
                            "Cannot bind u64 value `{}` into sqlite integer because it's out of bounds",
                            v
                        ));
                        log::error!("{:#}", error);
                        return Err(error);
                    };
                    sqlite3_bind_int64(statement, index, v)
                }
                Value::Float32(Some(v)) => sqlite3_bind_double(statement, index, v as f64),
                Value::Float64(Some(v)) => sqlite3_bind_double(statement, index, v),
                Value::Decimal(Some(v)) => sqlite3_bind_double(
                    statement,
                    index,
                    v.to_f64().ok_or_else(|| {
                        Error::msg(format!("Cannot convert the Decimal value `{}` to f64", v))
                    })?,
                ),
                Value::Varchar(Some(ref v)) => self.bind_text(index, v)?,
                Value::Blob(Some(ref v)) => sqlite3_bind_blob(
                    statement,
                    index,
                    v.as_ptr() as *const c_void,
                    length(v.len())?,
                    SQLITE_TRANSIENT(),
                ),
                Value::Date(Some(v)) => self.bind_text(index, &v.to_string())?,
                Value::Time(Some(v)) => self.bind_text(index, &v.format(TIME)?)?,
                Value::Timestamp(Some(v)) => self.bind_text(index, &v.format(TIMESTAMP)?)?,
                Value::TimestampWithTimezone(Some(v)) => {
                    self.bind_text(index, &v.format(TIMESTAMP_WITH_TIMEZONE)?)?
                }
                Value::Uuid(Some(v)) => self.bind_text(index, &v.to_string())?,
                _ => {
                    let error =
                        Error::msg(format!("Cannot use a {:?} as a query parameter", value));
                    log::error!("{:#}", error);
                    return Err(error);
                }
            }
        };
        if rc != SQLITE_OK {
            return Err(self.failure(&format!("Cannot bind parameter {} to query", index)));
        }
        Ok(())
    }

    fn clear_bindings(&mut self) -> Result<()> {
        unsafe {
            sqlite3_reset(*self.statement);
            sqlite3_clear_bindings(*self.statement);
        }
        Ok(())
    }

    fn execute(&mut self) -> Result<bool> {
        self.run()?;
        Ok(!self.labels.is_empty())
    }

    fn execute_update(&mut self) -> Result<u64> {
        self.run()
    }

    fn query(&mut self) -> Result<SqliteCursor<'_>> {
        let statement = *self.statement;
        unsafe {
            sqlite3_reset(statement);
        }
        self.inserted = None;
        Ok(SqliteCursor::new(
            Source::Statement(statement),
            self.labels.clone(),
        ))
    }

    fn generated_keys(&mut self) -> Result<SqliteCursor<'_>> {
        let labels: RowNames = [GENERATED_KEY.to_string()].into();
        let row = self
            .inserted
            .map(|rowid| Row::from([Value::Int64(Some(rowid))]));
        Ok(SqliteCursor::new(Source::Keys(row), labels))
    }
}

impl Display for SqlitePrepared<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:p}", *self.statement)
    }
}

pub(crate) enum Source {
    Statement(*mut sqlite3_stmt),
    Keys(Option<Row>),
    Done,
}

/// Rows of a [`SqlitePrepared`], the statement is reset when the cursor is dropped.
pub struct SqliteCursor<'s> {
    source: Source,
    labels: RowNames,
    _statement: PhantomData<&'s mut CBox<*mut sqlite3_stmt>>,
}

impl<'s> SqliteCursor<'s> {
    pub(crate) fn new(source: Source, labels: RowNames) -> Self {
        Self {
            source,
            labels,
            _statement: PhantomData,
        }
    }

    fn finish(&mut self) {
        if let Source::Statement(statement) = self.source {
            unsafe {
                sqlite3_reset(statement);
            }
        }
        self.source = Source::Done;
    }
}

impl Cursor for SqliteCursor<'_> {
    fn labels(&self) -> &RowNames {
        &self.labels
    }

    fn next_row(&mut self) -> Result<Option<RowLabeled>> {
        match &mut self.source {
            Source::Statement(statement) => {
                let statement = *statement;
                match unsafe { sqlite3_step(statement) } {
                    SQLITE_ROW => {
                        let values = (0..self.labels.len() as c_int)
                            .map(|i| extract_value(statement, i))
                            .collect::<Result<Row>>()?;
                        Ok(Some(RowLabeled::new(self.labels.clone(), values)))
                    }
                    SQLITE_DONE => {
                        self.finish();
                        Ok(None)
                    }
                    _ => {
                        let error = last_error(unsafe { sqlite3_db_handle(statement) })
                            .context("Cannot fetch the next row");
                        log::error!("{:#}", error);
                        self.finish();
                        Err(error)
                    }
                }
            }
            Source::Keys(row) => Ok(row
                .take()
                .map(|values| RowLabeled::new(self.labels.clone(), values))),
            Source::Done => Ok(None),
        }
    }
}

impl Drop for SqliteCursor<'_> {
    fn drop(&mut self) {
        self.finish();
    }
}
