use crate::{CBox, SqlitePrepared, error_message_from_ptr, last_error};
use libsqlite3_sys::{
    SQLITE_OK, SQLITE_OPEN_CREATE, SQLITE_OPEN_READWRITE, SQLITE_OPEN_URI, sqlite3,
    sqlite3_busy_timeout, sqlite3_close, sqlite3_exec, sqlite3_finalize, sqlite3_free,
    sqlite3_get_autocommit, sqlite3_open_v2, sqlite3_prepare_v2, sqlite3_stmt,
};
use sluice_core::{Connection, Error, ErrorContext, Result, StatementOptions, truncate_long};
use std::{
    ffi::{CStr, CString, c_char, c_int, c_void},
    ptr,
};

/// Connection to a SQLite database.
///
/// Autocommit is enabled after connecting. Once it is disabled, a transaction is opened
/// right before the next statement is prepared and stays open until `commit` or
/// `rollback`.
pub struct SqliteConnection {
    pub(crate) connection: CBox<*mut sqlite3>,
    pub(crate) auto_commit: bool,
    /// Milliseconds currently set with `sqlite3_busy_timeout`.
    pub(crate) busy_timeout: c_int,
}

impl SqliteConnection {
    pub const PREFIX: &'static str = "sqlite://";

    /// Open the database at `sqlite://<path>[?<sqlite uri parameters>]`.
    ///
    /// The path and the parameters are handed to SQLite as a `file:` URI, so
    /// `sqlite://data.sqlite?mode=rwc` or `sqlite://:memory:` are both accepted.
    pub fn connect(url: &str) -> Result<SqliteConnection> {
        let context = || format!("While trying to connect to `{}`", truncate_long!(url));
        let Some(location) = url.strip_prefix(Self::PREFIX) else {
            let error = Error::msg(format!(
                "Expected sqlite connection url to start with `{}`",
                Self::PREFIX
            ))
            .context(context());
            log::error!("{:#}", error);
            return Err(error);
        };
        let filename = CString::new(format!("file:{}", location)).with_context(context)?;
        let mut connection: CBox<*mut sqlite3> = CBox::new(ptr::null_mut(), |p| unsafe {
            sqlite3_close(p);
        });
        let rc = unsafe {
            sqlite3_open_v2(
                filename.as_ptr(),
                &mut *connection,
                SQLITE_OPEN_READWRITE | SQLITE_OPEN_CREATE | SQLITE_OPEN_URI,
                ptr::null(),
            )
        };
        if rc != SQLITE_OK {
            let error = if connection.is_null() {
                Error::msg("Could not allocate the connection")
            } else {
                last_error(*connection)
            }
            .context(context());
            log::error!("{:#}", error);
            return Err(error);
        }
        log::debug!("Connected to `{}`", truncate_long!(url));
        Ok(Self {
            connection,
            auto_commit: true,
            busy_timeout: 0,
        })
    }

    /// Whether a transaction is currently open on the connection.
    pub fn in_transaction(&self) -> bool {
        unsafe { sqlite3_get_autocommit(*self.connection) == 0 }
    }

    /// Run one or more statements without parameters.
    pub fn execute_sql(&mut self, sql: &str) -> Result<()> {
        let context = || format!("While executing the query:\n{}", truncate_long!(sql));
        let query = CString::new(sql).with_context(context)?;
        let mut message = CBox::new(ptr::null_mut::<c_char>(), |p| unsafe {
            sqlite3_free(p as *mut c_void);
        });
        let rc = unsafe {
            sqlite3_exec(
                *self.connection,
                query.as_ptr(),
                None,
                ptr::null_mut(),
                &mut *message,
            )
        };
        if rc != SQLITE_OK {
            let error =
                Error::msg(error_message_from_ptr(&(*message as *const c_char)).to_string())
                    .context(context());
            log::error!("{:#}", error);
            return Err(error);
        }
        log::debug!("Executed {}", truncate_long!(sql));
        Ok(())
    }

    fn begin_if_needed(&mut self) -> Result<()> {
        if !self.auto_commit && !self.in_transaction() {
            self.execute_sql("BEGIN")?;
        }
        Ok(())
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl Connection for SqliteConnection {
    type Prepared<'c> = SqlitePrepared<'c>;

    fn prepare(&mut self, sql: &str, options: &StatementOptions) -> Result<SqlitePrepared<'_>> {
        let busy_timeout = options
            .timeout
            .map(|v| v.saturating_mul(1000).min(c_int::MAX as u32) as c_int)
            .unwrap_or(0);
        if busy_timeout != self.busy_timeout {
            unsafe {
                sqlite3_busy_timeout(*self.connection, busy_timeout);
            }
            self.busy_timeout = busy_timeout;
        }
        self.begin_if_needed()?;
        let context = || format!("While preparing the query:\n{}", truncate_long!(sql));
        let query = CString::new(sql).with_context(context)?;
        let mut statement: CBox<*mut sqlite3_stmt> = CBox::new(ptr::null_mut(), |p| unsafe {
            sqlite3_finalize(p);
        });
        let mut tail = ptr::null();
        let rc = unsafe {
            sqlite3_prepare_v2(
                *self.connection,
                query.as_ptr(),
                -1,
                &mut *statement,
                &mut tail,
            )
        };
        if rc != SQLITE_OK {
            let error = last_error(*self.connection).context(context());
            log::error!("{:#}", error);
            return Err(error);
        }
        if statement.is_null() {
            let error = Error::msg("The query does not contain any statement").context(context());
            log::error!("{:#}", error);
            return Err(error);
        }
        if !tail.is_null()
            && !unsafe { CStr::from_ptr(tail) }
                .to_bytes()
                .trim_ascii()
                .is_empty()
        {
            let error =
                Error::msg("Cannot prepare more than one statement at a time").context(context());
            log::error!("{:#}", error);
            return Err(error);
        }
        SqlitePrepared::new(statement, *self.connection)
    }

    fn auto_commit(&self) -> Result<bool> {
        Ok(self.auto_commit)
    }

    fn set_auto_commit(&mut self, enabled: bool) -> Result<()> {
        if enabled && !self.auto_commit && self.in_transaction() {
            self.execute_sql("COMMIT")?;
        }
        self.auto_commit = enabled;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.in_transaction() {
            self.execute_sql("COMMIT")?;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if self.in_transaction() {
            self.execute_sql("ROLLBACK")?;
        }
        Ok(())
    }

    fn savepoint(&mut self, name: &str) -> Result<()> {
        self.begin_if_needed()?;
        self.execute_sql(&format!("SAVEPOINT {}", quote_identifier(name)))
    }

    fn rollback_to_savepoint(&mut self, name: &str) -> Result<()> {
        self.execute_sql(&format!("ROLLBACK TO SAVEPOINT {}", quote_identifier(name)))
    }

    fn release_savepoint(&mut self, name: &str) -> Result<()> {
        self.execute_sql(&format!("RELEASE SAVEPOINT {}", quote_identifier(name)))
    }
}

#[cfg(test)]
mod tests {
    use crate::SqliteConnection;
    use sluice_core::Query;

    #[test]
    fn busy_timeout_per_statement() {
        let mut connection = SqliteConnection::connect("sqlite://:memory:").unwrap();
        assert_eq!(connection.busy_timeout, 0);
        Query::new("SELECT 1")
            .timeout(2)
            .execute(&mut connection)
            .unwrap();
        assert_eq!(connection.busy_timeout, 2000);
        Query::new("SELECT 1").execute(&mut connection).unwrap();
        assert_eq!(connection.busy_timeout, 0);
    }
}
