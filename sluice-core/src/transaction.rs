use crate::{Connection, Error, Result};
use std::{
    fmt,
    ops::{Deref, DerefMut},
};

/// Secondary error raised while rolling back, attached to the error that caused the
/// rollback.
///
/// It displays the message of the original error first, so the error keeps reading as
/// the failure of the unit of work. The original error stays reachable through
/// `downcast_ref`.
///
/// ```rust,ignore
/// if let Some(Suppressed { rollback, .. }) = error.downcast_ref::<Suppressed>() {
///     log::warn!("The rollback failed too: {rollback:#}");
/// }
/// ```
#[derive(Debug)]
pub struct Suppressed {
    /// Message of the error that caused the rollback.
    pub message: String,
    pub rollback: Error,
}

impl fmt::Display for Suppressed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (the rollback failed too: {:#})",
            self.message, self.rollback
        )
    }
}

fn suppress(error: Error, rollback: Result<()>) -> Error {
    match rollback {
        Ok(()) => error,
        Err(rollback) => {
            log::error!("{rollback:#}");
            let message = error.to_string();
            error.context(Suppressed { message, rollback })
        }
    }
}

/// Active transaction on a connection.
///
/// Beginning disables autocommit, it is enabled again when the transaction closes if it
/// was enabled before. A transaction that is neither committed nor rolled back is rolled
/// back when dropped, also while unwinding from a panic.
pub struct Transaction<'c, C: Connection> {
    connection: &'c mut C,
    restore_auto_commit: bool,
    closed: bool,
}

impl<'c, C: Connection> Transaction<'c, C> {
    pub fn begin(connection: &'c mut C) -> Result<Self> {
        let restore_auto_commit = connection.auto_commit()?;
        if restore_auto_commit {
            connection.set_auto_commit(false)?;
        }
        log::debug!("Transaction begins");
        Ok(Self {
            connection,
            restore_auto_commit,
            closed: false,
        })
    }

    pub fn connection(&mut self) -> &mut C {
        &mut *self.connection
    }

    /// When the commit fails the transaction is rolled back and the commit error is
    /// returned, a rollback failure is attached to it as [`Suppressed`].
    pub fn commit(mut self) -> Result<()> {
        self.closed = true;
        if let Err(error) = self.connection.commit() {
            let rollback = self.connection.rollback();
            log::debug!("Commit failed, transaction rolled back");
            if let Err(e) = self.restore() {
                log::error!("{:#}", e.context("While enabling autocommit again"));
            }
            return Err(suppress(error, rollback));
        }
        log::debug!("Transaction committed");
        self.restore()
    }

    pub fn rollback(mut self) -> Result<()> {
        self.closed = true;
        let result = self.connection.rollback();
        log::debug!("Transaction rolled back");
        let restored = self.restore();
        result.and(restored)
    }

    fn restore(&mut self) -> Result<()> {
        if std::mem::take(&mut self.restore_auto_commit) {
            self.connection.set_auto_commit(true)?;
        }
        Ok(())
    }
}

impl<C: Connection> Deref for Transaction<'_, C> {
    type Target = C;

    fn deref(&self) -> &Self::Target {
        &*self.connection
    }
}

impl<C: Connection> DerefMut for Transaction<'_, C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.connection
    }
}

impl<C: Connection> Drop for Transaction<'_, C> {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            log::warn!("Transaction dropped while active, rolling back");
            if let Err(e) = self.connection.rollback() {
                log::error!("{:#}", e.context("While rolling back a dropped transaction"));
            }
        }
        if let Err(e) = self.restore() {
            log::error!("{:#}", e.context("While enabling autocommit again"));
        }
    }
}

/// Run `work` inside a transaction.
///
/// Commits when `work` succeeds. When `work` or the commit fails the transaction is
/// rolled back and that error is returned, a rollback failure is attached to it as
/// [`Suppressed`].
pub fn transaction<C, T, F>(connection: &mut C, work: F) -> Result<T>
where
    C: Connection,
    F: FnOnce(&mut C) -> Result<T>,
{
    let mut transaction = Transaction::begin(connection)?;
    match work(transaction.connection()) {
        Ok(result) => {
            transaction.commit()?;
            Ok(result)
        }
        Err(error) => Err(suppress(error, transaction.rollback())),
    }
}

/// Run `work` inside a savepoint of the active transaction.
///
/// Releases the savepoint when `work` succeeds. When it fails only the changes made
/// after the savepoint are rolled back and the error of `work` is returned, the enclosing
/// transaction stays active.
pub fn savepoint<C, T, F>(connection: &mut C, name: &str, work: F) -> Result<T>
where
    C: Connection,
    F: FnOnce(&mut C) -> Result<T>,
{
    if connection.auto_commit()? {
        return Err(Error::msg(format!(
            "Savepoint `{name}` requires an active transaction"
        )));
    }
    connection.savepoint(name)?;
    match work(connection) {
        Ok(result) => {
            connection.release_savepoint(name)?;
            Ok(result)
        }
        Err(error) => {
            let rollback = connection.rollback_to_savepoint(name);
            log::debug!("Rolled back to savepoint `{name}`");
            Err(suppress(error, rollback))
        }
    }
}
