use crate::{Prepared, Result, StatementOptions};

/// Connection of the underlying database driver.
///
/// This is the collaborator every operation runs against: it prepares statements
/// using positional `?` markers and exposes the transaction primitives. Autocommit
/// semantics follow the usual client API convention, while it is disabled every
/// statement belongs to the current transaction until `commit` or `rollback`.
pub trait Connection {
    type Prepared<'c>: Prepared
    where
        Self: 'c;

    /// Prepare a single statement, `options` are passed through as they are.
    fn prepare(&mut self, sql: &str, options: &StatementOptions) -> Result<Self::Prepared<'_>>;

    fn auto_commit(&self) -> Result<bool>;
    fn set_auto_commit(&mut self, enabled: bool) -> Result<()>;
    fn commit(&mut self) -> Result<()>;
    fn rollback(&mut self) -> Result<()>;

    fn savepoint(&mut self, name: &str) -> Result<()>;
    fn rollback_to_savepoint(&mut self, name: &str) -> Result<()>;
    fn release_savepoint(&mut self, name: &str) -> Result<()>;
}
