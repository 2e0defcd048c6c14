use crate::{Cursor, Result, Value};

/// A driver prepared statement.
///
/// # Binding semantics
/// * Positions start from 1, position `i` is the `i`-th `?` marker.
/// * A bound value stays until it is replaced or `clear_bindings` is called, so the
///   same handle can be executed many times (batches rebind between executions).
///
/// Cursors borrow the statement, only one can be alive at a time.
pub trait Prepared {
    type Cursor<'s>: Cursor
    where
        Self: 's;

    fn bind_index(&mut self, value: Value, position: usize) -> Result<()>;
    fn clear_bindings(&mut self) -> Result<()>;

    /// Returns `true` when the first result is a row set.
    fn execute(&mut self) -> Result<bool>;
    /// Returns the number of rows affected.
    fn execute_update(&mut self) -> Result<u64>;
    fn query(&mut self) -> Result<Self::Cursor<'_>>;
    /// Keys generated by the last execution, empty when nothing was generated.
    fn generated_keys(&mut self) -> Result<Self::Cursor<'_>>;
}
