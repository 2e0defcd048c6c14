use crate::{
    Context, Cursor, Error, Parameters, ParsedSql, Prepared, Result, ResultReader, RowReader,
    StatementOptions, truncate_long,
};
use anyhow::Context as _;
use std::iter::FusedIterator;

/// A prepared statement together with the SQL it was prepared from.
///
/// The handle can be executed any number of times with fresh [`Parameters`], each
/// execution clears the previous bindings first. Multi-valued parameters must expand to
/// the same number of markers as the ones used to prepare it.
///
/// Dropping the handle releases the driver statement.
pub struct Statement<P: Prepared> {
    prepared: P,
    parsed: ParsedSql,
    expanded: ParsedSql,
    options: StatementOptions,
    context: Context,
}

impl<P: Prepared> Statement<P> {
    pub(crate) fn new(
        prepared: P,
        parsed: ParsedSql,
        expanded: ParsedSql,
        options: StatementOptions,
        context: Context,
    ) -> Self {
        Self {
            prepared,
            parsed,
            expanded,
            options,
            context,
        }
    }

    /// SQL as written, with named parameters.
    pub fn parsed(&self) -> &ParsedSql {
        &self.parsed
    }

    /// Driver SQL, after the multi-valued parameters expansion.
    pub fn sql(&self) -> &str {
        self.expanded.sql()
    }

    pub fn options(&self) -> &StatementOptions {
        &self.options
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn prepared(&mut self) -> &mut P {
        &mut self.prepared
    }

    /// Replace every binding with the values of `parameters`.
    pub fn bind(&mut self, parameters: &Parameters) -> Result<&mut Self> {
        let expanded = self.parsed.expand(parameters);
        if expanded.names() != self.expanded.names() {
            return Err(Error::msg(format!(
                "The parameters expand to `{}` but the statement was prepared as `{}`",
                truncate_long!(expanded.named_sql()),
                truncate_long!(self.expanded.named_sql()),
            )));
        }
        let binding = parameters.resolve(self.expanded.names(), self.options.unbound)?;
        self.prepared.clear_bindings()?;
        binding.apply(&mut self.prepared, &self.context)?;
        Ok(self)
    }

    fn failed(&self) -> String {
        format!("While executing the query:\n{}", truncate_long!(self.sql()))
    }

    /// Returns `true` when the first result is a row set.
    pub fn execute(&mut self, parameters: &Parameters) -> Result<bool> {
        self.bind(parameters)?;
        log::debug!("Executing {}", truncate_long!(self.sql()));
        let result = self.prepared.execute();
        result.with_context(|| self.failed())
    }

    /// Returns the number of rows affected.
    pub fn execute_update(&mut self, parameters: &Parameters) -> Result<u64> {
        self.bind(parameters)?;
        log::debug!("Executing update {}", truncate_long!(self.sql()));
        let result = self.prepared.execute_update();
        result.with_context(|| self.failed())
    }

    /// Execute an insert and read the first generated key, `None` when the driver
    /// generated nothing.
    pub fn execute_insert<K: 'static>(
        &mut self,
        parameters: &Parameters,
        key: &RowReader<K>,
    ) -> Result<Option<K>> {
        self.execute_update(parameters)?;
        let mut keys = self.prepared.generated_keys()?;
        match keys.next_row()? {
            Some(row) => Ok(Some(key.read(&row, &self.context)?)),
            None => Ok(None),
        }
    }

    /// Run the query and convert the whole result with `reader`. The cursor is released
    /// before returning.
    pub fn query_as<T: 'static>(
        &mut self,
        parameters: &Parameters,
        reader: &ResultReader<T>,
    ) -> Result<T> {
        self.bind(parameters)?;
        log::debug!("Querying {}", truncate_long!(self.sql()));
        let failed = self.failed();
        let mut cursor = self.prepared.query().context(failed)?;
        reader.read(&mut cursor, &self.context)
    }

    /// Run the query and read the rows lazily, one per pull.
    pub fn rows<T: 'static>(
        &mut self,
        parameters: &Parameters,
        reader: RowReader<T>,
    ) -> Result<RowIter<P::Cursor<'_>, T>> {
        self.bind(parameters)?;
        log::debug!("Querying {}", truncate_long!(self.sql()));
        let failed = self.failed();
        let context = self.context.clone();
        let cursor = self.prepared.query().context(failed)?;
        Ok(RowIter::new(cursor, reader, context))
    }
}

/// Lazy sequence of rows read from an open cursor.
///
/// Every pull reads exactly one row. A cursor error is yielded once, with the original
/// error as its source, then the sequence ends. The cursor is released by
/// [`close`](RowIter::close), when the rows are exhausted or when the iterator is
/// dropped.
pub struct RowIter<C: Cursor, T> {
    cursor: Option<C>,
    reader: RowReader<T>,
    context: Context,
}

impl<C: Cursor, T: 'static> RowIter<C, T> {
    pub fn new(cursor: C, reader: RowReader<T>, context: Context) -> Self {
        Self {
            cursor: Some(cursor),
            reader,
            context,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.cursor.is_none()
    }

    /// Release the cursor, the following pulls return `None`.
    pub fn close(&mut self) {
        self.cursor = None;
    }
}

impl<C: Cursor, T: 'static> Iterator for RowIter<C, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let cursor = self.cursor.as_mut()?;
        match cursor.next_row() {
            Ok(Some(row)) => Some(self.reader.read(&row, &self.context)),
            Ok(None) => {
                self.close();
                None
            }
            Err(error) => {
                self.close();
                let error = error.context("Cannot advance the result cursor");
                log::error!("{error:#}");
                Some(Err(error))
            }
        }
    }
}

impl<C: Cursor, T: 'static> FusedIterator for RowIter<C, T> {}
