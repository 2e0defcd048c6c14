use crate::{
    Batch, BatchRow, Connection, Context, NamedParam, Parameters, ParsedSql, Prepared, Result,
    ResultReader, RowReader, RowWriter, Statement, StatementOptions, Unbound, truncate_long,
};
use anyhow::Context as _;
use std::fmt;

type Source<'a> = Box<dyn Fn(&[String], &Context) -> Result<Parameters> + 'a>;

/// A statement with its parameters and options, ready to run on a [`Connection`].
///
/// Parameters come from the explicit ones added with [`on`](Query::on) and
/// [`with`](Query::with), and from row writers added with [`using`](Query::using). The
/// explicit parameters win over the writers, a later writer wins over an earlier one.
/// Writers are resolved against the statement names when the query runs, with the
/// query [`Context`].
///
/// ```rust,ignore
/// let count = Query::new("UPDATE account SET name = :name WHERE id = :id")
///     .on(NamedParam::value("name", "M"))
///     .on(NamedParam::value("id", 7))
///     .execute_update(&mut connection)?;
/// ```
pub struct Query<'a> {
    parsed: ParsedSql,
    parameters: Parameters,
    sources: Vec<Source<'a>>,
    options: StatementOptions,
    context: Context,
}

impl<'a> Query<'a> {
    pub fn new(sql: &str) -> Self {
        Self::parsed(ParsedSql::parse(sql))
    }

    pub fn parsed(parsed: ParsedSql) -> Self {
        Self {
            parsed,
            parameters: Parameters::new(),
            sources: Vec::new(),
            options: Default::default(),
            context: Default::default(),
        }
    }

    pub fn on(mut self, parameter: NamedParam) -> Self {
        self.parameters.set(parameter);
        self
    }

    pub fn with(mut self, parameters: Parameters) -> Self {
        self.parameters.extend(parameters);
        self
    }

    /// Supply the parameters matching the fields of `writer`, read from `instance`.
    pub fn using<T: 'static>(mut self, writer: &'a RowWriter<T>, instance: &'a T) -> Self {
        self.sources.push(Box::new(move |names: &[String], context: &Context| {
            writer.parameters_for(instance, names, context)
        }));
        self
    }

    pub fn fetch_size(mut self, rows: u32) -> Self {
        self.options.fetch_size = Some(rows);
        self
    }

    /// Seconds.
    pub fn timeout(mut self, seconds: u32) -> Self {
        self.options.timeout = Some(seconds);
        self
    }

    pub fn unbound(mut self, unbound: Unbound) -> Self {
        self.options.unbound = unbound;
        self
    }

    pub fn options(mut self, options: StatementOptions) -> Self {
        self.options = options;
        self
    }

    pub fn context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn sql(&self) -> &ParsedSql {
        &self.parsed
    }

    /// Every parameter of the query, writers included.
    pub fn parameters(&self) -> Result<Parameters> {
        let mut result = Parameters::new();
        for source in &self.sources {
            result.extend(source(self.parsed.names(), &self.context)?);
        }
        result.extend(self.parameters.clone());
        Ok(result)
    }

    fn prepare_with<'c, C: Connection>(
        &self,
        connection: &'c mut C,
        parameters: &Parameters,
    ) -> Result<Statement<C::Prepared<'c>>> {
        let expanded = self.parsed.expand(parameters).into_owned();
        log::debug!("Preparing {}", truncate_long!(expanded.sql()));
        let prepared = connection
            .prepare(expanded.sql(), &self.options)
            .with_context(|| {
                format!(
                    "While preparing the query:\n{}",
                    truncate_long!(expanded.sql())
                )
            })?;
        Ok(Statement::new(
            prepared,
            self.parsed.clone(),
            expanded,
            self.options,
            self.context.clone(),
        ))
    }

    /// Prepare the statement once, to run it several times.
    pub fn prepare<'c, C: Connection>(
        &self,
        connection: &'c mut C,
    ) -> Result<Statement<C::Prepared<'c>>> {
        self.prepare_with(connection, &self.parameters()?)
    }

    /// Returns `true` when the first result is a row set.
    pub fn execute<C: Connection>(&self, connection: &mut C) -> Result<bool> {
        let parameters = self.parameters()?;
        self.prepare_with(connection, &parameters)?
            .execute(&parameters)
    }

    /// Returns the number of rows affected.
    pub fn execute_update<C: Connection>(&self, connection: &mut C) -> Result<u64> {
        let parameters = self.parameters()?;
        self.prepare_with(connection, &parameters)?
            .execute_update(&parameters)
    }

    /// Returns the first generated key read by `key`, `None` when there is none.
    pub fn execute_insert<C: Connection, K: 'static>(
        &self,
        connection: &mut C,
        key: &RowReader<K>,
    ) -> Result<Option<K>> {
        let parameters = self.parameters()?;
        self.prepare_with(connection, &parameters)?
            .execute_insert(&parameters, key)
    }

    /// Run the query and convert the result with `reader`, the statement and the cursor
    /// are released before returning.
    pub fn query_as<C: Connection, T: 'static>(
        &self,
        connection: &mut C,
        reader: &ResultReader<T>,
    ) -> Result<T> {
        let parameters = self.parameters()?;
        self.prepare_with(connection, &parameters)?
            .query_as(&parameters, reader)
    }

    /// Execute the statement once per batch row, reusing a single prepared statement.
    /// Stops at the first failing row.
    pub fn execute_batch<C: Connection>(&self, connection: &mut C, batch: Batch<'_>) -> Result<()> {
        self.run_batch(connection, batch, false)?;
        Ok(())
    }

    /// Like [`execute_batch`](Query::execute_batch), collecting the rows affected by
    /// each batch row.
    pub fn execute_update_batch<C: Connection>(
        &self,
        connection: &mut C,
        batch: Batch<'_>,
    ) -> Result<Vec<u64>> {
        self.run_batch(connection, batch, true)
    }

    fn batch_parameters(&self, index: usize, row: BatchRow<'_>) -> Result<Parameters> {
        let row = row
            .parameters(self.parsed.names(), &self.context)
            .with_context(|| format!("Cannot produce the parameters of batch row {index}"))?;
        Ok(self.parameters()?.and_then(row))
    }

    fn run_batch<C: Connection>(
        &self,
        connection: &mut C,
        batch: Batch<'_>,
        update: bool,
    ) -> Result<Vec<u64>> {
        let mut rows = batch.enumerate();
        let Some((_, first)) = rows.next() else {
            log::debug!("Empty batch, nothing to execute");
            return Ok(Vec::new());
        };
        let first = self.batch_parameters(0, first)?;
        let mut statement = self.prepare_with(connection, &first)?;
        let mut result = Vec::new();
        run_batch_row(&mut statement, 0, &first, update, &mut result)?;
        for (i, row) in rows {
            let parameters = self.batch_parameters(i, row)?;
            run_batch_row(&mut statement, i, &parameters, update, &mut result)?;
        }
        Ok(result)
    }
}

fn run_batch_row<P: Prepared>(
    statement: &mut Statement<P>,
    index: usize,
    parameters: &Parameters,
    update: bool,
    counts: &mut Vec<u64>,
) -> Result<()> {
    log::debug!("Batch row {index}");
    if update {
        let count = statement
            .execute_update(parameters)
            .with_context(|| format!("Batch row {index} failed"))?;
        counts.push(count);
    } else {
        statement
            .execute(parameters)
            .with_context(|| format!("Batch row {index} failed"))?;
    }
    Ok(())
}

impl fmt::Debug for Query<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("sql", &self.parsed.sql())
            .field("parameters", &self.parameters)
            .field("sources", &self.sources.len())
            .field("options", &self.options)
            .finish()
    }
}
