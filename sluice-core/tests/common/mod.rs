#![allow(dead_code)]

use log::LevelFilter;
use sluice_core::{
    Connection, Cursor, Error, Prepared, Result, RowLabeled, RowNames, StatementOptions, Value,
};
use std::{collections::VecDeque, env};

pub fn init_logs() {
    let mut logger = env_logger::builder();
    logger
        .is_test(true)
        .format_file(true)
        .format_line_number(true);
    if env::var("RUST_LOG").is_err() {
        logger.filter_level(LevelFilter::Warn);
    }
    let _ = logger.try_init();
}

/// What the mock connection was asked to do, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Prepare(String),
    Bind(usize, Value),
    Clear,
    Execute,
    Update,
    Query,
    Keys,
    CloseCursor,
    CloseStatement,
    AutoCommit(bool),
    Commit,
    Rollback,
    Savepoint(String),
    RollbackTo(String),
    Release(String),
}

/// Connection recording every call, with scripted results and failures.
#[derive(Debug)]
pub struct MockConnection {
    pub events: Vec<Event>,
    pub auto_commit: bool,
    pub labels: RowNames,
    pub rows: Vec<Vec<Value>>,
    pub keys: Vec<Value>,
    pub affected: u64,
    /// The executions with this 0-based index fail.
    pub fail_execution: Option<usize>,
    /// Advancing the cursor past this many rows fails.
    pub fail_cursor_after: Option<usize>,
    pub fail_commit: bool,
    pub fail_rollback: bool,
    pub executions: usize,
}

impl Default for MockConnection {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            auto_commit: true,
            labels: RowNames::from([]),
            rows: Vec::new(),
            keys: Vec::new(),
            affected: 1,
            fail_execution: None,
            fail_cursor_after: None,
            fail_commit: false,
            fail_rollback: false,
            executions: 0,
        }
    }
}

impl MockConnection {
    pub fn with_rows(labels: &[&str], rows: Vec<Vec<Value>>) -> Self {
        Self {
            labels: labels.iter().map(|v| v.to_string()).collect(),
            rows,
            ..Default::default()
        }
    }

    pub fn bound(&self) -> Vec<(usize, Value)> {
        self.events
            .iter()
            .filter_map(|v| match v {
                Event::Bind(position, value) => Some((*position, value.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, event: &Event) -> usize {
        self.events.iter().filter(|v| *v == event).count()
    }

    pub fn prepared_sql(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|v| match v {
                Event::Prepare(sql) => Some(sql.as_str()),
                _ => None,
            })
            .collect()
    }

    fn run(&mut self, event: Event) -> Result<()> {
        self.events.push(event);
        let execution = self.executions;
        self.executions += 1;
        if self.fail_execution == Some(execution) {
            return Err(Error::msg(format!("Execution {execution} failed")));
        }
        Ok(())
    }
}

impl Connection for MockConnection {
    type Prepared<'c>
        = MockPrepared<'c>
    where
        Self: 'c;

    fn prepare(&mut self, sql: &str, _options: &StatementOptions) -> Result<MockPrepared<'_>> {
        self.events.push(Event::Prepare(sql.to_string()));
        Ok(MockPrepared { connection: self })
    }

    fn auto_commit(&self) -> Result<bool> {
        Ok(self.auto_commit)
    }

    fn set_auto_commit(&mut self, enabled: bool) -> Result<()> {
        self.events.push(Event::AutoCommit(enabled));
        self.auto_commit = enabled;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.events.push(Event::Commit);
        if self.fail_commit {
            return Err(Error::msg("Commit failed"));
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.events.push(Event::Rollback);
        if self.fail_rollback {
            return Err(Error::msg("Rollback failed"));
        }
        Ok(())
    }

    fn savepoint(&mut self, name: &str) -> Result<()> {
        self.events.push(Event::Savepoint(name.into()));
        Ok(())
    }

    fn rollback_to_savepoint(&mut self, name: &str) -> Result<()> {
        self.events.push(Event::RollbackTo(name.into()));
        if self.fail_rollback {
            return Err(Error::msg("Rollback to savepoint failed"));
        }
        Ok(())
    }

    fn release_savepoint(&mut self, name: &str) -> Result<()> {
        self.events.push(Event::Release(name.into()));
        Ok(())
    }
}

pub struct MockPrepared<'c> {
    connection: &'c mut MockConnection,
}

impl Prepared for MockPrepared<'_> {
    type Cursor<'s>
        = MockCursor<'s>
    where
        Self: 's;

    fn bind_index(&mut self, value: Value, position: usize) -> Result<()> {
        if let Value::Opaque(..) = value {
            return Err(Error::msg("Unsupported value"));
        }
        self.connection.events.push(Event::Bind(position, value));
        Ok(())
    }

    fn clear_bindings(&mut self) -> Result<()> {
        self.connection.events.push(Event::Clear);
        Ok(())
    }

    fn execute(&mut self) -> Result<bool> {
        self.connection.run(Event::Execute)?;
        Ok(!self.connection.labels.is_empty())
    }

    fn execute_update(&mut self) -> Result<u64> {
        self.connection.run(Event::Update)?;
        Ok(self.connection.affected)
    }

    fn query(&mut self) -> Result<MockCursor<'_>> {
        self.connection.run(Event::Query)?;
        let rows = self.connection.rows.iter().cloned().collect();
        let labels = self.connection.labels.clone();
        let fail_after = self.connection.fail_cursor_after;
        Ok(MockCursor {
            events: &mut self.connection.events,
            labels,
            rows,
            fail_after,
            read: 0,
        })
    }

    fn generated_keys(&mut self) -> Result<MockCursor<'_>> {
        self.connection.events.push(Event::Keys);
        let rows = self.connection.keys.iter().map(|v| vec![v.clone()]).collect();
        Ok(MockCursor {
            events: &mut self.connection.events,
            labels: RowNames::from(["id".to_string()]),
            rows,
            fail_after: None,
            read: 0,
        })
    }
}

impl Drop for MockPrepared<'_> {
    fn drop(&mut self) {
        self.connection.events.push(Event::CloseStatement);
    }
}

pub struct MockCursor<'s> {
    events: &'s mut Vec<Event>,
    labels: RowNames,
    rows: VecDeque<Vec<Value>>,
    fail_after: Option<usize>,
    read: usize,
}

impl Cursor for MockCursor<'_> {
    fn labels(&self) -> &RowNames {
        &self.labels
    }

    fn next_row(&mut self) -> Result<Option<RowLabeled>> {
        if self.fail_after == Some(self.read) {
            return Err(Error::msg("Connection reset while reading"));
        }
        self.read += 1;
        Ok(self
            .rows
            .pop_front()
            .map(|v| RowLabeled::new(self.labels.clone(), v.into())))
    }
}

impl Drop for MockCursor<'_> {
    fn drop(&mut self) {
        self.events.push(Event::CloseCursor);
    }
}
