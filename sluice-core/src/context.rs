use crate::{Converters, Result, Value};

/// Side-channel handed to binders, row readers and field extractors.
#[derive(Debug, Clone)]
pub struct Context {
    converters: Converters,
}

impl Context {
    pub fn new(converters: Converters) -> Self {
        Self { converters }
    }
    pub fn converters(&self) -> &Converters {
        &self.converters
    }
    /// Run `value` through the converter chain.
    pub fn convert(&self, value: Value) -> Result<Value> {
        self.converters.apply(value)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(Converters::standard())
    }
}

/// What to do with a SQL parameter that has no supplied value.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Unbound {
    /// Fail before executing.
    #[default]
    Error,
    /// Leave the position unbound, the driver decides (usually NULL or an error).
    Skip,
}

/// Per statement settings, handed to the driver as they are.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatementOptions {
    pub fetch_size: Option<u32>,
    /// Seconds.
    pub timeout: Option<u32>,
    pub unbound: Unbound,
}
