use crate::{Result, Value};
use std::{fmt, sync::Arc, time::SystemTime};
use time::OffsetDateTime;
use url::Url;

/// Maps application values onto values a driver can bind.
///
/// Returning `None` means the converter does not claim the value and the next one in
/// the chain is tried.
pub trait Converter: Send + Sync {
    fn convert(&self, value: &Value) -> Option<Result<Value>>;
}

impl<F> Converter for F
where
    F: Fn(&Value) -> Option<Result<Value>> + Send + Sync,
{
    fn convert(&self, value: &Value) -> Option<Result<Value>> {
        self(value)
    }
}

/// `url::Url` to its serialized varchar.
#[derive(Debug, Default, Clone, Copy)]
pub struct UrlConverter;

impl Converter for UrlConverter {
    fn convert(&self, value: &Value) -> Option<Result<Value>> {
        let Value::Opaque(Some(opaque)) = value else {
            return None;
        };
        let url = opaque.downcast_ref::<Url>()?;
        Some(Ok(Value::Varchar(Some(url.as_str().into()))))
    }
}

/// `std::time::SystemTime` to a UTC timestamp with timezone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeConverter;

impl Converter for SystemTimeConverter {
    fn convert(&self, value: &Value) -> Option<Result<Value>> {
        let Value::Opaque(Some(opaque)) = value else {
            return None;
        };
        let time = *opaque.downcast_ref::<SystemTime>()?;
        Some(Ok(Value::TimestampWithTimezone(Some(
            OffsetDateTime::from(time),
        ))))
    }
}

/// Ordered chain of converters, the first one claiming a value wins.
///
/// Built once by the caller and shared read-only afterwards, it travels inside the
/// [`Context`](crate::Context).
#[derive(Clone, Default)]
pub struct Converters {
    chain: Vec<Arc<dyn Converter>>,
}

impl Converters {
    /// Empty chain, every value passes through unchanged.
    pub fn new() -> Self {
        Self::default()
    }

    /// Chain with the converters for `url::Url` and `std::time::SystemTime`.
    pub fn standard() -> Self {
        Self::new().with(UrlConverter).with(SystemTimeConverter)
    }

    /// Append a converter, it is tried after the ones already registered.
    pub fn with(mut self, converter: impl Converter + 'static) -> Self {
        self.chain.push(Arc::new(converter));
        self
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn apply(&self, value: Value) -> Result<Value> {
        for converter in &self.chain {
            if let Some(result) = converter.convert(&value) {
                return result;
            }
        }
        Ok(value)
    }
}

impl fmt::Debug for Converters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converters")
            .field("len", &self.chain.len())
            .finish()
    }
}
