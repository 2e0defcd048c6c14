use crate::{Context, Prepared, Result, Value};
use anyhow::Context as _;
use std::{fmt, sync::Arc};

type Supplier = Arc<dyn Fn() -> Result<Value> + Send + Sync>;

/// Deferred "set the value at position P" operation.
///
/// `Eager` holds a value known upfront, `Lazy` calls its supplier every time it is
/// bound, so a reused binder reads the clock (or opens the stream) once per execution.
/// Either way the value goes through the [`Context`] converters right before reaching
/// the statement.
#[derive(Clone)]
pub enum Binder {
    Eager(Value),
    Lazy(Supplier),
}

impl Binder {
    pub fn value(value: impl Into<Value>) -> Self {
        Binder::Eager(value.into())
    }

    pub fn lazy<V, F>(supplier: F) -> Self
    where
        V: Into<Value>,
        F: Fn() -> V + Send + Sync + 'static,
    {
        Binder::Lazy(Arc::new(move || Ok(supplier().into())))
    }

    pub fn try_lazy<V, F>(supplier: F) -> Self
    where
        V: Into<Value>,
        F: Fn() -> Result<V> + Send + Sync + 'static,
    {
        Binder::Lazy(Arc::new(move || supplier().map(Into::into)))
    }

    /// Produce the value, evaluating the supplier of a lazy binder.
    pub fn produce(&self) -> Result<Value> {
        match self {
            Binder::Eager(value) => Ok(value.clone()),
            Binder::Lazy(supplier) => supplier(),
        }
    }

    /// Produce, convert and bind the value at the 1-based `position`.
    pub fn bind<P: Prepared + ?Sized>(
        &self,
        prepared: &mut P,
        position: usize,
        context: &Context,
    ) -> Result<()> {
        let value = self
            .produce()
            .with_context(|| format!("While producing the value for parameter {position}"))?;
        let value = context.convert(value)?;
        prepared.bind_index(value, position)
    }
}

impl fmt::Debug for Binder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binder::Eager(value) => f.debug_tuple("Eager").field(value).finish(),
            Binder::Lazy(..) => f.write_str("Lazy(..)"),
        }
    }
}
