use crate::{Binder, Context, Error, Prepared, Result, Unbound, Value};
use anyhow::Context as _;

/// Value(s) supplied for one parameter name.
#[derive(Debug, Clone)]
pub enum Param {
    Single(Binder),
    /// Expands to one marker per value, never empty.
    Multi(Box<[Binder]>),
}

/// A parameter name with its value(s).
#[derive(Debug, Clone)]
pub struct NamedParam {
    name: String,
    param: Param,
}

impl NamedParam {
    pub fn value(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::binder(name, Binder::value(value))
    }

    /// The supplier is called every time the statement is bound.
    pub fn lazy<V, F>(name: impl Into<String>, supplier: F) -> Self
    where
        V: Into<Value>,
        F: Fn() -> V + Send + Sync + 'static,
    {
        Self::binder(name, Binder::lazy(supplier))
    }

    pub fn binder(name: impl Into<String>, binder: Binder) -> Self {
        Self {
            name: name.into(),
            param: Param::Single(binder),
        }
    }

    /// Multi-valued parameter, typically used inside `IN (...)`. Fails when `values` is
    /// empty.
    pub fn values<V: Into<Value>>(
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Result<Self> {
        Self::binders(name, values.into_iter().map(Binder::value))
    }

    pub fn binders(
        name: impl Into<String>,
        binders: impl IntoIterator<Item = Binder>,
    ) -> Result<Self> {
        let name = name.into();
        let binders: Box<[Binder]> = binders.into_iter().collect();
        if binders.is_empty() {
            return Err(Error::msg(format!(
                "Multi-valued parameter `{name}` requires at least one value"
            )));
        }
        Ok(Self {
            name,
            param: Param::Multi(binders),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn param(&self) -> &Param {
        &self.param
    }
}

/// Named collection of parameters, a name supplied twice keeps the last value.
#[derive(Debug, Clone, Default)]
pub struct Parameters {
    entries: Vec<NamedParam>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter, replacing a previous one with the same name.
    pub fn on(mut self, parameter: NamedParam) -> Self {
        self.set(parameter);
        self
    }

    pub fn set(&mut self, parameter: NamedParam) {
        match self.entries.iter_mut().find(|v| v.name == parameter.name) {
            Some(existing) => *existing = parameter,
            None => self.entries.push(parameter),
        }
    }

    /// Combine with `other`, its parameters override the ones in `self`.
    pub fn and_then(mut self, other: Parameters) -> Self {
        self.extend(other.entries);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Param> {
        self.entries
            .iter()
            .find(|v| v.name == name)
            .map(|v| &v.param)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|v| v.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lookup(&self, name: &str) -> Result<Option<&Binder>> {
        match self.get(name) {
            Some(Param::Single(binder)) => return Ok(Some(binder)),
            Some(Param::Multi(..)) => {
                return Err(Error::msg(format!(
                    "Multi-valued parameter `{name}` must be expanded before binding"
                )));
            }
            None => {}
        }
        let synthetic = name
            .strip_suffix(']')
            .and_then(|v| v.rsplit_once('['))
            .and_then(|(base, index)| Some((base, index.parse::<usize>().ok()?)));
        if let Some((base, index)) = synthetic {
            if let Some(Param::Multi(binders)) = self.get(base) {
                return binders.get(index).map(Some).ok_or_else(|| {
                    Error::msg(format!(
                        "Parameter `{name}` is out of range, `{base}` has {} values",
                        binders.len()
                    ))
                });
            }
        }
        Ok(None)
    }

    /// Map every position of `names` (as returned by [`ParsedSql::names`](crate::ParsedSql::names))
    /// to the binder supplying its value.
    ///
    /// Positions are processed left to right, a name occurring several times is bound
    /// at each occurrence. Multi-valued parameters are only found through the `name[i]`
    /// names produced by [`ParsedSql::expand`](crate::ParsedSql::expand).
    pub fn resolve(&self, names: &[String], unbound: Unbound) -> Result<ParameterBinding> {
        let mut bindings = Vec::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            let position = i + 1;
            match self.lookup(name)? {
                Some(binder) => bindings.push((position, binder.clone())),
                None if unbound == Unbound::Skip => {
                    log::warn!("Parameter `{name}` at position {position} is left unbound");
                }
                None => {
                    return Err(Error::msg(format!(
                        "Parameter `{name}` at position {position} has no value"
                    )));
                }
            }
        }
        Ok(ParameterBinding { bindings })
    }
}

impl Extend<NamedParam> for Parameters {
    fn extend<T: IntoIterator<Item = NamedParam>>(&mut self, iter: T) {
        for parameter in iter {
            self.set(parameter);
        }
    }
}

impl FromIterator<NamedParam> for Parameters {
    fn from_iter<T: IntoIterator<Item = NamedParam>>(iter: T) -> Self {
        let mut result = Self::new();
        result.extend(iter);
        result
    }
}

impl IntoIterator for Parameters {
    type Item = NamedParam;
    type IntoIter = std::vec::IntoIter<NamedParam>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl From<NamedParam> for Parameters {
    fn from(value: NamedParam) -> Self {
        Self::new().on(value)
    }
}

/// Positional bindings resolved for one execution.
#[derive(Debug, Clone, Default)]
pub struct ParameterBinding {
    bindings: Vec<(usize, Binder)>,
}

impl ParameterBinding {
    /// 1-based positions that receive a value, in order.
    pub fn positions(&self) -> impl Iterator<Item = usize> {
        self.bindings.iter().map(|(position, _)| *position)
    }

    pub fn get(&self, position: usize) -> Option<&Binder> {
        self.bindings
            .iter()
            .find(|(p, _)| *p == position)
            .map(|(_, binder)| binder)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Bind every value in position order, driver errors are returned as they are with
    /// the position as context.
    pub fn apply<P: Prepared>(&self, prepared: &mut P, context: &Context) -> Result<()> {
        for (position, binder) in &self.bindings {
            binder
                .bind(prepared, *position, context)
                .with_context(|| format!("Cannot bind parameter {position}"))?;
        }
        Ok(())
    }
}
