use crate::{Binder, Context, Error, NamedParam, Parameters, Result, Value, to_snake_case};
use anyhow::Context as _;
use std::{any, collections::HashSet, fmt, sync::Arc};

type ExtractFn<T> = dyn Fn(&T, &Context) -> Result<Value> + Send + Sync;

/// Structural description of a component of `Self`, usually generated by
/// `#[derive(Deconstruct)]`.
pub struct Component<T> {
    /// Field identifier as written in the source.
    pub name: &'static str,
    /// Explicit column name, bypasses the name transform.
    pub rename: Option<&'static str>,
    pub get: fn(&T) -> Value,
}

/// Types whose named components can be enumerated, in declaration order.
pub trait Deconstruct: Sized + 'static {
    fn components() -> Vec<Component<Self>>;
}

/// A named value extracted from an instance of `T`.
pub struct Field<T> {
    name: String,
    extract: Arc<ExtractFn<T>>,
}

impl<T> Clone for Field<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            extract: self.extract.clone(),
        }
    }
}

impl<T> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Field<{}>({})", any::type_name::<T>(), self.name)
    }
}

impl<T: 'static> Field<T> {
    pub fn new<V, F>(name: impl Into<String>, extract: F) -> Self
    where
        V: Into<Value>,
        F: Fn(&T) -> V + Send + Sync + 'static,
    {
        Self::contextual(name, move |instance, _| Ok(extract(instance)))
    }

    pub fn try_new<V, F>(name: impl Into<String>, extract: F) -> Self
    where
        V: Into<Value>,
        F: Fn(&T) -> Result<V> + Send + Sync + 'static,
    {
        Self::contextual(name, move |instance, _| extract(instance))
    }

    /// Extractor that also receives the [`Context`].
    pub fn contextual<V, F>(name: impl Into<String>, extract: F) -> Self
    where
        V: Into<Value>,
        F: Fn(&T, &Context) -> Result<V> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            extract: Arc::new(move |instance, context| extract(instance, context).map(Into::into)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn extract(&self, instance: &T, context: &Context) -> Result<Value> {
        (self.extract)(instance, context)
            .with_context(|| format!("While extracting field `{}`", self.name))
    }
}

/// Maps an instance of `T` to named parameters, the inverse of a row reader.
///
/// Field names are unique, construction fails otherwise.
pub struct RowWriter<T> {
    fields: Vec<Field<T>>,
}

impl<T> Clone for RowWriter<T> {
    fn clone(&self) -> Self {
        Self {
            fields: self.fields.clone(),
        }
    }
}

impl<T> fmt::Debug for RowWriter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.fields.iter()).finish()
    }
}

impl<T: 'static> RowWriter<T> {
    pub fn new(fields: impl IntoIterator<Item = Field<T>>) -> Result<Self> {
        let fields: Vec<_> = fields.into_iter().collect();
        let mut seen = HashSet::with_capacity(fields.len());
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(Error::msg(format!(
                    "Field `{}` is defined more than once in the writer of {}",
                    field.name,
                    any::type_name::<T>()
                )));
            }
        }
        Ok(Self { fields })
    }

    /// One field per component of `T`, named in lower snake case unless renamed.
    pub fn derived() -> Result<Self>
    where
        T: Deconstruct,
    {
        Self::derived_with(to_snake_case)
    }

    /// One field per component of `T`, named by `transform` unless renamed.
    pub fn derived_with(transform: impl Fn(&str) -> String) -> Result<Self>
    where
        T: Deconstruct,
    {
        Self::new(T::components().into_iter().map(|component| {
            let name = match component.rename {
                Some(rename) => rename.to_string(),
                None => transform(component.name),
            };
            let get = component.get;
            Field::new(name, get)
        }))
    }

    /// Replace the field with the same name, or append it.
    pub fn with(mut self, field: Field<T>) -> Self {
        match self.fields.iter_mut().find(|v| v.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
        self
    }

    pub fn fields(&self) -> &[Field<T>] {
        &self.fields
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|v| v.name.as_str())
    }

    pub fn field(&self, name: &str) -> Option<&Field<T>> {
        self.fields.iter().find(|v| v.name == name)
    }

    /// Every field of `instance` as a parameter.
    pub fn parameters(&self, instance: &T, context: &Context) -> Result<Parameters> {
        self.fields
            .iter()
            .map(|field| {
                Ok(NamedParam::binder(
                    field.name.clone(),
                    Binder::Eager(field.extract(instance, context)?),
                ))
            })
            .collect()
    }

    /// Parameters for the fields matching `names`, names without a field are skipped so
    /// other sources can supply them. Each field is extracted once.
    pub fn parameters_for(
        &self,
        instance: &T,
        names: &[String],
        context: &Context,
    ) -> Result<Parameters> {
        let mut result = Parameters::new();
        for name in names {
            if result.get(name).is_some() {
                continue;
            }
            if let Some(field) = self.field(name) {
                let value = field.extract(instance, context)?;
                result.set(NamedParam::binder(name.clone(), Binder::Eager(value)));
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Param, ParsedSql, Unbound};

    struct Account {
        account_id: i64,
        display_name: String,
        created_at: Option<String>,
    }

    impl Deconstruct for Account {
        fn components() -> Vec<Component<Self>> {
            vec![
                Component {
                    name: "accountId",
                    rename: None,
                    get: |v| v.account_id.into(),
                },
                Component {
                    name: "displayName",
                    rename: None,
                    get: |v| v.display_name.clone().into(),
                },
                Component {
                    name: "createdAt",
                    rename: Some("created"),
                    get: |v| v.created_at.clone().into(),
                },
            ]
        }
    }

    fn account() -> Account {
        Account {
            account_id: 5,
            display_name: "M".into(),
            created_at: None,
        }
    }

    fn eager(parameters: &Parameters, name: &str) -> Value {
        match parameters.get(name) {
            Some(Param::Single(binder)) => binder.produce().unwrap(),
            other => panic!("Unexpected parameter {other:?}"),
        }
    }

    #[test]
    fn derived() {
        let writer = RowWriter::<Account>::derived().unwrap();
        assert_eq!(
            writer.names().collect::<Vec<_>>(),
            ["account_id", "display_name", "created"]
        );
        let parameters = writer.parameters(&account(), &Context::default()).unwrap();
        assert_eq!(eager(&parameters, "account_id"), Value::Int64(Some(5)));
        assert_eq!(eager(&parameters, "created"), Value::Varchar(None));
    }

    #[test]
    fn override_and_add() {
        let writer = RowWriter::<Account>::derived()
            .unwrap()
            .with(Field::new("display_name", |v: &Account| {
                v.display_name.to_lowercase()
            }))
            .with(Field::contextual("doubled", |v: &Account, _| {
                Ok(v.account_id * 2)
            }));
        assert_eq!(writer.fields().len(), 4);
        let parameters = writer.parameters(&account(), &Context::default()).unwrap();
        assert_eq!(
            eager(&parameters, "display_name"),
            Value::Varchar(Some("m".into()))
        );
        assert_eq!(eager(&parameters, "doubled"), Value::Int64(Some(10)));
    }

    #[test]
    fn duplicate_names() {
        let result = RowWriter::new([
            Field::new("a", |v: &Account| v.account_id),
            Field::new("a", |v: &Account| v.display_name.clone()),
        ]);
        assert!(result.is_err());
        let result = RowWriter::<Account>::derived_with(|_| "same".into());
        assert!(result.is_err());
    }

    #[test]
    fn unmatched_names_are_skipped() {
        let writer = RowWriter::<Account>::derived().unwrap();
        let parsed = ParsedSql::parse(
            "UPDATE account SET display_name = :display_name, v = :version WHERE account_id = :account_id",
        );
        let parameters = writer
            .parameters_for(&account(), parsed.names(), &Context::default())
            .unwrap();
        assert_eq!(
            parameters.names().collect::<Vec<_>>(),
            ["display_name", "account_id"]
        );
        assert!(parameters.resolve(parsed.names(), Unbound::Error).is_err());
        let binding = parameters.resolve(parsed.names(), Unbound::Skip).unwrap();
        assert_eq!(binding.positions().collect::<Vec<_>>(), [1, 3]);
    }

    #[test]
    fn failing_extractor() {
        let writer = RowWriter::new([Field::try_new("broken", |_: &Account| {
            Err::<i32, _>(Error::msg("no value"))
        })])
        .unwrap();
        let error = writer
            .parameters(&account(), &Context::default())
            .unwrap_err();
        assert!(format!("{error:#}").contains("`broken`"));
        assert!(format!("{error:#}").contains("no value"));
    }
}
