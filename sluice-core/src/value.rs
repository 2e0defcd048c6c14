use rust_decimal::Decimal;
use std::{
    any::{self, Any},
    fmt::{self, Debug},
    mem,
    sync::Arc,
};
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};
use uuid::Uuid;

/// Dynamically typed value exchanged with the driver.
///
/// Every variant but `Null` carries an `Option`, `None` being a typed NULL. This is
/// what statements are bound with and what cursors produce.
#[derive(Default, Clone)]
pub enum Value {
    #[default]
    Null,
    Boolean(Option<bool>),
    Int8(Option<i8>),
    Int16(Option<i16>),
    Int32(Option<i32>),
    Int64(Option<i64>),
    UInt8(Option<u8>),
    UInt16(Option<u16>),
    UInt32(Option<u32>),
    UInt64(Option<u64>),
    Float32(Option<f32>),
    Float64(Option<f64>),
    Decimal(Option<Decimal>),
    Varchar(Option<String>),
    Blob(Option<Box<[u8]>>),
    Date(Option<Date>),
    Time(Option<Time>),
    Timestamp(Option<PrimitiveDateTime>),
    TimestampWithTimezone(Option<OffsetDateTime>),
    Uuid(Option<Uuid>),
    /// Application value the driver does not understand. A [`Converter`](crate::Converter)
    /// is expected to claim it before it reaches the statement.
    Opaque(Option<Opaque>),
}

impl Value {
    /// Wrap an application type into an [`Value::Opaque`].
    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        Value::Opaque(Some(Opaque::new(value)))
    }

    pub fn is_null(&self) -> bool {
        match self {
            Value::Null
            | Value::Boolean(None)
            | Value::Int8(None)
            | Value::Int16(None)
            | Value::Int32(None)
            | Value::Int64(None)
            | Value::UInt8(None)
            | Value::UInt16(None)
            | Value::UInt32(None)
            | Value::UInt64(None)
            | Value::Float32(None)
            | Value::Float64(None)
            | Value::Decimal(None)
            | Value::Varchar(None)
            | Value::Blob(None)
            | Value::Date(None)
            | Value::Time(None)
            | Value::Timestamp(None)
            | Value::TimestampWithTimezone(None)
            | Value::Uuid(None)
            | Value::Opaque(None) => true,
            _ => false,
        }
    }

    pub fn same_type(&self, other: &Self) -> bool {
        mem::discriminant(self) == mem::discriminant(other)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Boolean(l), Self::Boolean(r)) => l == r,
            (Self::Int8(l), Self::Int8(r)) => l == r,
            (Self::Int16(l), Self::Int16(r)) => l == r,
            (Self::Int32(l), Self::Int32(r)) => l == r,
            (Self::Int64(l), Self::Int64(r)) => l == r,
            (Self::UInt8(l), Self::UInt8(r)) => l == r,
            (Self::UInt16(l), Self::UInt16(r)) => l == r,
            (Self::UInt32(l), Self::UInt32(r)) => l == r,
            (Self::UInt64(l), Self::UInt64(r)) => l == r,
            (Self::Float32(l), Self::Float32(r)) => l == r,
            (Self::Float64(l), Self::Float64(r)) => l == r,
            (Self::Decimal(l), Self::Decimal(r)) => l == r,
            (Self::Varchar(l), Self::Varchar(r)) => l == r,
            (Self::Blob(l), Self::Blob(r)) => l == r,
            (Self::Date(l), Self::Date(r)) => l == r,
            (Self::Time(l), Self::Time(r)) => l == r,
            (Self::Timestamp(l), Self::Timestamp(r)) => l == r,
            (Self::TimestampWithTimezone(l), Self::TimestampWithTimezone(r)) => l == r,
            (Self::Uuid(l), Self::Uuid(r)) => l == r,
            (Self::Opaque(l), Self::Opaque(r)) => l == r,
            _ => self.same_type(other),
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Boolean(v) => f.debug_tuple("Boolean").field(v).finish(),
            Value::Int8(v) => f.debug_tuple("Int8").field(v).finish(),
            Value::Int16(v) => f.debug_tuple("Int16").field(v).finish(),
            Value::Int32(v) => f.debug_tuple("Int32").field(v).finish(),
            Value::Int64(v) => f.debug_tuple("Int64").field(v).finish(),
            Value::UInt8(v) => f.debug_tuple("UInt8").field(v).finish(),
            Value::UInt16(v) => f.debug_tuple("UInt16").field(v).finish(),
            Value::UInt32(v) => f.debug_tuple("UInt32").field(v).finish(),
            Value::UInt64(v) => f.debug_tuple("UInt64").field(v).finish(),
            Value::Float32(v) => f.debug_tuple("Float32").field(v).finish(),
            Value::Float64(v) => f.debug_tuple("Float64").field(v).finish(),
            Value::Decimal(v) => f.debug_tuple("Decimal").field(v).finish(),
            Value::Varchar(v) => f.debug_tuple("Varchar").field(v).finish(),
            Value::Blob(v) => f.debug_tuple("Blob").field(v).finish(),
            Value::Date(v) => f.debug_tuple("Date").field(v).finish(),
            Value::Time(v) => f.debug_tuple("Time").field(v).finish(),
            Value::Timestamp(v) => f.debug_tuple("Timestamp").field(v).finish(),
            Value::TimestampWithTimezone(v) => {
                f.debug_tuple("TimestampWithTimezone").field(v).finish()
            }
            Value::Uuid(v) => f.debug_tuple("Uuid").field(v).finish(),
            Value::Opaque(v) => f.debug_tuple("Opaque").field(v).finish(),
        }
    }
}

/// Type erased application value, compared by identity.
#[derive(Clone)]
pub struct Opaque {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Opaque {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_name: any::type_name::<T>(),
        }
    }
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }
    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl PartialEq for Opaque {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque<{}>", self.type_name)
    }
}
