use crate::{Error, Result, Value, truncate_long};
use anyhow::Context;
use rust_decimal::{
    Decimal,
    prelude::{FromPrimitive, ToPrimitive},
};
use std::{any, borrow::Cow, fmt::Display};
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time, macros::format_description};
use uuid::Uuid;

/// Conversion between native Rust types and the dynamically typed [`Value`].
///
/// `as_value` is what parameters go through before being bound, `try_from_value` is
/// what [`RowReader`](crate::RowReader) columns go through after being read.
///
/// # Conversion rules
/// - The canonical variant of the type is always accepted.
/// - Integers accept any other integer variant (and integral decimals) as long as the
///   value fits, the error message names both the value and the target type.
/// - Temporal types, uuids and numbers are parsed back from `Value::Varchar`, drivers
///   without native types store them as text.
///
/// ```rust
/// use sluice_core::{AsValue, Value};
/// let v = 42i32.as_value();
/// assert!(matches!(v, Value::Int32(Some(42))));
/// let n: i64 = AsValue::try_from_value(v).unwrap();
/// assert_eq!(n, 42);
/// ```
pub trait AsValue {
    /// Typed NULL for this type.
    fn as_empty_value() -> Value;
    fn as_value(self) -> Value;
    fn try_from_value(value: Value) -> Result<Self>
    where
        Self: Sized;
    /// Parse the textual representation a driver may return.
    fn parse(input: impl AsRef<str>) -> Result<Self>
    where
        Self: Sized,
    {
        Err(Error::msg(format!(
            "Cannot parse `{}` as {}",
            truncate_long!(input.as_ref()),
            any::type_name::<Self>()
        )))
    }
}

impl<T: AsValue> From<T> for Value {
    fn from(value: T) -> Self {
        value.as_value()
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Varchar(Some(value.into()))
    }
}

fn narrow<S, T>(value: S) -> Result<T>
where
    S: Copy + Display,
    T: TryFrom<S>,
{
    T::try_from(value).map_err(|_| {
        Error::msg(format!(
            "Value {value}: {} is out of range for {}",
            any::type_name::<S>(),
            any::type_name::<T>()
        ))
    })
}

fn cannot_convert<T>(value: &Value) -> Error {
    Error::msg(format!(
        "Cannot convert {value:?} to {}",
        any::type_name::<T>()
    ))
}

macro_rules! impl_as_value_integer {
    ($source:ty, $destination:path) => {
        impl AsValue for $source {
            fn as_empty_value() -> Value {
                $destination(None)
            }
            fn as_value(self) -> Value {
                $destination(Some(self))
            }
            fn try_from_value(value: Value) -> Result<Self> {
                match value {
                    Value::Int8(Some(v)) => narrow(v),
                    Value::Int16(Some(v)) => narrow(v),
                    Value::Int32(Some(v)) => narrow(v),
                    Value::Int64(Some(v)) => narrow(v),
                    Value::UInt8(Some(v)) => narrow(v),
                    Value::UInt16(Some(v)) => narrow(v),
                    Value::UInt32(Some(v)) => narrow(v),
                    Value::UInt64(Some(v)) => narrow(v),
                    Value::Decimal(Some(v)) => {
                        let error = || {
                            Error::msg(format!(
                                "Value {v}: Decimal does not fit into {}",
                                any::type_name::<Self>()
                            ))
                        };
                        if !v.is_integer() {
                            return Err(error().context("The value is not a integer"));
                        }
                        narrow(v.to_i128().ok_or_else(error)?)
                    }
                    Value::Varchar(Some(ref v)) => <Self as AsValue>::parse(v),
                    _ => Err(cannot_convert::<Self>(&value)),
                }
            }
            fn parse(input: impl AsRef<str>) -> Result<Self> {
                let input = input.as_ref();
                input.trim().parse::<$source>().with_context(|| {
                    format!(
                        "Cannot parse `{}` as {}",
                        truncate_long!(input),
                        any::type_name::<Self>()
                    )
                })
            }
        }
    };
}
impl_as_value_integer!(i8, Value::Int8);
impl_as_value_integer!(i16, Value::Int16);
impl_as_value_integer!(i32, Value::Int32);
impl_as_value_integer!(i64, Value::Int64);
impl_as_value_integer!(u8, Value::UInt8);
impl_as_value_integer!(u16, Value::UInt16);
impl_as_value_integer!(u32, Value::UInt32);
impl_as_value_integer!(u64, Value::UInt64);

macro_rules! impl_as_value_float {
    ($source:ty, $destination:path, $to_float:ident) => {
        impl AsValue for $source {
            fn as_empty_value() -> Value {
                $destination(None)
            }
            fn as_value(self) -> Value {
                $destination(Some(self))
            }
            fn try_from_value(value: Value) -> Result<Self> {
                match value {
                    Value::Float32(Some(v)) => Ok(v as _),
                    Value::Float64(Some(v)) => Ok(v as _),
                    Value::Int8(Some(v)) => Ok(v as _),
                    Value::Int16(Some(v)) => Ok(v as _),
                    Value::Int32(Some(v)) => Ok(v as _),
                    Value::Int64(Some(v)) => Ok(v as _),
                    Value::UInt8(Some(v)) => Ok(v as _),
                    Value::UInt16(Some(v)) => Ok(v as _),
                    Value::UInt32(Some(v)) => Ok(v as _),
                    Value::UInt64(Some(v)) => Ok(v as _),
                    Value::Decimal(Some(v)) => v.$to_float().ok_or_else(|| {
                        Error::msg(format!(
                            "Value {v}: Decimal does not fit into {}",
                            any::type_name::<Self>()
                        ))
                    }),
                    Value::Varchar(Some(ref v)) => <Self as AsValue>::parse(v),
                    _ => Err(cannot_convert::<Self>(&value)),
                }
            }
            fn parse(input: impl AsRef<str>) -> Result<Self> {
                let input = input.as_ref();
                input.trim().parse::<$source>().with_context(|| {
                    format!(
                        "Cannot parse `{}` as {}",
                        truncate_long!(input),
                        any::type_name::<Self>()
                    )
                })
            }
        }
    };
}
impl_as_value_float!(f32, Value::Float32, to_f32);
impl_as_value_float!(f64, Value::Float64, to_f64);

impl AsValue for bool {
    fn as_empty_value() -> Value {
        Value::Boolean(None)
    }
    fn as_value(self) -> Value {
        Value::Boolean(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Boolean(Some(v)) => Ok(v),
            Value::Int8(Some(v)) => Ok(v != 0),
            Value::Int16(Some(v)) => Ok(v != 0),
            Value::Int32(Some(v)) => Ok(v != 0),
            Value::Int64(Some(v)) => Ok(v != 0),
            Value::UInt8(Some(v)) => Ok(v != 0),
            Value::UInt16(Some(v)) => Ok(v != 0),
            Value::UInt32(Some(v)) => Ok(v != 0),
            Value::UInt64(Some(v)) => Ok(v != 0),
            Value::Varchar(Some(ref v)) => <Self as AsValue>::parse(v),
            _ => Err(cannot_convert::<Self>(&value)),
        }
    }
    fn parse(input: impl AsRef<str>) -> Result<Self> {
        match input.as_ref().trim() {
            x if x.eq_ignore_ascii_case("true") || x.eq_ignore_ascii_case("t") || x == "1" => {
                Ok(true)
            }
            x if x.eq_ignore_ascii_case("false") || x.eq_ignore_ascii_case("f") || x == "0" => {
                Ok(false)
            }
            x => Err(Error::msg(format!(
                "Cannot parse boolean from `{}`",
                truncate_long!(x)
            ))),
        }
    }
}

impl AsValue for String {
    fn as_empty_value() -> Value {
        Value::Varchar(None)
    }
    fn as_value(self) -> Value {
        Value::Varchar(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Varchar(Some(v)) => Ok(v),
            Value::Uuid(Some(v)) => Ok(v.to_string()),
            _ => Err(cannot_convert::<Self>(&value)),
        }
    }
    fn parse(input: impl AsRef<str>) -> Result<Self> {
        Ok(input.as_ref().into())
    }
}

impl<'a> AsValue for Cow<'a, str> {
    fn as_empty_value() -> Value {
        Value::Varchar(None)
    }
    fn as_value(self) -> Value {
        Value::Varchar(Some(self.into()))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        String::try_from_value(value).map(Into::into)
    }
}

impl AsValue for Box<[u8]> {
    fn as_empty_value() -> Value {
        Value::Blob(None)
    }
    fn as_value(self) -> Value {
        Value::Blob(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Blob(Some(v)) => Ok(v),
            Value::Varchar(Some(v)) => Ok(v.into_bytes().into()),
            _ => Err(cannot_convert::<Self>(&value)),
        }
    }
}

impl AsValue for Vec<u8> {
    fn as_empty_value() -> Value {
        Value::Blob(None)
    }
    fn as_value(self) -> Value {
        Value::Blob(Some(self.into()))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        <Box<[u8]>>::try_from_value(value).map(Into::into)
    }
}

impl AsValue for Decimal {
    fn as_empty_value() -> Value {
        Value::Decimal(None)
    }
    fn as_value(self) -> Value {
        Value::Decimal(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        let from_float = |v: f64| {
            Decimal::from_f64(v)
                .ok_or_else(|| Error::msg(format!("Value {v}: f64 does not fit into Decimal")))
        };
        match value {
            Value::Decimal(Some(v)) => Ok(v),
            Value::Int8(Some(v)) => Ok(v.into()),
            Value::Int16(Some(v)) => Ok(v.into()),
            Value::Int32(Some(v)) => Ok(v.into()),
            Value::Int64(Some(v)) => Ok(v.into()),
            Value::UInt8(Some(v)) => Ok(v.into()),
            Value::UInt16(Some(v)) => Ok(v.into()),
            Value::UInt32(Some(v)) => Ok(v.into()),
            Value::UInt64(Some(v)) => Ok(v.into()),
            Value::Float32(Some(v)) => from_float(v as f64),
            Value::Float64(Some(v)) => from_float(v),
            Value::Varchar(Some(ref v)) => <Self as AsValue>::parse(v),
            _ => Err(cannot_convert::<Self>(&value)),
        }
    }
    fn parse(input: impl AsRef<str>) -> Result<Self> {
        let input = input.as_ref();
        input
            .trim()
            .parse::<Decimal>()
            .with_context(|| format!("Cannot parse `{}` as Decimal", truncate_long!(input)))
    }
}

impl AsValue for Uuid {
    fn as_empty_value() -> Value {
        Value::Uuid(None)
    }
    fn as_value(self) -> Value {
        Value::Uuid(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Uuid(Some(v)) => Ok(v),
            Value::Varchar(Some(ref v)) => <Self as AsValue>::parse(v),
            Value::Blob(Some(ref v)) => {
                Uuid::from_slice(v).with_context(|| format!("Cannot read {value:?} as Uuid"))
            }
            _ => Err(cannot_convert::<Self>(&value)),
        }
    }
    fn parse(input: impl AsRef<str>) -> Result<Self> {
        let input = input.as_ref();
        Uuid::parse_str(input.trim().trim_matches(['"', '\'']))
            .with_context(|| format!("Cannot parse `{}` as Uuid", truncate_long!(input)))
    }
}

impl AsValue for Date {
    fn as_empty_value() -> Value {
        Value::Date(None)
    }
    fn as_value(self) -> Value {
        Value::Date(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Date(Some(v)) => Ok(v),
            Value::Timestamp(Some(v)) => Ok(v.date()),
            Value::Varchar(Some(ref v)) => <Self as AsValue>::parse(v),
            _ => Err(cannot_convert::<Self>(&value)),
        }
    }
    fn parse(input: impl AsRef<str>) -> Result<Self> {
        let value = input.as_ref().trim();
        Date::parse(value, format_description!("[year]-[month]-[day]"))
            .with_context(|| format!("Cannot parse `{}` as time::Date", truncate_long!(value)))
    }
}

impl AsValue for Time {
    fn as_empty_value() -> Value {
        Value::Time(None)
    }
    fn as_value(self) -> Value {
        Value::Time(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Time(Some(v)) => Ok(v),
            Value::Varchar(Some(ref v)) => <Self as AsValue>::parse(v),
            _ => Err(cannot_convert::<Self>(&value)),
        }
    }
    fn parse(input: impl AsRef<str>) -> Result<Self> {
        let value = input.as_ref().trim();
        Time::parse(
            value,
            format_description!("[hour]:[minute]:[second].[subsecond]"),
        )
        .or(Time::parse(
            value,
            format_description!("[hour]:[minute]:[second]"),
        ))
        .or(Time::parse(value, format_description!("[hour]:[minute]")))
        .with_context(|| format!("Cannot parse `{}` as time::Time", truncate_long!(value)))
    }
}

impl AsValue for PrimitiveDateTime {
    fn as_empty_value() -> Value {
        Value::Timestamp(None)
    }
    fn as_value(self) -> Value {
        Value::Timestamp(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Timestamp(Some(v)) => Ok(v),
            Value::Varchar(Some(ref v)) => <Self as AsValue>::parse(v),
            _ => Err(cannot_convert::<Self>(&value)),
        }
    }
    fn parse(input: impl AsRef<str>) -> Result<Self> {
        let value = input.as_ref().trim();
        PrimitiveDateTime::parse(
            value,
            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
        )
        .or(PrimitiveDateTime::parse(
            value,
            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
        ))
        .or(PrimitiveDateTime::parse(
            value,
            format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"),
        ))
        .or(PrimitiveDateTime::parse(
            value,
            format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
        ))
        .or(PrimitiveDateTime::parse(
            value,
            format_description!("[year]-[month]-[day] [hour]:[minute]"),
        ))
        .with_context(|| {
            format!(
                "Cannot parse `{}` as time::PrimitiveDateTime",
                truncate_long!(value)
            )
        })
    }
}

impl AsValue for OffsetDateTime {
    fn as_empty_value() -> Value {
        Value::TimestampWithTimezone(None)
    }
    fn as_value(self) -> Value {
        Value::TimestampWithTimezone(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::TimestampWithTimezone(Some(v)) => Ok(v),
            Value::Timestamp(Some(v)) => Ok(v.assume_utc()),
            Value::Varchar(Some(ref v)) => <Self as AsValue>::parse(v),
            _ => Err(cannot_convert::<Self>(&value)),
        }
    }
    fn parse(input: impl AsRef<str>) -> Result<Self> {
        let value = input.as_ref().trim();
        OffsetDateTime::parse(
            value,
            format_description!(
                "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond][offset_hour sign:mandatory]:[offset_minute]"
            ),
        )
        .or(OffsetDateTime::parse(
            value,
            format_description!(
                "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond][offset_hour sign:mandatory]:[offset_minute]"
            ),
        ))
        .or(OffsetDateTime::parse(
            value,
            format_description!(
                "[year]-[month]-[day] [hour]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]"
            ),
        ))
        .or(OffsetDateTime::parse(
            value,
            format_description!(
                "[year]-[month]-[day]T[hour]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]"
            ),
        ))
        .or_else(|error| {
            <PrimitiveDateTime as AsValue>::parse(value)
                .map(PrimitiveDateTime::assume_utc)
                .map_err(|_| error)
        })
        .with_context(|| {
            format!(
                "Cannot parse `{}` as time::OffsetDateTime",
                truncate_long!(value)
            )
        })
    }
}

impl<T: AsValue> AsValue for Option<T> {
    fn as_empty_value() -> Value {
        T::as_empty_value()
    }
    fn as_value(self) -> Value {
        match self {
            Some(v) => v.as_value(),
            None => T::as_empty_value(),
        }
    }
    fn try_from_value(value: Value) -> Result<Self> {
        Ok(if value.is_null() {
            None
        } else {
            Some(<T as AsValue>::try_from_value(value)?)
        })
    }
}

impl<T: AsValue> AsValue for Box<T> {
    fn as_empty_value() -> Value {
        T::as_empty_value()
    }
    fn as_value(self) -> Value {
        (*self).as_value()
    }
    fn try_from_value(value: Value) -> Result<Self> {
        Ok(Self::new(<T as AsValue>::try_from_value(value)?))
    }
}
