use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, SecondsFormat, Utc};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::ConvertError;

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";
const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%:z";

/// Declared kind of a property or of the values a rule operates on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Bool,
    Int,
    Decimal,
    Double,
    Text,
    Date,
    DateTimeOffset,
}

impl ValueKind {
    pub const ALL: [ValueKind; 7] = [
        ValueKind::Bool,
        ValueKind::Int,
        ValueKind::Decimal,
        ValueKind::Double,
        ValueKind::Text,
        ValueKind::Date,
        ValueKind::DateTimeOffset,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Decimal => "decimal",
            ValueKind::Double => "double",
            ValueKind::Text => "text",
            ValueKind::Date => "date",
            ValueKind::DateTimeOffset => "date_time_offset",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ValueKind::Int | ValueKind::Decimal | ValueKind::Double)
    }

    /// Value written for a non-nullable property that has been excluded.
    pub fn default_value(self) -> FieldValue {
        match self {
            ValueKind::Bool => FieldValue::Bool(false),
            ValueKind::Int => FieldValue::Int(0),
            ValueKind::Decimal => FieldValue::Decimal(Decimal::ZERO),
            ValueKind::Double => FieldValue::Double(0.0),
            ValueKind::Text => FieldValue::Text(String::new()),
            ValueKind::Date => FieldValue::Date(NaiveDate::default()),
            ValueKind::DateTimeOffset => FieldValue::DateTimeOffset(epoch()),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dynamic property value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Decimal(Decimal),
    Double(f64),
    Text(String),
    Date(NaiveDate),
    DateTimeOffset(DateTime<FixedOffset>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Kind of the value; `None` for `Null`.
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            FieldValue::Null => None,
            FieldValue::Bool(_) => Some(ValueKind::Bool),
            FieldValue::Int(_) => Some(ValueKind::Int),
            FieldValue::Decimal(_) => Some(ValueKind::Decimal),
            FieldValue::Double(_) => Some(ValueKind::Double),
            FieldValue::Text(_) => Some(ValueKind::Text),
            FieldValue::Date(_) => Some(ValueKind::Date),
            FieldValue::DateTimeOffset(_) => Some(ValueKind::DateTimeOffset),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        self.kind().map_or("null", ValueKind::as_str)
    }

    /// Stable textual form used for hashing and seed derivation.
    pub fn canonical_string(&self) -> String {
        match self {
            FieldValue::Null => String::new(),
            FieldValue::Bool(value) => value.to_string(),
            FieldValue::Int(value) => value.to_string(),
            FieldValue::Decimal(value) => value.to_string(),
            FieldValue::Double(value) => value.to_string(),
            FieldValue::Text(value) => value.clone(),
            FieldValue::Date(value) => value.format(DATE_FORMAT).to_string(),
            FieldValue::DateTimeOffset(value) => format_date_time(value),
        }
    }

    /// Encode as JSON, keeping numbers as JSON numbers. Values with no JSON
    /// form encode as `null`; see [`try_to_json`](Self::try_to_json).
    pub fn to_json(&self) -> Value {
        self.try_to_json().unwrap_or(Value::Null)
    }

    /// Encode as JSON. Decimals keep their exact digits and scale. A NaN or
    /// infinite double is an error rather than a string.
    pub fn try_to_json(&self) -> Result<Value, ConvertError> {
        let value = match self {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(value) => Value::Bool(*value),
            FieldValue::Int(value) => Value::Number((*value).into()),
            FieldValue::Decimal(value) => {
                let text = value.to_string();
                Number::from_str(&text)
                    .map(Value::Number)
                    .map_err(|_| ConvertError::NotRepresentable {
                        kind: ValueKind::Decimal,
                        value: text,
                    })?
            }
            FieldValue::Double(value) => Number::from_f64(*value).map(Value::Number).ok_or_else(
                || ConvertError::NotRepresentable {
                    kind: ValueKind::Double,
                    value: value.to_string(),
                },
            )?,
            FieldValue::Text(value) => Value::String(value.clone()),
            FieldValue::Date(value) => Value::String(value.format(DATE_FORMAT).to_string()),
            FieldValue::DateTimeOffset(value) => Value::String(format_date_time(value)),
        };
        Ok(value)
    }

    /// Decode a JSON value as the given kind. JSON `null` decodes to `Null`.
    pub fn from_json(value: &Value, kind: ValueKind) -> Result<Self, ConvertError> {
        if value.is_null() {
            return Ok(FieldValue::Null);
        }
        let decoded = match (kind, value) {
            (ValueKind::Bool, Value::Bool(value)) => Some(FieldValue::Bool(*value)),
            (ValueKind::Int, Value::Number(number)) => number.as_i64().map(FieldValue::Int),
            (ValueKind::Decimal, Value::Number(number)) => {
                parse_decimal(&number.to_string()).map(FieldValue::Decimal)
            }
            (ValueKind::Decimal, Value::String(text)) => {
                parse_decimal(text).map(FieldValue::Decimal)
            }
            (ValueKind::Double, Value::Number(number)) => number.as_f64().map(FieldValue::Double),
            (ValueKind::Text, Value::String(text)) => Some(FieldValue::Text(text.clone())),
            (ValueKind::Date, Value::String(text)) => NaiveDate::parse_from_str(text, DATE_FORMAT)
                .ok()
                .map(FieldValue::Date),
            (ValueKind::DateTimeOffset, Value::String(text)) => {
                parse_date_time(text).map(FieldValue::DateTimeOffset)
            }
            _ => None,
        };
        decoded.ok_or_else(|| ConvertError::Parse {
            kind,
            value: value.to_string(),
        })
    }
}

pub(crate) fn format_date_time(value: &DateTime<FixedOffset>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

/// Accepts RFC 3339 plus the signed years (`-0001`, `+10000`) that
/// [`format_date_time`] writes outside 0000..=9999.
pub(crate) fn parse_date_time(text: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(text)
        .or_else(|_| DateTime::parse_from_str(text, DATE_TIME_FORMAT))
        .ok()
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

fn epoch() -> DateTime<FixedOffset> {
    DateTime::from_naive_utc_and_offset(NaiveDateTime::default(), Utc.fix())
}

/// Rust carrier of a single value kind.
pub trait FieldType: Clone + Send + Sync + 'static {
    const KIND: ValueKind;

    fn into_field(self) -> FieldValue;

    /// Extract the carrier, handing the value back when the kind differs.
    fn from_field(value: FieldValue) -> Result<Self, FieldValue>;

    fn default_value() -> Self;
}

/// Type usable as a record property: a [`FieldType`] or an `Option` of one.
pub trait PropertyValue: Sized {
    const KIND: ValueKind;
    const NULLABLE: bool;

    fn to_field(&self) -> FieldValue;

    fn from_field(value: FieldValue) -> Result<Self, FieldValue>;
}

macro_rules! field_type {
    ($carrier:ty, $kind:ident, $default:expr) => {
        impl FieldType for $carrier {
            const KIND: ValueKind = ValueKind::$kind;

            fn into_field(self) -> FieldValue {
                FieldValue::$kind(self)
            }

            fn from_field(value: FieldValue) -> Result<Self, FieldValue> {
                match value {
                    FieldValue::$kind(inner) => Ok(inner),
                    other => Err(other),
                }
            }

            fn default_value() -> Self {
                $default
            }
        }

        impl PropertyValue for $carrier {
            const KIND: ValueKind = ValueKind::$kind;
            const NULLABLE: bool = false;

            fn to_field(&self) -> FieldValue {
                FieldValue::$kind(self.clone())
            }

            fn from_field(value: FieldValue) -> Result<Self, FieldValue> {
                match value {
                    FieldValue::Null => Ok(<$carrier as FieldType>::default_value()),
                    other => <$carrier as FieldType>::from_field(other),
                }
            }
        }

        impl PropertyValue for Option<$carrier> {
            const KIND: ValueKind = ValueKind::$kind;
            const NULLABLE: bool = true;

            fn to_field(&self) -> FieldValue {
                match self {
                    Some(inner) => FieldValue::$kind(inner.clone()),
                    None => FieldValue::Null,
                }
            }

            fn from_field(value: FieldValue) -> Result<Self, FieldValue> {
                match value {
                    FieldValue::Null => Ok(None),
                    other => <$carrier as FieldType>::from_field(other).map(Some),
                }
            }
        }
    };
}

field_type!(bool, Bool, false);
field_type!(i64, Int, 0);
field_type!(Decimal, Decimal, Decimal::ZERO);
field_type!(f64, Double, 0.0);
field_type!(String, Text, String::new());
field_type!(NaiveDate, Date, NaiveDate::default());
field_type!(DateTime<FixedOffset>, DateTimeOffset, epoch());
