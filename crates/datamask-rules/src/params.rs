use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::RuleError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    Bool,
    Int,
    /// Non-negative integer.
    Count,
    Float,
    /// JSON number or numeric string; parsed per the rule's value kind.
    Number,
    String,
    /// Single-character string.
    Char,
}

impl ParamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ParamKind::Bool => "bool",
            ParamKind::Int => "int",
            ParamKind::Count => "count",
            ParamKind::Float => "float",
            ParamKind::Number => "number",
            ParamKind::String => "string",
            ParamKind::Char => "char",
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct ParamSpec {
    pub key: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

impl ParamSpec {
    pub const fn new(key: &'static str, kind: ParamKind, required: bool) -> Self {
        Self {
            key,
            kind,
            required,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ParamMap<'a> {
    map: Option<&'a Map<String, Value>>,
}

/// Check `params` against `specs`: unknown keys, wrong kinds and missing
/// required keys are rejected.
pub fn validate_params<'a>(
    params: Option<&'a Value>,
    specs: &[ParamSpec],
    ctx: &str,
) -> Result<ParamMap<'a>, RuleError> {
    let map = match params {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => Some(map),
        Some(_) => {
            return Err(RuleError::InvalidParams(format!(
                "{ctx}: params must be a JSON object"
            )));
        }
    };

    if let Some(map) = map {
        for (key, value) in map {
            let Some(spec) = specs.iter().find(|spec| spec.key == key.as_str()) else {
                return Err(RuleError::InvalidParams(format!(
                    "{ctx}: unknown param '{key}'"
                )));
            };
            validate_kind(ctx, key, spec.kind, value)?;
        }
    }

    for spec in specs {
        if spec.required && !map.is_some_and(|map| map.contains_key(spec.key)) {
            return Err(RuleError::InvalidParams(format!(
                "{ctx}: missing required param '{}'",
                spec.key
            )));
        }
    }

    Ok(ParamMap { map })
}

impl<'a> ParamMap<'a> {
    fn get(&self, key: &str) -> Option<&'a Value> {
        self.map.and_then(|map| map.get(key))
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key)
            .and_then(Value::as_u64)
            .and_then(|value| usize::try_from(value).ok())
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn get_str(&self, key: &str) -> Option<&'a str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_char(&self, key: &str) -> Option<char> {
        self.get_str(key).and_then(single_char)
    }

    /// Numeric param as written: JSON numbers keep their literal text so
    /// decimals do not pass through `f64`.
    pub fn get_number_text(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::Number(number) => Some(number.to_string()),
            Value::String(text) => Some(text.trim().to_string()),
            _ => None,
        }
    }
}

fn single_char(value: &str) -> Option<char> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) => Some(ch),
        _ => None,
    }
}

fn validate_kind(ctx: &str, key: &str, kind: ParamKind, value: &Value) -> Result<(), RuleError> {
    let valid = match kind {
        ParamKind::Bool => value.is_boolean(),
        ParamKind::Int => value.as_i64().is_some(),
        ParamKind::Count => value.as_u64().is_some(),
        ParamKind::Float => value.as_f64().is_some(),
        ParamKind::Number => match value {
            Value::Number(_) => true,
            Value::String(text) => Decimal::from_str(text.trim()).is_ok(),
            _ => false,
        },
        ParamKind::String => value.is_string(),
        ParamKind::Char => value.as_str().and_then(single_char).is_some(),
    };

    if valid {
        Ok(())
    } else {
        Err(RuleError::InvalidParams(format!(
            "{ctx}: invalid value for param '{key}' (expected {})",
            kind.as_str()
        )))
    }
}
