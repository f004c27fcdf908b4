use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::accessor::{PropertyAccessor, PropertyDescriptor, PropertyInfo, Setter};
use crate::error::AccessError;
use crate::value::{FieldValue, ValueKind};

/// Declared property of a dynamic JSON record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PropertySchema {
    /// Property name as it appears in the JSON object.
    pub name: String,
    /// Declared value kind.
    pub kind: ValueKind,
    /// Whether the property may hold `null`.
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    /// Read-only properties cannot be bound to rules.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,
}

fn default_nullable() -> bool {
    true
}

impl PropertySchema {
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: true,
            read_only: false,
        }
    }
}

/// Record backed by a JSON object whose shape is declared at runtime.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonRecord {
    fields: Map<String, Value>,
}

impl JsonRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Returns `None` when the value is not a JSON object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

impl PropertyAccessor<JsonRecord> {
    /// Compile an accessor for JSON records with the given declared shape.
    ///
    /// Missing keys read as `null`; values that do not decode as the declared
    /// kind fail with [`AccessError::InvalidValue`].
    pub fn for_schema(properties: &[PropertySchema]) -> Self {
        let descriptors = properties.iter().map(json_descriptor).collect();
        Self::from_descriptors(descriptors)
    }
}

fn json_descriptor(schema: &PropertySchema) -> PropertyDescriptor<JsonRecord> {
    let name = schema.name.clone();
    let kind = schema.kind;
    let info = PropertyInfo {
        name: name.clone(),
        kind,
        nullable: schema.nullable,
        writable: !schema.read_only,
    };

    let getter_name = name.clone();
    let getter = move |record: &JsonRecord| -> Result<FieldValue, AccessError> {
        let Some(value) = record.fields.get(&getter_name) else {
            return Ok(FieldValue::Null);
        };
        FieldValue::from_json(value, kind).map_err(|err| AccessError::InvalidValue {
            property: getter_name.clone(),
            message: err.to_string(),
        })
    };

    let setter: Option<Setter<JsonRecord>> = if schema.read_only {
        None
    } else {
        Some(Box::new(move |record: &mut JsonRecord, value: FieldValue| {
            if value.kind().is_some_and(|found| found != kind) {
                return Err(AccessError::TypeMismatch {
                    property: name.clone(),
                    expected: kind,
                    found: value.kind_name().to_string(),
                });
            }
            record.fields.insert(name.clone(), value.to_json());
            Ok(())
        }))
    };

    PropertyDescriptor::custom(info, getter, setter)
}
