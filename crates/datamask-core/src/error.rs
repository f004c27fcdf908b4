use thiserror::Error;

use crate::value::ValueKind;

/// Failures raised by the property-access layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// The property name is not part of the compiled accessor.
    #[error("property '{0}' not found")]
    NotFound(String),
    /// The property has a getter but no setter.
    #[error("property '{0}' is read-only")]
    ReadOnly(String),
    /// A value of the wrong kind was written to a property.
    #[error("property '{property}' expects {expected}, found {found}")]
    TypeMismatch {
        property: String,
        expected: ValueKind,
        found: String,
    },
    /// A dynamic record holds a value that does not decode as the declared kind.
    #[error("property '{property}' holds an invalid value: {message}")]
    InvalidValue { property: String, message: String },
}

/// Failures raised while bridging values between kinds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    #[error("no converter available from {from} to {to}")]
    NoConverter { from: ValueKind, to: ValueKind },
    #[error("expected {expected} value, found {found}")]
    KindMismatch { expected: ValueKind, found: String },
    #[error("cannot parse '{value}' as {kind}")]
    Parse { kind: ValueKind, value: String },
    /// The value has no JSON number form, such as a NaN or infinite double.
    #[error("{kind} value '{value}' cannot be written as JSON")]
    NotRepresentable { kind: ValueKind, value: String },
}
