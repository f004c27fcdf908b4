use datamask_core::{AccessError, ConvertError};
use datamask_rules::RuleError;
use thiserror::Error;

/// Errors returned by the masker: configuration errors from
/// [`MaskerBuilder::build`](crate::MaskerBuilder::build) and fatal errors from
/// the masking entrypoints. Per-property failures never surface here.
#[derive(Debug, Error)]
pub enum MaskError {
    #[error("unknown property '{0}'")]
    UnknownProperty(String),
    #[error("property '{0}' is read-only and cannot be masked")]
    ReadOnlyProperty(String),
    #[error("instance is null")]
    NullInstance,
    #[error("instance must be a JSON object, found {0}")]
    NotAnObject(&'static str),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why one property could not be masked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Convert(#[from] ConvertError),
    #[error(transparent)]
    Rule(#[from] RuleError),
}
