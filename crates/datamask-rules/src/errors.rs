use datamask_core::ValueKind;
use thiserror::Error;

/// Errors raised while configuring or applying rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid params: {0}")]
    InvalidParams(String),
    #[error("rule '{rule}' expects {expected} input, found {found}")]
    KindMismatch {
        rule: String,
        expected: ValueKind,
        found: String,
    },
    #[error("rule '{rule}' rejected input: {reason}")]
    Rejected { rule: String, reason: String },
    #[error("unknown rule id '{0}'")]
    UnknownRule(String),
}

impl RuleError {
    pub(crate) fn rejected(rule: &str, reason: impl Into<String>) -> Self {
        RuleError::Rejected {
            rule: rule.to_string(),
            reason: reason.into(),
        }
    }
}
