use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate};
use datamask_core::{FieldType, FieldValue, ValueKind};
use rust_decimal::Decimal;

use crate::catalog::CatalogRule;
use crate::errors::RuleError;
use crate::seed::SeedProvider;

/// A masking rule over values of kind `T`.
///
/// Rules are opaque to the engine apart from `apply`. Seed-aware rules expose
/// themselves through `as_seeded`/`as_seeded_mut` so composers can hand them a
/// pending seed.
pub trait MaskRule<T>: Send + Sync {
    /// Stable identifier, used in diagnostics.
    fn id(&self) -> &'static str;

    fn apply(&self, input: T) -> Result<T, RuleError>;

    fn as_seeded(&self) -> Option<&dyn SeededRule<T>> {
        None
    }

    fn as_seeded_mut(&mut self) -> Option<&mut dyn SeededRule<T>> {
        None
    }
}

/// A rule whose randomness can be pinned by a [`SeedProvider`].
pub trait SeededRule<T>: MaskRule<T> {
    fn seed_provider(&self) -> Option<&SeedProvider<T>>;

    fn set_seed_provider(&mut self, provider: Option<SeedProvider<T>>);
}

impl<T> MaskRule<T> for Box<dyn MaskRule<T>> {
    fn id(&self) -> &'static str {
        self.as_ref().id()
    }

    fn apply(&self, input: T) -> Result<T, RuleError> {
        self.as_ref().apply(input)
    }

    fn as_seeded(&self) -> Option<&dyn SeededRule<T>> {
        self.as_ref().as_seeded()
    }

    fn as_seeded_mut(&mut self) -> Option<&mut dyn SeededRule<T>> {
        self.as_mut().as_seeded_mut()
    }
}

/// A rule of any supported kind.
#[derive(Clone)]
pub enum AnyRule {
    Text(Arc<dyn MaskRule<String>>),
    Int(Arc<dyn MaskRule<i64>>),
    Decimal(Arc<dyn MaskRule<Decimal>>),
    Double(Arc<dyn MaskRule<f64>>),
    Date(Arc<dyn MaskRule<NaiveDate>>),
    DateTimeOffset(Arc<dyn MaskRule<DateTime<FixedOffset>>>),
}

impl fmt::Debug for AnyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyRule")
            .field("kind", &self.kind())
            .field("id", &self.id())
            .finish()
    }
}

impl AnyRule {
    pub fn new<T: RuleValue>(rule: impl MaskRule<T> + 'static) -> Self {
        T::wrap(Arc::new(rule))
    }

    /// Kind of the values the rule reads and returns.
    pub fn kind(&self) -> ValueKind {
        match self {
            AnyRule::Text(_) => ValueKind::Text,
            AnyRule::Int(_) => ValueKind::Int,
            AnyRule::Decimal(_) => ValueKind::Decimal,
            AnyRule::Double(_) => ValueKind::Double,
            AnyRule::Date(_) => ValueKind::Date,
            AnyRule::DateTimeOffset(_) => ValueKind::DateTimeOffset,
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            AnyRule::Text(rule) => rule.id(),
            AnyRule::Int(rule) => rule.id(),
            AnyRule::Decimal(rule) => rule.id(),
            AnyRule::Double(rule) => rule.id(),
            AnyRule::Date(rule) => rule.id(),
            AnyRule::DateTimeOffset(rule) => rule.id(),
        }
    }

    /// Apply to a dynamic value. `Null` passes through; a value of another
    /// kind is rejected without invoking the rule.
    pub fn apply(&self, value: FieldValue) -> Result<FieldValue, RuleError> {
        match (self, value) {
            (_, FieldValue::Null) => Ok(FieldValue::Null),
            (AnyRule::Text(rule), FieldValue::Text(value)) => rule.apply(value).map(FieldValue::Text),
            (AnyRule::Int(rule), FieldValue::Int(value)) => rule.apply(value).map(FieldValue::Int),
            (AnyRule::Decimal(rule), FieldValue::Decimal(value)) => {
                rule.apply(value).map(FieldValue::Decimal)
            }
            (AnyRule::Double(rule), FieldValue::Double(value)) => {
                rule.apply(value).map(FieldValue::Double)
            }
            (AnyRule::Date(rule), FieldValue::Date(value)) => rule.apply(value).map(FieldValue::Date),
            (AnyRule::DateTimeOffset(rule), FieldValue::DateTimeOffset(value)) => {
                rule.apply(value).map(FieldValue::DateTimeOffset)
            }
            (rule, other) => Err(RuleError::KindMismatch {
                rule: rule.id().to_string(),
                expected: rule.kind(),
                found: other.kind_name().to_string(),
            }),
        }
    }
}

/// Value kinds that rules can be written for. `Bool` has no rules.
pub trait RuleValue: FieldType {
    fn wrap(rule: Arc<dyn MaskRule<Self>>) -> AnyRule;

    fn wrap_owned(rule: Box<dyn MaskRule<Self>>) -> CatalogRule;
}

macro_rules! rule_value {
    ($carrier:ty, $variant:ident) => {
        impl RuleValue for $carrier {
            fn wrap(rule: Arc<dyn MaskRule<Self>>) -> AnyRule {
                AnyRule::$variant(rule)
            }

            fn wrap_owned(rule: Box<dyn MaskRule<Self>>) -> CatalogRule {
                CatalogRule::$variant(rule)
            }
        }
    };
}

rule_value!(String, Text);
rule_value!(i64, Int);
rule_value!(Decimal, Decimal);
rule_value!(f64, Double);
rule_value!(NaiveDate, Date);
rule_value!(DateTime<FixedOffset>, DateTimeOffset);

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    impl MaskRule<String> for Upper {
        fn id(&self) -> &'static str {
            "test.upper"
        }

        fn apply(&self, input: String) -> Result<String, RuleError> {
            Ok(input.to_uppercase())
        }
    }

    #[test]
    fn any_rule_dispatches_by_kind() {
        let rule = AnyRule::new(Upper);
        assert_eq!(rule.kind(), ValueKind::Text);
        assert_eq!(
            rule.apply(FieldValue::Text("abc".into())),
            Ok(FieldValue::Text("ABC".into()))
        );
        assert_eq!(rule.apply(FieldValue::Null), Ok(FieldValue::Null));
    }

    #[test]
    fn any_rule_rejects_other_kinds_without_casting() {
        let rule = AnyRule::new(Upper);
        let err = rule.apply(FieldValue::Int(5)).expect_err("kind mismatch");
        assert_eq!(
            err,
            RuleError::KindMismatch {
                rule: "test.upper".to_string(),
                expected: ValueKind::Text,
                found: "int".to_string(),
            }
        );
    }
}
