//! Built-in rules addressable by stable id, and a kind-erased composer for
//! assembling them from declarative input.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate};
use datamask_core::ValueKind;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

use crate::compose::RuleComposer;
use crate::date::{DatePrecision, DateShift, DateTimeShift, DateTruncate};
use crate::errors::RuleError;
use crate::numeric::{Clamp, Numeric, NumericNoise, RoundTo};
use crate::params::{ParamKind, ParamMap, ParamSpec, validate_params};
use crate::rule::{AnyRule, MaskRule, RuleValue};
use crate::seed::SeedChoice;
use crate::text::{
    CaseMode, Casing, DEFAULT_MASK_CHAR, FormatPreserving, HashText, MaskChars, Redact,
    RegexReplace, Scramble, Truncate,
};

/// An owned rule of any kind, not yet added to a composer.
pub enum CatalogRule {
    Text(Box<dyn MaskRule<String>>),
    Int(Box<dyn MaskRule<i64>>),
    Decimal(Box<dyn MaskRule<Decimal>>),
    Double(Box<dyn MaskRule<f64>>),
    Date(Box<dyn MaskRule<NaiveDate>>),
    DateTimeOffset(Box<dyn MaskRule<DateTime<FixedOffset>>>),
}

impl std::fmt::Debug for CatalogRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogRule")
            .field("kind", &self.kind())
            .field("id", &self.id())
            .finish()
    }
}

impl CatalogRule {
    pub fn new<T: RuleValue>(rule: impl MaskRule<T> + 'static) -> Self {
        T::wrap_owned(Box::new(rule))
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            CatalogRule::Text(_) => ValueKind::Text,
            CatalogRule::Int(_) => ValueKind::Int,
            CatalogRule::Decimal(_) => ValueKind::Decimal,
            CatalogRule::Double(_) => ValueKind::Double,
            CatalogRule::Date(_) => ValueKind::Date,
            CatalogRule::DateTimeOffset(_) => ValueKind::DateTimeOffset,
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            CatalogRule::Text(rule) => rule.id(),
            CatalogRule::Int(rule) => rule.id(),
            CatalogRule::Decimal(rule) => rule.id(),
            CatalogRule::Double(rule) => rule.id(),
            CatalogRule::Date(rule) => rule.id(),
            CatalogRule::DateTimeOffset(rule) => rule.id(),
        }
    }

    pub fn is_seeded(&self) -> bool {
        match self {
            CatalogRule::Text(rule) => rule.as_seeded().is_some(),
            CatalogRule::Int(rule) => rule.as_seeded().is_some(),
            CatalogRule::Decimal(rule) => rule.as_seeded().is_some(),
            CatalogRule::Double(rule) => rule.as_seeded().is_some(),
            CatalogRule::Date(rule) => rule.as_seeded().is_some(),
            CatalogRule::DateTimeOffset(rule) => rule.as_seeded().is_some(),
        }
    }
}

/// Public description of a catalog rule.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RuleDescriptor {
    pub id: &'static str,
    /// Supported kinds; the first one is used when the caller gives no hint.
    pub kinds: &'static [ValueKind],
    pub seeded: bool,
    pub params: &'static [ParamSpec],
    pub summary: &'static str,
}

pub type BuildRule = fn(&ParamMap<'_>, ValueKind) -> Result<CatalogRule, RuleError>;

#[derive(Clone, Copy)]
struct CatalogEntry {
    descriptor: RuleDescriptor,
    build: BuildRule,
}

/// Rule factories keyed by id.
#[derive(Clone)]
pub struct RuleCatalog {
    entries: BTreeMap<&'static str, CatalogEntry>,
}

impl Default for RuleCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RuleCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.entries.keys()).finish()
    }
}

const TEXT: &[ValueKind] = &[ValueKind::Text];
const NUMERIC: &[ValueKind] = &[ValueKind::Double, ValueKind::Int, ValueKind::Decimal];
const DATE: &[ValueKind] = &[ValueKind::Date];
const DATE_TIME: &[ValueKind] = &[ValueKind::DateTimeOffset];

impl RuleCatalog {
    /// Catalog with every built-in rule registered.
    pub fn new() -> Self {
        let mut catalog = Self::empty();
        catalog.register_builtins();
        catalog
    }

    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Add or replace a rule factory.
    pub fn register(&mut self, descriptor: RuleDescriptor, build: BuildRule) {
        if self
            .entries
            .insert(descriptor.id, CatalogEntry { descriptor, build })
            .is_some()
        {
            tracing::warn!(rule = descriptor.id, "replacing catalog rule");
        }
    }

    pub fn descriptor(&self, id: &str) -> Option<&RuleDescriptor> {
        self.entries.get(id).map(|entry| &entry.descriptor)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &RuleDescriptor> {
        self.entries.values().map(|entry| &entry.descriptor)
    }

    /// Kind the rule will operate on: `hint` when supported, otherwise the
    /// rule's first kind (the property value is then converted).
    pub fn resolve_kind(&self, id: &str, hint: Option<ValueKind>) -> Result<ValueKind, RuleError> {
        let descriptor = self
            .descriptor(id)
            .ok_or_else(|| RuleError::UnknownRule(id.to_string()))?;
        match hint {
            Some(kind) if descriptor.kinds.contains(&kind) => Ok(kind),
            _ => descriptor.kinds.first().copied().ok_or_else(|| {
                RuleError::InvalidArgument(format!("rule '{id}' declares no value kinds"))
            }),
        }
    }

    pub fn create(
        &self,
        id: &str,
        params: Option<&Value>,
        hint: Option<ValueKind>,
    ) -> Result<CatalogRule, RuleError> {
        let entry = self
            .entries
            .get(id)
            .ok_or_else(|| RuleError::UnknownRule(id.to_string()))?;
        let kind = self.resolve_kind(id, hint)?;
        let params = validate_params(params, entry.descriptor.params, entry.descriptor.id)?;
        tracing::debug!(rule = id, kind = %kind, "creating catalog rule");
        (entry.build)(&params, kind)
    }

    fn register_builtins(&mut self) {
        self.register(
            RuleDescriptor {
                id: "text.redact",
                kinds: TEXT,
                seeded: false,
                params: &[ParamSpec { key: "replacement", kind: ParamKind::String, required: false }],
                summary: "replace the value with a fixed string (default \"***\")",
            },
            |params, _| {
                Ok(CatalogRule::new(match params.get_str("replacement") {
                    Some(replacement) => Redact::with_replacement(replacement),
                    None => Redact::default(),
                }))
            },
        );
        self.register(
            RuleDescriptor {
                id: "text.mask",
                kinds: TEXT,
                seeded: false,
                params: &[
                    ParamSpec { key: "keep_start", kind: ParamKind::Count, required: false },
                    ParamSpec { key: "keep_end", kind: ParamKind::Count, required: false },
                    ParamSpec { key: "mask_char", kind: ParamKind::Char, required: false },
                ],
                summary: "mask characters, keeping a prefix and suffix",
            },
            |params, _| {
                Ok(CatalogRule::new(MaskChars::new(
                    params.get_usize("keep_start").unwrap_or(0),
                    params.get_usize("keep_end").unwrap_or(0),
                    params.get_char("mask_char").unwrap_or(DEFAULT_MASK_CHAR),
                )))
            },
        );
        self.register(
            RuleDescriptor {
                id: "text.format_preserving",
                kinds: TEXT,
                seeded: false,
                params: &[ParamSpec { key: "mask_char", kind: ParamKind::Char, required: false }],
                summary: "mask keeping email, CPF and CNPJ layouts",
            },
            |params, _| {
                Ok(CatalogRule::new(FormatPreserving::new(
                    params.get_char("mask_char").unwrap_or(DEFAULT_MASK_CHAR),
                )))
            },
        );
        self.register(
            RuleDescriptor {
                id: "text.hash",
                kinds: TEXT,
                seeded: false,
                params: &[
                    ParamSpec { key: "salt", kind: ParamKind::String, required: false },
                    ParamSpec { key: "length", kind: ParamKind::Count, required: false },
                ],
                summary: "salted SHA-256, hex encoded",
            },
            |params, _| {
                Ok(CatalogRule::new(HashText::new(
                    params.get_str("salt").unwrap_or_default(),
                    params.get_usize("length"),
                )))
            },
        );
        self.register(
            RuleDescriptor {
                id: "text.truncate",
                kinds: TEXT,
                seeded: false,
                params: &[ParamSpec { key: "max_len", kind: ParamKind::Count, required: true }],
                summary: "keep at most max_len characters",
            },
            |params, _| {
                let max_len = required(params.get_usize("max_len"), "text.truncate", "max_len")?;
                Ok(CatalogRule::new(Truncate::new(max_len)))
            },
        );
        self.register(
            RuleDescriptor {
                id: "text.casing",
                kinds: TEXT,
                seeded: false,
                params: &[ParamSpec { key: "mode", kind: ParamKind::String, required: true }],
                summary: "upper, lower or title case",
            },
            |params, _| {
                let mode = params
                    .get_str("mode")
                    .and_then(CaseMode::parse)
                    .ok_or_else(|| {
                        RuleError::InvalidParams(
                            "text.casing: mode must be upper, lower, or title".to_string(),
                        )
                    })?;
                Ok(CatalogRule::new(Casing::new(mode)))
            },
        );
        self.register(
            RuleDescriptor {
                id: "text.regex_replace",
                kinds: TEXT,
                seeded: false,
                params: &[
                    ParamSpec { key: "pattern", kind: ParamKind::String, required: true },
                    ParamSpec { key: "replacement", kind: ParamKind::String, required: false },
                ],
                summary: "replace every regex match",
            },
            |params, _| {
                let pattern = required(params.get_str("pattern"), "text.regex_replace", "pattern")?;
                let rule = RegexReplace::new(pattern, params.get_str("replacement").unwrap_or(""))
                    .map_err(|err| RuleError::InvalidParams(format!("text.regex_replace: {err}")))?;
                Ok(CatalogRule::new(rule))
            },
        );
        self.register(
            RuleDescriptor {
                id: "text.scramble",
                kinds: TEXT,
                seeded: true,
                params: &[],
                summary: "random letters and digits, same shape",
            },
            |_, _| Ok(CatalogRule::new(Scramble::new())),
        );
        self.register(
            RuleDescriptor {
                id: "numeric.noise",
                kinds: NUMERIC,
                seeded: true,
                params: &[
                    ParamSpec { key: "max", kind: ParamKind::Number, required: false },
                    ParamSpec { key: "fraction", kind: ParamKind::Float, required: false },
                ],
                summary: "add bounded random noise, absolute (max) or relative (fraction)",
            },
            |params, kind| match kind {
                ValueKind::Int => noise::<i64>(params),
                ValueKind::Decimal => noise::<Decimal>(params),
                ValueKind::Double => noise::<f64>(params),
                other => Err(unsupported("numeric.noise", other)),
            },
        );
        self.register(
            RuleDescriptor {
                id: "numeric.round",
                kinds: NUMERIC,
                seeded: false,
                params: &[ParamSpec { key: "step", kind: ParamKind::Number, required: true }],
                summary: "round to the nearest multiple of step",
            },
            |params, kind| match kind {
                ValueKind::Int => round::<i64>(params),
                ValueKind::Decimal => round::<Decimal>(params),
                ValueKind::Double => round::<f64>(params),
                other => Err(unsupported("numeric.round", other)),
            },
        );
        self.register(
            RuleDescriptor {
                id: "numeric.clamp",
                kinds: NUMERIC,
                seeded: false,
                params: &[
                    ParamSpec { key: "min", kind: ParamKind::Number, required: false },
                    ParamSpec { key: "max", kind: ParamKind::Number, required: false },
                ],
                summary: "limit values to [min, max]",
            },
            |params, kind| match kind {
                ValueKind::Int => clamp::<i64>(params),
                ValueKind::Decimal => clamp::<Decimal>(params),
                ValueKind::Double => clamp::<f64>(params),
                other => Err(unsupported("numeric.clamp", other)),
            },
        );
        self.register(
            RuleDescriptor {
                id: "date.shift",
                kinds: DATE,
                seeded: true,
                params: &[ParamSpec { key: "max_days", kind: ParamKind::Count, required: true }],
                summary: "move the date by up to max_days in either direction",
            },
            |params, _| {
                let max_days = required(params.get_i64("max_days"), "date.shift", "max_days")?;
                Ok(CatalogRule::new(DateShift::new(max_days)?))
            },
        );
        self.register(
            RuleDescriptor {
                id: "date.truncate",
                kinds: DATE,
                seeded: false,
                params: &[ParamSpec { key: "precision", kind: ParamKind::String, required: true }],
                summary: "keep only the year or the year and month",
            },
            |params, _| {
                let precision = params
                    .get_str("precision")
                    .and_then(DatePrecision::parse)
                    .ok_or_else(|| {
                        RuleError::InvalidParams(
                            "date.truncate: precision must be year or month".to_string(),
                        )
                    })?;
                Ok(CatalogRule::new(DateTruncate::new(precision)))
            },
        );
        self.register(
            RuleDescriptor {
                id: "datetime.shift",
                kinds: DATE_TIME,
                seeded: true,
                params: &[ParamSpec { key: "max_seconds", kind: ParamKind::Count, required: true }],
                summary: "move the timestamp by up to max_seconds, keeping its offset",
            },
            |params, _| {
                let max_seconds =
                    required(params.get_i64("max_seconds"), "datetime.shift", "max_seconds")?;
                Ok(CatalogRule::new(DateTimeShift::new(max_seconds)?))
            },
        );
    }
}

fn required<T>(value: Option<T>, ctx: &str, key: &str) -> Result<T, RuleError> {
    value.ok_or_else(|| RuleError::InvalidParams(format!("{ctx}: missing required param '{key}'")))
}

fn unsupported(ctx: &str, kind: ValueKind) -> RuleError {
    RuleError::InvalidParams(format!("{ctx}: {kind} values are not supported"))
}

fn number_param<T: Numeric>(params: &ParamMap<'_>, ctx: &str, key: &str) -> Result<Option<T>, RuleError> {
    params
        .get_number_text(key)
        .map(|text| {
            T::parse_param(&text).ok_or_else(|| {
                RuleError::InvalidParams(format!("{ctx}: '{key}' is not a valid {} value", T::KIND))
            })
        })
        .transpose()
}

fn noise<T: Numeric>(params: &ParamMap<'_>) -> Result<CatalogRule, RuleError> {
    let ctx = "numeric.noise";
    let rule = match (number_param::<T>(params, ctx, "max")?, params.get_f64("fraction")) {
        (Some(max), None) => NumericNoise::absolute(max)?,
        (None, Some(fraction)) => NumericNoise::relative(fraction)?,
        _ => {
            return Err(RuleError::InvalidParams(format!(
                "{ctx}: exactly one of 'max' or 'fraction' is required"
            )));
        }
    };
    Ok(CatalogRule::new(rule))
}

fn round<T: Numeric>(params: &ParamMap<'_>) -> Result<CatalogRule, RuleError> {
    let ctx = "numeric.round";
    let step = required(number_param::<T>(params, ctx, "step")?, ctx, "step")?;
    Ok(CatalogRule::new(RoundTo::new(step)?))
}

fn clamp<T: Numeric>(params: &ParamMap<'_>) -> Result<CatalogRule, RuleError> {
    let ctx = "numeric.clamp";
    let min = number_param::<T>(params, ctx, "min")?;
    let max = number_param::<T>(params, ctx, "max")?;
    if min.is_none() && max.is_none() {
        return Err(RuleError::InvalidParams(format!(
            "{ctx}: at least one of 'min' or 'max' is required"
        )));
    }
    Ok(CatalogRule::new(Clamp::new(min, max)?))
}

/// A [`RuleComposer`] for one value kind, chosen at runtime.
#[derive(Debug)]
pub enum AnyComposer {
    Text(RuleComposer<String>),
    Int(RuleComposer<i64>),
    Decimal(RuleComposer<Decimal>),
    Double(RuleComposer<f64>),
    Date(RuleComposer<NaiveDate>),
    DateTimeOffset(RuleComposer<DateTime<FixedOffset>>),
}

macro_rules! each_composer {
    ($self:expr, $composer:ident => $body:expr) => {
        match $self {
            AnyComposer::Text($composer) => $body,
            AnyComposer::Int($composer) => $body,
            AnyComposer::Decimal($composer) => $body,
            AnyComposer::Double($composer) => $body,
            AnyComposer::Date($composer) => $body,
            AnyComposer::DateTimeOffset($composer) => $body,
        }
    };
}

impl AnyComposer {
    /// `None` for kinds no rule can be written for.
    pub fn new(kind: ValueKind) -> Option<Self> {
        match kind {
            ValueKind::Bool => None,
            ValueKind::Int => Some(AnyComposer::Int(RuleComposer::new())),
            ValueKind::Decimal => Some(AnyComposer::Decimal(RuleComposer::new())),
            ValueKind::Double => Some(AnyComposer::Double(RuleComposer::new())),
            ValueKind::Text => Some(AnyComposer::Text(RuleComposer::new())),
            ValueKind::Date => Some(AnyComposer::Date(RuleComposer::new())),
            ValueKind::DateTimeOffset => Some(AnyComposer::DateTimeOffset(RuleComposer::new())),
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            AnyComposer::Text(_) => ValueKind::Text,
            AnyComposer::Int(_) => ValueKind::Int,
            AnyComposer::Decimal(_) => ValueKind::Decimal,
            AnyComposer::Double(_) => ValueKind::Double,
            AnyComposer::Date(_) => ValueKind::Date,
            AnyComposer::DateTimeOffset(_) => ValueKind::DateTimeOffset,
        }
    }

    /// Set the pending seed for the next seed-aware rule.
    pub fn with_seed(&mut self, choice: SeedChoice) -> &mut Self {
        each_composer!(self, composer => {
            composer.with_seed_provider(choice.provider());
        });
        self
    }

    pub fn try_with_seed(&mut self, choice: Option<SeedChoice>) -> Result<&mut Self, RuleError> {
        let choice = choice.ok_or_else(|| {
            RuleError::InvalidArgument("seed source must not be null".to_string())
        })?;
        Ok(self.with_seed(choice))
    }

    pub fn has_pending_seed(&self) -> bool {
        each_composer!(self, composer => composer.has_pending_seed())
    }

    pub fn add(&mut self, rule: CatalogRule) -> Result<&mut Self, RuleError> {
        match (&mut *self, rule) {
            (AnyComposer::Text(composer), CatalogRule::Text(rule)) => {
                composer.add_rule(rule);
            }
            (AnyComposer::Int(composer), CatalogRule::Int(rule)) => {
                composer.add_rule(rule);
            }
            (AnyComposer::Decimal(composer), CatalogRule::Decimal(rule)) => {
                composer.add_rule(rule);
            }
            (AnyComposer::Double(composer), CatalogRule::Double(rule)) => {
                composer.add_rule(rule);
            }
            (AnyComposer::Date(composer), CatalogRule::Date(rule)) => {
                composer.add_rule(rule);
            }
            (AnyComposer::DateTimeOffset(composer), CatalogRule::DateTimeOffset(rule)) => {
                composer.add_rule(rule);
            }
            (composer, rule) => {
                return Err(RuleError::KindMismatch {
                    rule: rule.id().to_string(),
                    expected: composer.kind(),
                    found: rule.kind().as_str().to_string(),
                });
            }
        }
        Ok(self)
    }

    pub fn len(&self) -> usize {
        each_composer!(self, composer => composer.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn build(&self) -> AnyRule {
        each_composer!(self, composer => AnyRule::from(composer.build()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datamask_core::FieldValue;
    use serde_json::json;

    #[test]
    fn every_builtin_is_listed_with_a_kind() {
        let catalog = RuleCatalog::new();
        let ids: Vec<_> = catalog.descriptors().map(|d| d.id).collect();
        assert!(ids.contains(&"text.redact"));
        assert!(ids.contains(&"numeric.noise"));
        assert!(ids.contains(&"datetime.shift"));
        assert!(catalog.descriptors().all(|d| !d.kinds.is_empty()));
    }

    #[test]
    fn resolve_kind_prefers_supported_hint() {
        let catalog = RuleCatalog::new();
        assert_eq!(
            catalog.resolve_kind("numeric.round", Some(ValueKind::Int)),
            Ok(ValueKind::Int)
        );
        assert_eq!(
            catalog.resolve_kind("text.mask", Some(ValueKind::Int)),
            Ok(ValueKind::Text)
        );
        assert_eq!(
            catalog.resolve_kind("numeric.round", None),
            Ok(ValueKind::Double)
        );
        assert!(matches!(
            catalog.resolve_kind("text.nope", None),
            Err(RuleError::UnknownRule(_))
        ));
    }

    #[test]
    fn create_validates_params() {
        let catalog = RuleCatalog::new();
        let missing = catalog.create("text.truncate", None, None);
        assert!(matches!(missing, Err(RuleError::InvalidParams(_))));

        let both = json!({"max": 1, "fraction": 0.1});
        let both = catalog.create("numeric.noise", Some(&both), Some(ValueKind::Int));
        assert!(matches!(both, Err(RuleError::InvalidParams(_))));

        let fractional_int = json!({"step": "0.5"});
        let fractional_int = catalog.create("numeric.round", Some(&fractional_int), Some(ValueKind::Int));
        assert!(matches!(fractional_int, Err(RuleError::InvalidParams(_))));
    }

    #[test]
    fn composer_assembles_catalog_rules() {
        let catalog = RuleCatalog::new();
        let mut composer = AnyComposer::new(ValueKind::Decimal).expect("decimal composer");
        let params = json!({"step": "0.5"});
        composer
            .add(catalog.create("numeric.round", Some(&params), Some(ValueKind::Decimal)).expect("rule"))
            .expect("same kind");
        let rule = composer.build();
        assert_eq!(rule.kind(), ValueKind::Decimal);
        assert_eq!(
            rule.apply(FieldValue::Decimal(Decimal::new(126, 2))),
            Ok(FieldValue::Decimal(Decimal::new(150, 2)))
        );
    }

    #[test]
    fn composer_rejects_rule_of_other_kind() {
        let catalog = RuleCatalog::new();
        let mut composer = AnyComposer::new(ValueKind::Int).expect("int composer");
        let err = composer
            .add(catalog.create("text.redact", None, None).expect("rule"))
            .expect_err("kind mismatch");
        assert!(matches!(err, RuleError::KindMismatch { .. }));
        assert!(AnyComposer::new(ValueKind::Bool).is_none());
    }
}
