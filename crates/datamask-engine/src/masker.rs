use std::collections::HashMap;
use std::sync::Arc;

use datamask_core::{
    ConvertError, Conversion, FieldValue, JsonRecord, PropertyAccessor, PropertyInfo,
    PropertySchema, Record, TypeConverterRegistry,
};
use datamask_rules::{AnyRule, MaskRule, RuleValue};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::errors::{FieldError, MaskError};
use crate::model::{CoverageMode, MaskResult};

/// Masker over dynamic JSON records.
pub type JsonMasker = Masker<JsonRecord>;

/// Applies bound rules to the properties of `R` and serializes the result.
///
/// Built once with [`MaskerBuilder`], then reusable and shareable across
/// threads for any number of records.
pub struct Masker<R> {
    accessor: Arc<PropertyAccessor<R>>,
    bindings: HashMap<String, BoundRule>,
    coverage: CoverageMode,
}

/// A rule with the conversions to and from its kind, resolved at build time.
#[derive(Debug)]
struct BoundRule {
    rule: AnyRule,
    to_rule: Result<Conversion, ConvertError>,
    from_rule: Result<Conversion, ConvertError>,
}

impl BoundRule {
    fn new(rule: AnyRule, property: &PropertyInfo, converters: &TypeConverterRegistry) -> Self {
        let resolve = |from, to| {
            converters
                .resolve(from, to)
                .ok_or(ConvertError::NoConverter { from, to })
        };
        Self {
            to_rule: resolve(property.kind, rule.kind()),
            from_rule: resolve(rule.kind(), property.kind),
            rule,
        }
    }
}

impl<R> std::fmt::Debug for Masker<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Masker")
            .field("properties", &self.accessor.len())
            .field("bindings", &self.bindings)
            .field("coverage", &self.coverage)
            .finish()
    }
}

/// Configuration for a [`Masker`]. Selectors are validated in [`build`](Self::build).
pub struct MaskerBuilder<R> {
    accessor: Arc<PropertyAccessor<R>>,
    converters: Arc<TypeConverterRegistry>,
    bindings: Vec<(String, AnyRule)>,
    coverage: CoverageMode,
}

impl<R: Record> Masker<R> {
    pub fn builder() -> MaskerBuilder<R> {
        MaskerBuilder::new(PropertyAccessor::<R>::shared())
    }
}

impl Masker<JsonRecord> {
    /// Builder for JSON records of the given declared shape.
    pub fn for_schema(properties: &[PropertySchema]) -> MaskerBuilder<JsonRecord> {
        MaskerBuilder::new(Arc::new(PropertyAccessor::for_schema(properties)))
    }

    /// Mask a JSON value. `null` and non-object values are fatal. Keys not
    /// declared in the schema are dropped from the output.
    pub fn mask_value(&self, value: &Value) -> Result<MaskResult, MaskError> {
        match value {
            Value::Null => Err(MaskError::NullInstance),
            Value::Object(fields) => self.mask(&JsonRecord::new(fields.clone())),
            other => Err(MaskError::NotAnObject(json_type_name(other))),
        }
    }
}

impl<R> MaskerBuilder<R> {
    pub fn new(accessor: Arc<PropertyAccessor<R>>) -> Self {
        Self {
            accessor,
            converters: TypeConverterRegistry::global(),
            bindings: Vec::new(),
            coverage: CoverageMode::default(),
        }
    }

    /// Bind a rule to a property. Binding the same property again replaces
    /// the earlier rule.
    pub fn bind(mut self, selector: impl Into<String>, rule: impl Into<AnyRule>) -> Self {
        self.bindings.push((selector.into(), rule.into()));
        self
    }

    /// Bind a single typed rule.
    pub fn bind_rule<T: RuleValue>(
        self,
        selector: impl Into<String>,
        rule: impl MaskRule<T> + 'static,
    ) -> Self {
        self.bind(selector, AnyRule::new(rule))
    }

    pub fn coverage(mut self, coverage: CoverageMode) -> Self {
        self.coverage = coverage;
        self
    }

    /// Use a specific converter registry instead of the process default.
    pub fn converters(mut self, converters: Arc<TypeConverterRegistry>) -> Self {
        self.converters = converters;
        self
    }

    pub fn build(self) -> Result<Masker<R>, MaskError> {
        let mut bindings = HashMap::with_capacity(self.bindings.len());
        for (selector, rule) in self.bindings {
            let name = resolve_selector(&self.accessor, &selector)?;
            let property = self
                .accessor
                .property_info(&name)
                .map_err(|_| MaskError::UnknownProperty(selector.clone()))?;
            if !property.writable {
                return Err(MaskError::ReadOnlyProperty(name));
            }
            let bound = BoundRule::new(rule, property, &self.converters);
            if bound.to_rule.is_err() || bound.from_rule.is_err() {
                let rule = &bound.rule;
                warn!(
                    property = %name,
                    property_kind = %property.kind,
                    rule = rule.id(),
                    rule_kind = %rule.kind(),
                    "no converter for bound rule; the property will fail at mask time"
                );
            }
            if bindings.insert(name.clone(), bound).is_some() {
                debug!(property = %name, "property rebound; last rule wins");
            }
        }

        info!(
            properties = self.accessor.len(),
            bindings = bindings.len(),
            coverage = %self.coverage,
            "masker built"
        );

        Ok(Masker {
            accessor: self.accessor,
            bindings,
            coverage: self.coverage,
        })
    }
}

impl<R> Masker<R> {
    pub fn coverage(&self) -> CoverageMode {
        self.coverage
    }

    pub fn accessor(&self) -> &Arc<PropertyAccessor<R>> {
        &self.accessor
    }

    /// Canonical names of the bound properties, in declaration order.
    pub fn bound_properties(&self) -> impl Iterator<Item = &str> {
        self.accessor
            .property_names()
            .filter(|name| self.bindings.contains_key(*name))
    }

    /// Mask one record. Property failures are collected into the result;
    /// only serialization failures are returned as errors.
    pub fn mask(&self, instance: &R) -> Result<MaskResult, MaskError> {
        let mut staged = Map::new();
        let mut errors = Vec::new();

        for property in self.accessor.properties() {
            let value = match self.bindings.get(&property.name) {
                Some(bound) => self.apply_rule(instance, property, bound),
                None => self.uncovered(instance, property),
            };
            let value = value
                .and_then(|value| value.try_to_json().map_err(FieldError::from))
                .unwrap_or_else(|err| {
                    warn!(property = %property.name, error = %err, "property masking failed");
                    errors.push(format!("{}: {err}", property.name));
                    Value::Null
                });
            staged.insert(property.name.clone(), value);
        }

        let masked_data = serde_json::to_string(&Value::Object(staged))?;
        debug!(failed = errors.len(), "record masked");
        Ok(MaskResult::new(errors, masked_data))
    }

    /// Mask a batch sequentially, one result per record.
    pub fn mask_all(&self, instances: &[R]) -> Result<Vec<MaskResult>, MaskError> {
        let batch_id = uuid::Uuid::new_v4();
        info!(batch_id = %batch_id, records = instances.len(), "masking batch");
        let results = instances
            .iter()
            .map(|instance| self.mask(instance))
            .collect::<Result<Vec<_>, _>>()?;
        let failed = results.iter().filter(|result| !result.is_success()).count();
        info!(batch_id = %batch_id, failed, "batch masked");
        Ok(results)
    }

    fn apply_rule(
        &self,
        instance: &R,
        property: &PropertyInfo,
        bound: &BoundRule,
    ) -> Result<FieldValue, FieldError> {
        let original = self.accessor.get_value(instance, &property.name)?;
        if original.is_null() {
            return Ok(FieldValue::Null);
        }
        let input = bound.to_rule.as_ref().map_err(Clone::clone)?.apply(original)?;
        let output = bound.rule.apply(input)?;
        Ok(bound.from_rule.as_ref().map_err(Clone::clone)?.apply(output)?)
    }

    fn uncovered(&self, instance: &R, property: &PropertyInfo) -> Result<FieldValue, FieldError> {
        match self.coverage {
            CoverageMode::Include => Ok(self.accessor.get_value(instance, &property.name)?),
            CoverageMode::Exclude => Ok(property.absence_value()),
        }
    }
}

/// Canonical property name for a selector: the exact name first, then a
/// unique ASCII case-insensitive match.
pub fn resolve_selector<R>(accessor: &PropertyAccessor<R>, selector: &str) -> Result<String, MaskError> {
    if accessor.has_property(selector) {
        return Ok(selector.to_string());
    }
    let mut matches = accessor
        .property_names()
        .filter(|name| name.eq_ignore_ascii_case(selector));
    match (matches.next(), matches.next()) {
        (Some(name), None) => Ok(name.to_string()),
        _ => Err(MaskError::UnknownProperty(selector.to_string())),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datamask_core::ValueKind;
    use datamask_rules::text::Redact;
    use serde_json::json;

    fn schema() -> Vec<PropertySchema> {
        vec![
            PropertySchema::new("Email", ValueKind::Text),
            PropertySchema::new("email_verified", ValueKind::Bool),
        ]
    }

    #[test]
    fn selector_falls_back_to_unique_case_insensitive_match() {
        let masker = JsonMasker::for_schema(&schema())
            .bind_rule("email", Redact::default())
            .build()
            .expect("masker");
        assert_eq!(masker.bound_properties().collect::<Vec<_>>(), ["Email"]);
    }

    #[test]
    fn ambiguous_selector_is_unknown() {
        let mut properties = schema();
        properties.push(PropertySchema::new("EMAIL", ValueKind::Text));
        let err = JsonMasker::for_schema(&properties)
            .bind_rule("email", Redact::default())
            .build()
            .expect_err("ambiguous");
        assert!(matches!(err, MaskError::UnknownProperty(ref name) if name == "email"));
    }

    #[test]
    fn fatal_inputs_are_errors() {
        let masker = JsonMasker::for_schema(&schema()).build().expect("masker");
        assert!(matches!(masker.mask_value(&Value::Null), Err(MaskError::NullInstance)));
        assert!(matches!(
            masker.mask_value(&json!([1, 2])),
            Err(MaskError::NotAnObject("array"))
        ));
    }
}
