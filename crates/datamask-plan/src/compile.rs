use std::sync::Arc;

use datamask_core::{PropertyAccessor, TypeConverterRegistry};
use datamask_engine::{JsonMasker, MaskError, MaskerBuilder, resolve_selector};
use datamask_rules::{AnyComposer, RuleCatalog, RuleError};
use tracing::{debug, info};

use crate::errors::{PlanError, Result};
use crate::model::{Binding, MaskPlan};
use crate::validate::validate_plan_semantics;

/// Compile a plan into a reusable masker using the process-wide converters.
pub fn compile_plan(plan: &MaskPlan, catalog: &RuleCatalog) -> Result<JsonMasker> {
    compile_plan_with(plan, catalog, TypeConverterRegistry::global())
}

/// Compile a plan with an explicit converter registry.
///
/// The plan is validated first; any error-level issue aborts with
/// [`PlanError::Invalid`].
pub fn compile_plan_with(
    plan: &MaskPlan,
    catalog: &RuleCatalog,
    converters: Arc<TypeConverterRegistry>,
) -> Result<JsonMasker> {
    let report = validate_plan_semantics(plan, catalog, &converters);
    if !report.is_ok() {
        return Err(PlanError::Invalid(report));
    }

    let accessor = Arc::new(PropertyAccessor::for_schema(&plan.properties));
    let mut builder = MaskerBuilder::new(Arc::clone(&accessor))
        .coverage(plan.coverage)
        .converters(converters);

    for binding in &plan.bindings {
        let name = resolve_selector(&accessor, &binding.property)?;
        let composer = compose_binding(plan, binding, &name, catalog)?;
        debug!(property = %name, rules = composer.len(), kind = %composer.kind(), "binding compiled");
        builder = builder.bind(name, composer.build());
    }

    let masker = builder.build()?;
    info!(
        properties = plan.properties.len(),
        bindings = plan.bindings.len(),
        coverage = %plan.coverage,
        "plan compiled"
    );
    Ok(masker)
}

fn compose_binding(
    plan: &MaskPlan,
    binding: &Binding,
    name: &str,
    catalog: &RuleCatalog,
) -> Result<AnyComposer> {
    let property = plan
        .property(name)
        .ok_or_else(|| MaskError::UnknownProperty(name.to_string()))?;
    let first = binding
        .rules
        .first()
        .ok_or_else(|| RuleError::InvalidArgument(format!("binding for '{name}' has no rules")))?;
    let kind = catalog.resolve_kind(&first.id, Some(property.kind))?;
    let mut composer = AnyComposer::new(kind).ok_or_else(|| {
        RuleError::InvalidArgument(format!("rules cannot operate on {kind} values"))
    })?;

    for spec in &binding.rules {
        if let Some(seed) = spec.seed {
            composer.try_with_seed(seed.map(|seed| seed.choice(plan.seed)))?;
        }
        let rule = catalog.create(&spec.id, spec.params.as_ref(), Some(kind))?;
        composer.add(rule)?;
    }
    Ok(composer)
}
