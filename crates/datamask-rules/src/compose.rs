use std::fmt;
use std::sync::Arc;

use crate::errors::RuleError;
use crate::rule::{AnyRule, MaskRule, RuleValue};
use crate::seed::SeedProvider;

/// Immutable, ordered sequence of rules of one kind.
///
/// Applying the chain pipes the value through every rule in order.
pub struct RuleChain<T> {
    rules: Arc<[Arc<dyn MaskRule<T>>]>,
}

impl<T> Clone for RuleChain<T> {
    fn clone(&self) -> Self {
        Self {
            rules: Arc::clone(&self.rules),
        }
    }
}

impl<T> fmt::Debug for RuleChain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.rules.iter().map(|rule| rule.id()))
            .finish()
    }
}

impl<T> RuleChain<T> {
    pub fn rules(&self) -> &[Arc<dyn MaskRule<T>>] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<T> MaskRule<T> for RuleChain<T> {
    fn id(&self) -> &'static str {
        match self.rules.as_ref() {
            [single] => single.id(),
            _ => "chain",
        }
    }

    fn apply(&self, input: T) -> Result<T, RuleError> {
        self.rules
            .iter()
            .try_fold(input, |value, rule| rule.apply(value))
    }
}

impl<T: RuleValue> From<RuleChain<T>> for AnyRule {
    fn from(chain: RuleChain<T>) -> Self {
        AnyRule::new(chain)
    }
}

/// Chainable builder of rules of one kind, with a single pending seed slot.
///
/// The pending seed is consumed by the next seed-aware rule added and by
/// nothing else: plain rules leave it in place, and a second seed replaces
/// the first before it is consumed.
pub struct RuleComposer<T> {
    rules: Vec<Arc<dyn MaskRule<T>>>,
    pending_seed: Option<SeedProvider<T>>,
}

impl<T> Default for RuleComposer<T> {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            pending_seed: None,
        }
    }
}

impl<T> fmt::Debug for RuleComposer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleComposer")
            .field("rules", &self.rules.iter().map(|rule| rule.id()).collect::<Vec<_>>())
            .field("pending_seed", &self.pending_seed.is_some())
            .finish()
    }
}

impl<T: 'static> RuleComposer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pending seed that yields the same value for every input.
    pub fn with_random_seed(&mut self, seed: i64) -> &mut Self {
        self.with_seed_provider(SeedProvider::fixed(seed))
    }

    /// Pending seed derived from each input value.
    pub fn with_seed_fn(&mut self, derive: impl Fn(&T) -> i64 + Send + Sync + 'static) -> &mut Self {
        self.with_seed_provider(SeedProvider::from_fn(derive))
    }

    pub fn with_seed_provider(&mut self, provider: SeedProvider<T>) -> &mut Self {
        self.pending_seed = Some(provider);
        self
    }

    /// Like [`with_seed_provider`](Self::with_seed_provider), for seed sources
    /// that may be missing (e.g. read from configuration).
    pub fn try_with_seed_provider(
        &mut self,
        provider: Option<SeedProvider<T>>,
    ) -> Result<&mut Self, RuleError> {
        let provider = provider.ok_or_else(|| {
            RuleError::InvalidArgument("seed source must not be null".to_string())
        })?;
        Ok(self.with_seed_provider(provider))
    }

    pub fn has_pending_seed(&self) -> bool {
        self.pending_seed.is_some()
    }

    /// Append a rule. A seed-aware rule takes the pending seed, if any.
    pub fn add_rule(&mut self, mut rule: impl MaskRule<T> + 'static) -> &mut Self {
        if let Some(seeded) = rule.as_seeded_mut()
            && let Some(provider) = self.pending_seed.take()
        {
            seeded.set_seed_provider(Some(provider));
        }
        self.rules.push(Arc::new(rule));
        self
    }

    /// Snapshot of the rules added so far. Later additions do not affect
    /// snapshots already taken.
    pub fn build(&self) -> RuleChain<T> {
        RuleChain {
            rules: self.rules.iter().cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::{Redact, Truncate};

    #[test]
    fn chain_pipes_rules_in_order() {
        let chain = RuleComposer::<String>::new()
            .add_rule(Truncate::new(3))
            .add_rule(Redact::with_replacement("<hidden>"))
            .build();
        assert_eq!(chain.apply("secret".to_string()), Ok("<hidden>".to_string()));

        let chain = RuleComposer::<String>::new()
            .add_rule(Redact::with_replacement("abcdef"))
            .add_rule(Truncate::new(2))
            .build();
        assert_eq!(chain.apply("secret".to_string()), Ok("ab".to_string()));
    }

    #[test]
    fn empty_chain_is_identity() {
        let chain = RuleComposer::<String>::new().build();
        assert!(chain.is_empty());
        assert_eq!(chain.apply("same".to_string()), Ok("same".to_string()));
    }

    #[test]
    fn missing_seed_source_is_invalid_argument() {
        let mut composer = RuleComposer::<String>::new();
        let err = composer.try_with_seed_provider(None).expect_err("null seed");
        assert!(matches!(err, RuleError::InvalidArgument(_)));
        assert!(!composer.has_pending_seed());
    }
}
