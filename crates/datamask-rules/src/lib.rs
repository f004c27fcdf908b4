//! Masking rules for datamask.
//!
//! Rules are typed over the value kind they transform (`MaskRule<String>`,
//! `MaskRule<i64>`, ...). A `RuleComposer` chains rules of one kind and hands
//! a pending seed to the next seed-aware rule; `AnyRule` erases the kind into
//! a closed set of tagged variants so the engine can bind rules to properties.
//! The `RuleCatalog` exposes the built-in leaf rules by stable id.

pub mod catalog;
pub mod compose;
pub mod date;
pub mod errors;
pub mod numeric;
pub mod params;
pub mod rule;
pub mod seed;
pub mod text;

pub use catalog::{AnyComposer, CatalogRule, RuleCatalog, RuleDescriptor};
pub use compose::{RuleChain, RuleComposer};
pub use errors::RuleError;
pub use rule::{AnyRule, MaskRule, RuleValue, SeededRule};
pub use seed::{SeedChoice, SeedProvider, hash_seed};
