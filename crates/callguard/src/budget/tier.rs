//! Budget tiers: the acceptable cost envelope for a class of task.
//!
//! The four built-in presets are illustrative. [`TierRegistry`] accepts any
//! number of additional tiers from configuration, and the tracker only ever
//! sees a resolved [`BudgetTier`], so adding one never touches tracker code.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

pub const SIMPLE_REPLACE: &str = "simple_replace";
pub const PR_WITH_CHANGES: &str = "pr_with_changes";
pub const COMPLEX_REFACTOR: &str = "complex_refactor";
pub const LARGE_REFACTOR: &str = "large_refactor";

/// Tier used when a requested name is unknown.
pub const DEFAULT_TIER: &str = PR_WITH_CHANGES;

/// Expected and maximum call counts for one class of task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetTier {
    /// Calls a well-planned run should need.
    pub expected_calls: u32,
    /// Calls after which the run is over budget.
    pub maximum_calls: u32,
}

impl BudgetTier {
    pub const fn new(expected_calls: u32, maximum_calls: u32) -> Self {
        Self {
            expected_calls,
            maximum_calls,
        }
    }
}

/// Named tiers, built-ins plus anything added from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TierRegistry {
    tiers: BTreeMap<String, BudgetTier>,
}

impl TierRegistry {
    /// Registry with only the built-in presets.
    pub fn builtin() -> Self {
        let mut tiers = BTreeMap::new();
        tiers.insert(SIMPLE_REPLACE.to_string(), BudgetTier::new(4, 6));
        tiers.insert(PR_WITH_CHANGES.to_string(), BudgetTier::new(8, 12));
        tiers.insert(COMPLEX_REFACTOR.to_string(), BudgetTier::new(15, 22));
        tiers.insert(LARGE_REFACTOR.to_string(), BudgetTier::new(25, 35));
        Self { tiers }
    }

    /// Add or replace a tier.
    pub fn insert(&mut self, name: impl Into<String>, tier: BudgetTier) {
        self.tiers.insert(name.into(), tier);
    }

    /// Add or replace a tier (builder pattern).
    pub fn with(mut self, name: impl Into<String>, tier: BudgetTier) -> Self {
        self.insert(name, tier);
        self
    }

    /// Merge `other` into this registry. Entries in `other` win.
    pub fn extend(&mut self, other: &TierRegistry) {
        for (name, tier) in &other.tiers {
            self.tiers.insert(name.clone(), *tier);
        }
    }

    pub fn get(&self, name: &str) -> Option<BudgetTier> {
        self.tiers.get(name).copied()
    }

    /// Look up `name`, falling back to [`DEFAULT_TIER`] with a warning.
    pub fn resolve(&self, name: &str) -> BudgetTier {
        if let Some(tier) = self.get(name) {
            return tier;
        }
        warn!(tier = name, fallback = DEFAULT_TIER, "Unknown budget tier");
        self.get(DEFAULT_TIER).unwrap_or(BudgetTier::new(8, 12))
    }

    /// All tiers, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, BudgetTier)> {
        self.tiers.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl Default for TierRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
