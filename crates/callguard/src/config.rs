//! Configuration for a [`Governor`](crate::governor::Governor).
//!
//! Every field has a default, so an empty JSON object is a valid config:
//!
//! ```
//! use callguard::config::GovernorConfig;
//!
//! let config = GovernorConfig::from_json(r#"{
//!     "tier": "docs_only",
//!     "tiers": { "docs_only": { "expected_calls": 2, "maximum_calls": 3 } },
//!     "patterns": { "hard_ceiling": 20 },
//!     "tools": { "grep": "search" }
//! }"#).unwrap();
//! assert_eq!(config.budget_tier().maximum_calls, 3);
//! assert_eq!(config.patterns.hard_ceiling, 20);
//! ```
//!
//! `tiers` and `tools` are merged onto the built-in tiers and tool catalog,
//! so a config only lists what it adds or overrides.

use crate::budget::tier::{DEFAULT_TIER, TierRegistry};
use crate::budget::BudgetTier;
use crate::duplicate::rules::RuleContext;
use crate::patterns::PatternConfig;
use crate::tools::catalog::ToolCatalog;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Governor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernorConfig {
    /// Budget tier name. Default: `"pr_with_changes"`.
    pub tier: String,
    /// Extra or overriding tiers.
    pub tiers: TierRegistry,
    pub patterns: PatternConfig,
    /// Search-pattern similarity above which calls are near-duplicates.
    pub similarity_threshold: f64,
    /// Branch assumed when a call omits one.
    pub default_branch: String,
    /// Whether failed earlier calls still answer exact duplicates.
    pub replay_failed_calls: bool,
    /// Extra or overriding tool kinds.
    pub tools: ToolCatalog,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            tier: DEFAULT_TIER.to_string(),
            tiers: TierRegistry::builtin(),
            patterns: PatternConfig::default(),
            similarity_threshold: 0.9,
            default_branch: "main".to_string(),
            replay_failed_calls: true,
            tools: ToolCatalog::default(),
        }
    }
}

impl GovernorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read config {}: {e}", path.display()))?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<Self, String> {
        let config: Self =
            serde_json::from_str(data).map_err(|e| format!("failed to parse config: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no detector can work with.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(format!(
                "similarity_threshold must be within 0.0..=1.0, got {}",
                self.similarity_threshold
            ));
        }
        if self.patterns.repeated_read_ratio < 1.0 {
            return Err(format!(
                "patterns.repeated_read_ratio must be at least 1.0, got {}",
                self.patterns.repeated_read_ratio
            ));
        }
        for (name, tier) in self.tiers.iter() {
            if tier.maximum_calls < tier.expected_calls {
                return Err(format!(
                    "tier {name}: maximum_calls ({}) is below expected_calls ({})",
                    tier.maximum_calls, tier.expected_calls
                ));
            }
        }
        Ok(())
    }

    pub fn with_tier(mut self, tier: impl Into<String>) -> Self {
        self.tier = tier.into();
        self
    }

    /// Register a custom tier and select it.
    pub fn with_custom_tier(mut self, name: impl Into<String>, tier: BudgetTier) -> Self {
        let name = name.into();
        self.tiers.insert(name.clone(), tier);
        self.tier = name;
        self
    }

    pub fn with_patterns(mut self, patterns: PatternConfig) -> Self {
        self.patterns = patterns;
        self
    }

    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn with_default_branch(mut self, branch: impl Into<String>) -> Self {
        self.default_branch = branch.into();
        self
    }

    pub fn with_replay_failed_calls(mut self, replay: bool) -> Self {
        self.replay_failed_calls = replay;
        self
    }

    pub fn with_tools(mut self, tools: ToolCatalog) -> Self {
        self.tools = tools;
        self
    }

    /// Built-in tiers with the configured ones merged on top.
    pub fn tier_registry(&self) -> TierRegistry {
        let mut registry = TierRegistry::builtin();
        registry.extend(&self.tiers);
        registry
    }

    /// The selected tier, falling back to the default tier if unknown.
    pub fn budget_tier(&self) -> BudgetTier {
        self.tier_registry().resolve(&self.tier)
    }

    /// Default catalog with the configured tools merged on top.
    pub fn catalog(&self) -> ToolCatalog {
        let mut catalog = ToolCatalog::default();
        catalog.extend(&self.tools);
        catalog
    }

    pub fn rule_context(&self) -> RuleContext {
        RuleContext {
            threshold: self.similarity_threshold,
            default_branch: self.default_branch.clone(),
        }
    }
}
