//! Call budget accounting and efficiency scoring.
//!
//! The [`CallBudgetTracker`] counts recorded calls against one
//! [`BudgetTier`] and walks a monotonic state machine:
//!
//! ```text
//! WithinBudget ──(actual > expected)──▶ OverExpected ──(actual > maximum)──▶ Exceeded
//! ```
//!
//! States never regress within a session. [`CallMetrics`] are derived on
//! demand from the current count and are never stored.
//!
//! Independently of the state machine the tracker keeps per-category
//! counters (reads, writes, searches, their caller-flagged redundant
//! sub-counts, and re-executed duplicates) and a per-tool breakdown, which
//! feed the [`BudgetReport`] and its recommendation.
//!
//! Like the duplicate detector, everything here is a cache over
//! [`SessionState::history`]: [`CallBudgetTracker::sync`] folds in records
//! appended since the last call.

pub mod tier;

use crate::duplicate::canonical::canonical_string;
use crate::session::{SessionState, ToolCallRecord};
use crate::tools::catalog::{ToolCatalog, ToolKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use tracing::{debug, info};

pub use tier::{BudgetTier, TierRegistry};

/// Position in the budget state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BudgetState {
    WithinBudget,
    OverExpected,
    Exceeded,
}

impl fmt::Display for BudgetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BudgetState::WithinBudget => "within budget",
            BudgetState::OverExpected => "over expected",
            BudgetState::Exceeded => "exceeded",
        })
    }
}

/// A change of [`BudgetState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetTransition {
    pub from: BudgetState,
    pub to: BudgetState,
    /// Call count at which the transition happened.
    pub at_call: u32,
}

/// Derived call metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CallMetrics {
    pub expected: u32,
    pub actual: u32,
    /// `actual / expected * 100`. A zero expectation is treated as one call.
    pub efficiency_percent: f64,
    /// `actual > maximum`.
    pub exceeded: bool,
}

/// Structured end-of-run (or mid-run) budget report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetReport {
    pub tier: String,
    pub expected: u32,
    pub maximum: u32,
    pub actual: u32,
    pub efficiency_percent: f64,
    pub state: BudgetState,
    pub file_reads: u32,
    pub redundant_reads: u32,
    pub file_writes: u32,
    pub searches: u32,
    pub redundant_searches: u32,
    pub duplicate_calls: u32,
    pub per_tool: BTreeMap<String, u32>,
    pub recommendation: String,
}

impl fmt::Display for BudgetReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Call budget ({}): {}", self.tier, self.state)?;
        writeln!(
            f,
            "  calls: {} / expected {} / maximum {} ({:.1}% efficiency)",
            self.actual, self.expected, self.maximum, self.efficiency_percent
        )?;
        writeln!(
            f,
            "  reads: {} ({} redundant), writes: {}, searches: {} ({} redundant), duplicates: {}",
            self.file_reads,
            self.redundant_reads,
            self.file_writes,
            self.searches,
            self.redundant_searches,
            self.duplicate_calls
        )?;
        if !self.per_tool.is_empty() {
            writeln!(f, "  per tool:")?;
            for (tool, count) in &self.per_tool {
                writeln!(f, "    {tool}: {count}")?;
            }
        }
        write!(f, "  recommendation: {}", self.recommendation)
    }
}

/// Running call budget for one session.
#[derive(Debug, Clone)]
pub struct CallBudgetTracker {
    tier_name: String,
    tier: BudgetTier,
    state: BudgetState,
    actual: u32,
    file_reads: u32,
    redundant_reads: u32,
    file_writes: u32,
    searches: u32,
    redundant_searches: u32,
    duplicate_calls: u32,
    per_tool: BTreeMap<String, u32>,
    seen_calls: HashSet<(String, String)>,
    synced: usize,
}

impl CallBudgetTracker {
    pub fn new(tier_name: impl Into<String>, tier: BudgetTier) -> Self {
        Self {
            tier_name: tier_name.into(),
            tier,
            state: BudgetState::WithinBudget,
            actual: 0,
            file_reads: 0,
            redundant_reads: 0,
            file_writes: 0,
            searches: 0,
            redundant_searches: 0,
            duplicate_calls: 0,
            per_tool: BTreeMap::new(),
            seen_calls: HashSet::new(),
            synced: 0,
        }
    }

    /// Fold every record appended to `state` since the last sync.
    ///
    /// Returns the state transitions that happened, in order.
    pub fn sync(&mut self, state: &SessionState, catalog: &ToolCatalog) -> Vec<BudgetTransition> {
        let history = state.history();
        let mut transitions = Vec::new();
        for record in history.iter().skip(self.synced) {
            if let Some(t) = self.observe(record, catalog) {
                transitions.push(t);
            }
        }
        self.synced = history.len();
        transitions
    }

    /// Count one call.
    fn observe(
        &mut self,
        record: &ToolCallRecord,
        catalog: &ToolCatalog,
    ) -> Option<BudgetTransition> {
        self.actual += 1;
        *self.per_tool.entry(record.tool.clone()).or_insert(0) += 1;

        match catalog.kind_of(&record.tool) {
            ToolKind::Read => {
                self.file_reads += 1;
                if record.redundant {
                    self.redundant_reads += 1;
                }
            }
            ToolKind::Search => {
                self.searches += 1;
                if record.redundant {
                    self.redundant_searches += 1;
                }
            }
            ToolKind::Edit => self.file_writes += 1,
            _ => {}
        }

        let key = (record.tool.clone(), canonical_string(&record.args));
        if !self.seen_calls.insert(key) {
            self.duplicate_calls += 1;
            debug!(tool = %record.tool, "Duplicate call re-executed");
        }

        self.advance()
    }

    /// Move the state machine forward if the count demands it.
    fn advance(&mut self) -> Option<BudgetTransition> {
        let target = if self.actual > self.tier.maximum_calls {
            BudgetState::Exceeded
        } else if self.actual > self.tier.expected_calls {
            BudgetState::OverExpected
        } else {
            BudgetState::WithinBudget
        };
        if target <= self.state {
            return None;
        }
        let transition = BudgetTransition {
            from: self.state,
            to: target,
            at_call: self.actual,
        };
        self.state = target;
        info!(
            tier = %self.tier_name,
            from = %transition.from,
            to = %transition.to,
            calls = self.actual,
            "Call budget state changed"
        );
        Some(transition)
    }

    pub fn state(&self) -> BudgetState {
        self.state
    }

    pub fn tier(&self) -> BudgetTier {
        self.tier
    }

    pub fn tier_name(&self) -> &str {
        &self.tier_name
    }

    pub fn actual(&self) -> u32 {
        self.actual
    }

    /// Current metrics, computed from the live count.
    pub fn metrics(&self) -> CallMetrics {
        let expected = self.tier.expected_calls;
        CallMetrics {
            expected,
            actual: self.actual,
            efficiency_percent: self.actual as f64 / expected.max(1) as f64 * 100.0,
            exceeded: self.actual > self.tier.maximum_calls,
        }
    }

    /// Redundant operations: flagged reads and searches plus re-executed
    /// duplicates.
    pub fn redundant_operations(&self) -> u32 {
        self.redundant_reads + self.redundant_searches + self.duplicate_calls
    }

    /// Pick the single most useful recommendation, in priority order.
    pub fn recommendation(&self) -> String {
        let expected = self.tier.expected_calls.max(1) as f64;
        if self.redundant_reads > 0 {
            format!(
                "{} redundant file read(s): cache file contents instead of re-reading them.",
                self.redundant_reads
            )
        } else if self.redundant_searches > 0 {
            format!(
                "{} wasted search(es): batch related patterns into a single search.",
                self.redundant_searches
            )
        } else if self.redundant_operations() as f64 / expected > 0.1 {
            format!(
                "Redundant operations are {:.0}% of the expected call count: plan the call sequence before executing.",
                self.redundant_operations() as f64 / expected * 100.0
            )
        } else if self.actual as f64 > 1.2 * expected {
            format!(
                "Used {} calls against {} expected: review the call sequence for unnecessary steps.",
                self.actual, self.tier.expected_calls
            )
        } else {
            "Call performance is good.".to_string()
        }
    }

    pub fn report(&self) -> BudgetReport {
        let metrics = self.metrics();
        BudgetReport {
            tier: self.tier_name.clone(),
            expected: self.tier.expected_calls,
            maximum: self.tier.maximum_calls,
            actual: self.actual,
            efficiency_percent: metrics.efficiency_percent,
            state: self.state,
            file_reads: self.file_reads,
            redundant_reads: self.redundant_reads,
            file_writes: self.file_writes,
            searches: self.searches,
            redundant_searches: self.redundant_searches,
            duplicate_calls: self.duplicate_calls,
            per_tool: self.per_tool.clone(),
            recommendation: self.recommendation(),
        }
    }
}
