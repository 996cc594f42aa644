//! Duplicate-call detection.
//!
//! Before a side-effecting tool runs, the [`DuplicateDetector`] compares the
//! proposed call against the session history and returns a
//! [`Classification`]:
//!
//! - **Exact**: the same tool was already called with byte-identical
//!   canonical arguments. The first stored result is returned and the caller
//!   must skip execution. Records written by the session's domain
//!   recorders carry no real result and are never replayed.
//! - **Near**: a tool-family rule judged an earlier call similar enough to
//!   be worth a warning. Execution is still allowed.
//! - **Novel**: nothing similar has been seen.
//!
//! The detector owns only a lookup index. The index is synchronized
//! incrementally from [`SessionState::history`] and can be rebuilt from it
//! at any time, so history stays the single source of truth.
//!
//! # Submodules
//!
//! - [`canonical`]: key-order-independent argument serialization.
//! - [`similarity`]: Levenshtein similarity.
//! - [`rules`]: [`SimilarityRegistry`](rules::SimilarityRegistry) of
//!   per-family near-duplicate rules.

pub mod canonical;
pub mod rules;
pub mod similarity;

use crate::session::SessionState;
use crate::tools::catalog::ToolCatalog;
use canonical::canonical_string;
use chrono::{DateTime, Utc};
use rules::{RuleContext, SimilarityRegistry};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Result of classifying a proposed call.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// Identical to an earlier call.
    Exact {
        /// Result of the *first* identical call.
        result: Value,
        /// How many identical calls are already in history.
        prior_calls: usize,
        /// History position of the call whose result is returned.
        index: usize,
    },
    /// Similar to an earlier call under a family rule.
    Near {
        /// Advisory text for the agent.
        message: String,
        /// How many similar calls are already in history.
        prior_calls: usize,
        /// History position of the first similar call.
        index: usize,
    },
    /// Nothing similar in history.
    Novel,
}

impl Classification {
    /// Short label: `"exact"`, `"near"`, or `"novel"`.
    pub fn label(&self) -> &'static str {
        match self {
            Classification::Exact { .. } => "exact",
            Classification::Near { .. } => "near",
            Classification::Novel => "novel",
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, Classification::Exact { .. })
    }

    pub fn is_near(&self) -> bool {
        matches!(self, Classification::Near { .. })
    }

    pub fn is_novel(&self) -> bool {
        matches!(self, Classification::Novel)
    }
}

#[derive(Debug, Clone)]
struct IndexEntry {
    first: usize,
    first_success: Option<usize>,
    count: usize,
}

/// Exact and near duplicate detector for one session.
///
/// Handing it a history that does not extend the one it last indexed (a
/// different session) discards the index and rebuilds it.
#[derive(Debug, Clone)]
pub struct DuplicateDetector {
    registry: SimilarityRegistry,
    context: RuleContext,
    replay_failed_calls: bool,
    index: HashMap<(String, String), IndexEntry>,
    synced: usize,
    /// Tool and timestamp of the last indexed record.
    last_synced: Option<(String, DateTime<Utc>)>,
}

impl DuplicateDetector {
    /// Create a detector using `registry` for near-duplicate rules.
    pub fn new(registry: SimilarityRegistry, context: RuleContext) -> Self {
        Self {
            registry,
            context,
            replay_failed_calls: true,
            index: HashMap::new(),
            synced: 0,
            last_synced: None,
        }
    }

    /// Whether an identical earlier call that *failed* still counts as an
    /// exact duplicate. Default: `true`.
    pub fn with_replay_failed_calls(mut self, replay: bool) -> Self {
        self.replay_failed_calls = replay;
        self
    }

    pub fn registry(&self) -> &SimilarityRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut SimilarityRegistry {
        &mut self.registry
    }

    /// Classify a proposed `tool(args)` call against `state`'s history.
    ///
    /// Classification never changes history, so asking twice without
    /// recording in between gives the same answer.
    pub fn classify(
        &mut self,
        state: &SessionState,
        catalog: &ToolCatalog,
        tool: &str,
        args: &Value,
    ) -> Classification {
        self.sync(state);
        let history = state.history();

        let key = (tool.to_string(), canonical_string(args));
        if let Some(entry) = self.index.get(&key) {
            let index = if self.replay_failed_calls {
                Some(entry.first)
            } else {
                entry.first_success
            };
            if let Some(index) = index {
                debug!(tool, prior_calls = entry.count, "exact duplicate call");
                return Classification::Exact {
                    result: history[index].result.clone(),
                    prior_calls: entry.count,
                    index,
                };
            }
        }

        let Some(family) = self.registry.family_tag(tool, catalog) else {
            trace!(tool, "no near-duplicate rule for tool");
            return Classification::Novel;
        };
        let Some(rule) = self.registry.rule(family) else {
            return Classification::Novel;
        };

        let mut first: Option<(usize, String)> = None;
        let mut prior_calls = 0;
        for (i, record) in history.iter().enumerate() {
            if self.registry.family_tag(&record.tool, catalog) != Some(family) {
                continue;
            }
            if let Some(detail) = rule(args, &record.args, &self.context) {
                prior_calls += 1;
                if first.is_none() {
                    first = Some((i, detail));
                }
            }
        }

        match first {
            Some((index, detail)) => {
                let message = near_message(tool, &history[index].tool, &detail, prior_calls);
                debug!(tool, family, prior_calls, "near-duplicate call");
                Classification::Near {
                    message,
                    prior_calls,
                    index,
                }
            }
            None => Classification::Novel,
        }
    }

    /// Discard the index and rebuild it from `state`'s history.
    pub fn rebuild(&mut self, state: &SessionState) {
        self.index.clear();
        self.synced = 0;
        self.sync(state);
    }

    /// Index any history records appended since the last sync.
    fn sync(&mut self, state: &SessionState) {
        let history = state.history();
        let extends_indexed = match (&self.last_synced, self.synced.checked_sub(1)) {
            (Some((tool, at)), Some(last)) => history
                .get(last)
                .is_some_and(|r| &r.tool == tool && r.timestamp == *at),
            _ => true,
        };
        if !extends_indexed {
            debug!("history does not extend the indexed one, rebuilding");
            self.index.clear();
            self.synced = 0;
        }
        for (i, record) in history.iter().enumerate().skip(self.synced) {
            if record.synthetic {
                continue;
            }
            let key = (record.tool.clone(), canonical_string(&record.args));
            let entry = self.index.entry(key).or_insert(IndexEntry {
                first: i,
                first_success: None,
                count: 0,
            });
            entry.count += 1;
            if record.success && entry.first_success.is_none() {
                entry.first_success = Some(i);
            }
        }
        self.synced = history.len();
        self.last_synced = history.last().map(|r| (r.tool.clone(), r.timestamp));
    }
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self::new(SimilarityRegistry::with_defaults(), RuleContext::default())
    }
}

fn near_message(tool: &str, prior_tool: &str, detail: &str, prior_calls: usize) -> String {
    let mut message = format!(
        "Possible duplicate: {tool} looks like an earlier {prior_tool} call ({detail}). \
         Reuse the earlier result instead of repeating the call."
    );
    if prior_calls > 1 {
        message.push_str(&format!(" {prior_calls} similar calls already made."));
    }
    message
}
