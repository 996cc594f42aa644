//! The governor: one session's state plus every detector, behind the two
//! calls the agent loop makes.
//!
//! ```text
//! propose_call(tool, args) ──▶ Exact(result) | Near(advisory) | Novel
//!         │ (caller executes unless Exact)
//!         ▼
//! record_completed_call(tool, args, result, success) ──▶ GovernanceDecision
//! ```
//!
//! Recording appends the call to history, folds any domain fact it
//! established into the session, advances the budget, re-runs pattern
//! detection, and combines the results into a single
//! [`GovernanceDecision`].
//!
//! Recording never fails and never refuses a call, even after a halt.
//! Enforcement belongs to the caller (see
//! [`GovernedExecutor`](crate::executor::GovernedExecutor) for one that
//! enforces).
//!
//! [`SharedGovernor`] wraps a governor in `Arc<Mutex<_>>` for callers that
//! execute tools concurrently but must still record them one at a time.

use crate::budget::{BudgetReport, BudgetState, CallBudgetTracker, CallMetrics};
use crate::config::GovernorConfig;
use crate::decision::GovernanceDecision;
use crate::duplicate::rules::SimilarityRegistry;
use crate::duplicate::{Classification, DuplicateDetector};
use crate::events::{EventHandler, GovernanceEvent, NoopHandler};
use crate::patterns::InefficiencyDetector;
use crate::session::{RepoRef, SessionState, ToolCallRecord, effects};
use crate::synthesis::StateAwarenessSynthesizer;
use crate::tools::catalog::ToolCatalog;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Governs one agent session.
pub struct Governor {
    state: SessionState,
    catalog: ToolCatalog,
    detector: DuplicateDetector,
    budget: CallBudgetTracker,
    patterns: InefficiencyDetector,
    synthesizer: StateAwarenessSynthesizer,
    default_branch: String,
    decision: GovernanceDecision,
    handler: Arc<dyn EventHandler>,
}

impl Governor {
    pub fn new(config: GovernorConfig) -> Self {
        let detector =
            DuplicateDetector::new(SimilarityRegistry::with_defaults(), config.rule_context())
                .with_replay_failed_calls(config.replay_failed_calls);
        let patterns = InefficiencyDetector::new(config.patterns.clone())
            .with_default_branch(config.default_branch.clone());
        Self {
            state: SessionState::new(),
            catalog: config.catalog(),
            detector,
            budget: CallBudgetTracker::new(config.tier.clone(), config.budget_tier()),
            patterns,
            synthesizer: StateAwarenessSynthesizer::default(),
            default_branch: config.default_branch,
            decision: GovernanceDecision::Continue,
            handler: Arc::new(NoopHandler),
        }
    }

    pub fn with_event_handler(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handler = Arc::new(handler);
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: StateAwarenessSynthesizer) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    /// Near-duplicate rules, for registering new tool families.
    pub fn similarity_registry_mut(&mut self) -> &mut SimilarityRegistry {
        self.detector.registry_mut()
    }

    // ── Proposing ──────────────────────────────────────────────────

    /// Classify a call before executing it. Never changes the session.
    pub fn propose_call(&mut self, tool: &str, args: &Value) -> Classification {
        let classification = self.detector.classify(&self.state, &self.catalog, tool, args);
        self.handler.on_event(&GovernanceEvent::CallProposed {
            tool,
            args,
            classification: classification.label(),
        });
        match &classification {
            Classification::Exact { prior_calls, .. } => {
                self.handler.on_event(&GovernanceEvent::ExactReplay {
                    tool,
                    prior_calls: *prior_calls,
                });
            }
            Classification::Near { message, .. } => {
                self.handler
                    .on_event(&GovernanceEvent::NearDuplicate { tool, message });
            }
            Classification::Novel => {}
        }
        classification
    }

    // ── Recording ──────────────────────────────────────────────────

    /// Record a call the caller actually executed.
    pub fn record_completed_call(
        &mut self,
        tool: &str,
        args: Value,
        result: Value,
        success: bool,
    ) -> GovernanceDecision {
        self.record_tool_call(ToolCallRecord::new(tool, args, result, success))
    }

    /// Record an executed call the caller already knows was redundant.
    pub fn record_flagged_call(
        &mut self,
        tool: &str,
        args: Value,
        result: Value,
        success: bool,
        redundant: bool,
    ) -> GovernanceDecision {
        self.record_tool_call(
            ToolCallRecord::new(tool, args, result, success).with_redundant(redundant),
        )
    }

    /// Record a prepared record.
    pub fn record_tool_call(&mut self, record: ToolCallRecord) -> GovernanceDecision {
        let facts = effects::extract(&record, &self.catalog, &self.default_branch);
        self.state.record_tool_call(record);
        for fact in facts {
            self.state.apply(fact);
        }
        self.after_record()
    }

    pub fn record_fork(&mut self, owner: &str, repo: &str) -> GovernanceDecision {
        self.state.record_fork(owner, repo);
        self.after_record()
    }

    pub fn record_branch(
        &mut self,
        repo: &RepoRef,
        name: &str,
        base_branch: &str,
    ) -> GovernanceDecision {
        self.state.record_branch(repo, name, base_branch);
        self.after_record()
    }

    pub fn record_file_modification(&mut self, path: &str, content: &str) -> GovernanceDecision {
        self.state.record_file_modification(path, content);
        self.after_record()
    }

    pub fn record_search(
        &mut self,
        pattern: &str,
        total_matches: u64,
        files: Vec<String>,
    ) -> GovernanceDecision {
        self.state.record_search(pattern, total_matches, files);
        self.after_record()
    }

    pub fn record_pull_request(&mut self, number: u64, url: &str) -> GovernanceDecision {
        self.state.record_pull_request(number, url);
        self.after_record()
    }

    /// Re-score the session after one record was appended.
    fn after_record(&mut self) -> GovernanceDecision {
        if let Some(last) = self.state.history().last() {
            self.handler.on_event(&GovernanceEvent::CallRecorded {
                tool: &last.tool,
                success: last.success,
                redundant: last.redundant,
                total_calls: self.state.call_count(),
            });
        }

        for transition in self.budget.sync(&self.state, &self.catalog) {
            self.handler
                .on_event(&GovernanceEvent::BudgetTransition(&transition));
        }

        let analysis = self.patterns.analyze(&self.state, &self.catalog);
        for warning in &analysis.warnings {
            if analysis.first_seen.contains(&warning.kind) {
                self.handler.on_event(&GovernanceEvent::PatternWarning(warning));
            }
        }

        let decision = GovernanceDecision::from_signals(&analysis, self.budget_advisory());
        if let GovernanceDecision::Halt(reason) = &decision
            && !self.decision.is_halt()
        {
            self.handler.on_event(&GovernanceEvent::Halt { reason });
        }
        debug!(calls = self.state.call_count(), decision = %decision, "Call recorded");
        self.decision = decision.clone();
        decision
    }

    /// Advisory attached to every decision while the budget is exceeded.
    fn budget_advisory(&self) -> Option<String> {
        (self.budget.state() == BudgetState::Exceeded).then(|| {
            let tier = self.budget.tier();
            format!(
                "Call budget exceeded: {} calls against a maximum of {} for {}. {}",
                self.budget.actual(),
                tier.maximum_calls,
                self.budget.tier_name(),
                self.budget.recommendation()
            )
        })
    }

    // ── Reading ────────────────────────────────────────────────────

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    pub fn metrics(&self) -> CallMetrics {
        self.budget.metrics()
    }

    pub fn budget_state(&self) -> BudgetState {
        self.budget.state()
    }

    pub fn report(&self) -> BudgetReport {
        self.budget.report()
    }

    /// Decision produced by the most recent recording.
    pub fn decision(&self) -> &GovernanceDecision {
        &self.decision
    }

    pub fn should_continue(&self) -> bool {
        self.decision.should_continue()
    }

    /// Whether `tool` is a decisive action (edit, commit, pull request).
    pub fn is_terminal(&self, tool: &str) -> bool {
        self.catalog.is_terminal(tool)
    }

    /// State-awareness text block for the prompt.
    pub fn render_state_block(&self) -> String {
        self.synthesizer
            .render(&self.state, &self.budget.metrics(), &self.decision)
    }
}

impl Default for Governor {
    fn default() -> Self {
        Self::new(GovernorConfig::default())
    }
}

/// A [`Governor`] shared between tasks. Every operation takes the lock, so
/// proposals and recordings form one total order.
#[derive(Clone)]
pub struct SharedGovernor {
    inner: Arc<Mutex<Governor>>,
}

impl SharedGovernor {
    pub fn new(governor: Governor) -> Self {
        Self {
            inner: Arc::new(Mutex::new(governor)),
        }
    }

    /// Lock for a sequence of operations that must not interleave.
    pub fn lock(&self) -> MutexGuard<'_, Governor> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn propose_call(&self, tool: &str, args: &Value) -> Classification {
        self.lock().propose_call(tool, args)
    }

    pub fn record_completed_call(
        &self,
        tool: &str,
        args: Value,
        result: Value,
        success: bool,
    ) -> GovernanceDecision {
        self.lock().record_completed_call(tool, args, result, success)
    }

    pub fn decision(&self) -> GovernanceDecision {
        self.lock().decision().clone()
    }

    pub fn metrics(&self) -> CallMetrics {
        self.lock().metrics()
    }

    pub fn report(&self) -> BudgetReport {
        self.lock().report()
    }

    pub fn render_state_block(&self) -> String {
        self.lock().render_state_block()
    }
}

impl From<Governor> for SharedGovernor {
    fn from(governor: Governor) -> Self {
        Self::new(governor)
    }
}
