//! Replaying a transcript through a governor.

use crate::transcript::TranscriptEntry;
use callguard::budget::BudgetReport;
use callguard::config::GovernorConfig;
use callguard::decision::GovernanceDecision;
use callguard::duplicate::Classification;
use callguard::events::LoggingHandler;
use callguard::governor::Governor;
use serde::Serialize;

/// Replay switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayOptions {
    /// Record exact duplicates too, as if the agent had ignored the cache.
    pub record_duplicates: bool,
}

/// What happened to one transcript entry.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayStep {
    /// 1-based position in the transcript.
    pub index: usize,
    pub tool: String,
    /// `"exact"`, `"near"` or `"novel"`.
    pub classification: &'static str,
    pub advisory: Option<String>,
    /// Whether the entry was appended to history.
    pub recorded: bool,
    pub decision: GovernanceDecision,
}

/// Outcome of a full replay.
#[derive(Debug, Clone, Serialize)]
pub struct ReplaySummary {
    pub steps: Vec<ReplayStep>,
    pub report: BudgetReport,
    pub decision: GovernanceDecision,
    pub state_block: String,
}

impl ReplaySummary {
    pub fn exact_duplicates(&self) -> usize {
        self.steps.iter().filter(|s| s.classification == "exact").count()
    }

    pub fn near_duplicates(&self) -> usize {
        self.steps.iter().filter(|s| s.classification == "near").count()
    }

    /// Human-readable rendering.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for step in &self.steps {
            out.push_str(&format!("#{:<3} {:<24} {}", step.index, step.tool, step.classification));
            if !step.recorded {
                out.push_str(" (not recorded)");
            }
            out.push('\n');
            if let Some(advisory) = &step.advisory {
                out.push_str(&format!("     {advisory}\n"));
            }
            if let Some(message) = step.decision.message() {
                for line in message.lines() {
                    out.push_str(&format!("     {}: {line}\n", decision_label(&step.decision)));
                }
            }
        }
        out.push_str(&format!(
            "\n{} exact duplicate(s), {} near duplicate(s)\n\n",
            self.exact_duplicates(),
            self.near_duplicates()
        ));
        out.push_str(&format!("{}\n\n", self.report));
        out.push_str(&self.state_block);
        out
    }
}

fn decision_label(decision: &GovernanceDecision) -> &'static str {
    match decision {
        GovernanceDecision::Continue => "ok",
        GovernanceDecision::Warn(_) => "warn",
        GovernanceDecision::Halt(_) => "halt",
    }
}

/// Run every entry through a fresh governor built from `config`.
pub fn replay(
    entries: Vec<TranscriptEntry>,
    config: GovernorConfig,
    options: ReplayOptions,
) -> ReplaySummary {
    let mut governor = Governor::new(config).with_event_handler(LoggingHandler);
    let mut steps = Vec::with_capacity(entries.len());

    for (i, entry) in entries.into_iter().enumerate() {
        let classification = governor.propose_call(&entry.tool, &entry.args);
        let advisory = match &classification {
            Classification::Near { message, .. } => Some(message.clone()),
            Classification::Exact { prior_calls, .. } => {
                Some(format!("identical to {prior_calls} earlier call(s); cached result reused"))
            }
            Classification::Novel => None,
        };
        let recorded = !classification.is_exact() || options.record_duplicates;
        let tool = entry.tool.clone();
        let decision = if recorded {
            governor.record_tool_call(entry.into_record())
        } else {
            governor.decision().clone()
        };
        steps.push(ReplayStep {
            index: i + 1,
            tool,
            classification: classification.label(),
            advisory,
            recorded,
            decision,
        });
    }

    ReplaySummary {
        steps,
        report: governor.report(),
        decision: governor.decision().clone(),
        state_block: governor.render_state_block(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::parse;

    fn entries() -> Vec<TranscriptEntry> {
        parse(
            r#"[
                {"tool": "fork_repository", "args": {"owner": "acme", "repo": "widget"}},
                {"tool": "fork_repository", "args": {"owner": "acme", "repo": "widget", "organization": "me"}},
                {"tool": "search_code", "args": {"owner": "acme", "repo": "widget", "pattern": "TODO"},
                 "result": {"total_count": 1, "items": [{"path": "src/lib.rs"}]}},
                {"tool": "search_code", "args": {"repo": "widget", "owner": "acme", "pattern": "TODO"}}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn classifies_each_step() {
        let summary = replay(entries(), GovernorConfig::default(), ReplayOptions::default());
        let labels: Vec<&str> = summary.steps.iter().map(|s| s.classification).collect();
        assert_eq!(labels, vec!["novel", "near", "novel", "exact"]);
        assert!(!summary.steps[3].recorded);
        assert_eq!(summary.report.actual, 3);
        assert_eq!(summary.exact_duplicates(), 1);
        assert_eq!(summary.near_duplicates(), 1);
        assert!(summary.state_block.contains("acme/widget"));
    }

    #[test]
    fn record_duplicates_counts_them() {
        let summary = replay(
            entries(),
            GovernorConfig::default(),
            ReplayOptions {
                record_duplicates: true,
            },
        );
        assert!(summary.steps[3].recorded);
        assert_eq!(summary.report.actual, 4);
        assert_eq!(summary.report.duplicate_calls, 1);
    }

    #[test]
    fn text_rendering_lists_steps_and_report() {
        let summary = replay(entries(), GovernorConfig::default(), ReplayOptions::default());
        let text = summary.to_text();
        assert!(text.contains("#4"));
        assert!(text.contains("(not recorded)"));
        assert!(text.contains("1 exact duplicate(s)"));
        assert!(text.contains(" near duplicate(s)\n\nCall budget (pr_with_changes)"));
        assert!(text.contains("[Session state"));
    }

    #[test]
    fn summary_serializes() {
        let summary = replay(entries(), GovernorConfig::default(), ReplayOptions::default());
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["steps"][3]["classification"], "exact");
        assert_eq!(json["decision"]["decision"], "continue");
    }
}
