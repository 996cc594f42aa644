//! Renders session state and governance signals as a plain-text block for
//! the prompt.
//!
//! The block restates what the agent has already done (forks, branch,
//! files, searches, pull requests) so it does not redo it, followed by the
//! call metrics and whatever warning or halt is pending.

use crate::budget::CallMetrics;
use crate::decision::GovernanceDecision;
use crate::session::SessionState;

/// Text renderer for the state-awareness block.
#[derive(Debug, Clone)]
pub struct StateAwarenessSynthesizer {
    /// Most recent searches listed. Default: 5.
    pub max_searches: usize,
    /// Most recent touched files listed. Default: 20.
    pub max_files: usize,
}

impl Default for StateAwarenessSynthesizer {
    fn default() -> Self {
        Self {
            max_searches: 5,
            max_files: 20,
        }
    }
}

impl StateAwarenessSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(
        &self,
        state: &SessionState,
        metrics: &CallMetrics,
        decision: &GovernanceDecision,
    ) -> String {
        let mut out = String::from("[Session state: already completed, do not repeat]\n");

        if state.forked_repos().is_empty() {
            out.push_str("Forked repositories: none\n");
        } else {
            let repos: Vec<String> = state.forked_repos().iter().map(ToString::to_string).collect();
            out.push_str(&format!("Forked repositories: {}\n", repos.join(", ")));
        }

        match state.current_branch() {
            Some(b) => {
                out.push_str(&format!("Current branch: {} (from {})\n", b.name, b.base_branch));
            }
            None => out.push_str("Current branch: none\n"),
        }

        let touched = state.touched_files();
        if touched.is_empty() {
            out.push_str("Files modified: none\n");
        } else {
            out.push_str(&format!("Files modified ({}):\n", touched.len()));
            let skip = touched.len().saturating_sub(self.max_files);
            if skip > 0 {
                out.push_str(&format!("- ... {skip} earlier file(s)\n"));
            }
            for path in touched.iter().skip(skip) {
                out.push_str(&format!("- {path}\n"));
            }
        }

        let searches = state.search_history();
        if !searches.is_empty() {
            out.push_str("Searches run:\n");
            let skip = searches.len().saturating_sub(self.max_searches);
            for s in searches.iter().skip(skip) {
                out.push_str(&format!("- \"{}\": {} match(es)\n", s.pattern, s.total_matches));
            }
        }

        for pr in state.pull_requests() {
            out.push_str(&format!("Pull request #{}: {}\n", pr.number, pr.url));
        }

        out.push_str(&format!(
            "Calls: {} of {} expected ({:.1}%){}\n",
            metrics.actual,
            metrics.expected,
            metrics.efficiency_percent,
            if metrics.exceeded { ", budget exceeded" } else { "" }
        ));

        match decision {
            GovernanceDecision::Continue => {}
            GovernanceDecision::Warn(reason) => {
                out.push_str(&format!("Warning: {reason}\n"));
            }
            GovernanceDecision::Halt(reason) => {
                out.push_str(&format!("HALT: {reason}\n"));
            }
        }
        out
    }
}

/// Render with default limits.
pub fn render(state: &SessionState, metrics: &CallMetrics, decision: &GovernanceDecision) -> String {
    StateAwarenessSynthesizer::default().render(state, metrics, decision)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::RepoRef;

    fn metrics(actual: u32) -> CallMetrics {
        CallMetrics {
            expected: 8,
            actual,
            efficiency_percent: actual as f64 / 8.0 * 100.0,
            exceeded: actual > 12,
        }
    }

    #[test]
    fn empty_session() {
        let text = render(&SessionState::new(), &metrics(0), &GovernanceDecision::Continue);
        assert!(text.contains("Forked repositories: none"));
        assert!(text.contains("Current branch: none"));
        assert!(text.contains("Files modified: none"));
        assert!(text.contains("Calls: 0 of 8 expected (0.0%)"));
        assert!(!text.contains("Warning"));
    }

    #[test]
    fn empty_session_layout() {
        let text = render(&SessionState::new(), &metrics(0), &GovernanceDecision::Continue);
        assert_eq!(
            text.lines().collect::<Vec<_>>(),
            vec![
                "[Session state: already completed, do not repeat]",
                "Forked repositories: none",
                "Current branch: none",
                "Files modified: none",
                "Calls: 0 of 8 expected (0.0%)",
            ]
        );
        assert!(text.ends_with("(0.0%)\n"));
    }

    #[test]
    fn lists_everything_recorded() {
        let mut s = SessionState::new();
        s.record_fork("acme", "widget");
        s.record_branch(&RepoRef::new("acme", "widget"), "fix/x", "main");
        s.record_file_modification("src/a.rs", "1");
        s.record_file_modification("src/a.rs", "2");
        s.record_file_modification("src/b.rs", "3");
        s.record_search("TODO", 3, vec!["a".into(), "b".into(), "c".into()]);
        s.record_pull_request(7, "https://example.test/pr/7");

        let text = render(&s, &metrics(9), &GovernanceDecision::Warn("slow down".into()));
        assert!(text.contains("Forked repositories: acme/widget"));
        assert!(text.contains("Current branch: fix/x (from main)"));
        assert!(text.contains("Files modified (2):"));
        assert!(text.contains("\"TODO\": 3 match(es)"));
        assert!(text.contains("Pull request #7"));
        assert!(text.contains("(112.5%)"));
        assert!(text.contains("Warning: slow down"));
    }

    #[test]
    fn halt_and_exceeded() {
        let text = render(
            &SessionState::new(),
            &metrics(13),
            &GovernanceDecision::Halt("stop".into()),
        );
        assert!(text.contains("budget exceeded"));
        assert!(text.contains("HALT: stop"));
    }

    #[test]
    fn truncates_long_file_lists() {
        let mut s = SessionState::new();
        for i in 0..5 {
            s.record_file_modification(&format!("f{i}"), "");
        }
        let synth = StateAwarenessSynthesizer {
            max_files: 2,
            ..Default::default()
        };
        let text = synth.render(&s, &metrics(5), &GovernanceDecision::Continue);
        assert!(text.contains("... 3 earlier file(s)"));
        assert!(!text.contains("- f0\n"));
        assert!(text.contains("- f4\n"));
    }
}
