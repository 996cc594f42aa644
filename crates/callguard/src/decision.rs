//! The single decision point for the agent loop.
//!
//! The exploration ceiling and the exceeded budget both mean "stop wasting
//! calls", so they are folded into one [`GovernanceDecision`] instead of two
//! signals the loop would have to reconcile.

use crate::patterns::PatternAnalysis;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How loudly a signal must be surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Nothing to report.
    Info,
    /// Surface to the agent, keep going.
    Advisory,
    /// Stop issuing exploratory calls.
    Blocking,
}

/// What the agent loop should do after a recorded call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum GovernanceDecision {
    #[default]
    Continue,
    Warn(String),
    Halt(String),
}

impl GovernanceDecision {
    /// Combine pattern analysis with an optional budget advisory.
    ///
    /// A halt wins over everything; otherwise all advisories are joined
    /// one per line, pattern warnings first.
    pub fn from_signals(analysis: &PatternAnalysis, budget_advisory: Option<String>) -> Self {
        if let Some(halt) = &analysis.halt {
            return GovernanceDecision::Halt(halt.message.clone());
        }
        let mut reasons: Vec<String> = analysis.warnings.iter().map(|w| w.message.clone()).collect();
        reasons.extend(budget_advisory);
        if reasons.is_empty() {
            GovernanceDecision::Continue
        } else {
            GovernanceDecision::Warn(reasons.join("\n"))
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            GovernanceDecision::Continue => Severity::Info,
            GovernanceDecision::Warn(_) => Severity::Advisory,
            GovernanceDecision::Halt(_) => Severity::Blocking,
        }
    }

    /// `false` only for [`GovernanceDecision::Halt`].
    pub fn should_continue(&self) -> bool {
        !self.is_halt()
    }

    pub fn is_halt(&self) -> bool {
        matches!(self, GovernanceDecision::Halt(_))
    }

    /// The warning or halt text, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            GovernanceDecision::Continue => None,
            GovernanceDecision::Warn(m) | GovernanceDecision::Halt(m) => Some(m),
        }
    }
}

impl fmt::Display for GovernanceDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GovernanceDecision::Continue => write!(f, "continue"),
            GovernanceDecision::Warn(m) => write!(f, "warn: {m}"),
            GovernanceDecision::Halt(m) => write!(f, "halt: {m}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::{HaltSignal, PatternKind, PatternWarning};

    fn warning(msg: &str) -> PatternWarning {
        PatternWarning {
            kind: PatternKind::RepeatedReads,
            message: msg.into(),
        }
    }

    #[test]
    fn nothing_means_continue() {
        let d = GovernanceDecision::from_signals(&PatternAnalysis::default(), None);
        assert_eq!(d, GovernanceDecision::default());
        assert_eq!(d.severity(), Severity::Info);
        assert!(d.should_continue());
        assert_eq!(d.message(), None);
    }

    #[test]
    fn warnings_and_budget_are_joined() {
        let analysis = PatternAnalysis {
            warnings: vec![warning("a"), warning("b")],
            ..Default::default()
        };
        let d = GovernanceDecision::from_signals(&analysis, Some("budget".into()));
        assert_eq!(d, GovernanceDecision::Warn("a\nb\nbudget".into()));
        assert_eq!(d.severity(), Severity::Advisory);
        assert!(d.should_continue());
    }

    #[test]
    fn budget_alone_warns() {
        let d = GovernanceDecision::from_signals(&PatternAnalysis::default(), Some("over".into()));
        assert_eq!(d.message(), Some("over"));
    }

    #[test]
    fn halt_wins() {
        let analysis = PatternAnalysis {
            warnings: vec![warning("a")],
            halt: Some(HaltSignal {
                message: "stop".into(),
                total_calls: 16,
                recent_tools: vec![],
            }),
            ..Default::default()
        };
        let d = GovernanceDecision::from_signals(&analysis, Some("budget".into()));
        assert_eq!(d, GovernanceDecision::Halt("stop".into()));
        assert_eq!(d.severity(), Severity::Blocking);
        assert!(!d.should_continue());
    }

    #[test]
    fn severity_orders() {
        assert!(Severity::Info < Severity::Advisory);
        assert!(Severity::Advisory < Severity::Blocking);
    }

    #[test]
    fn serializes_tagged() {
        let json = serde_json::to_value(GovernanceDecision::Halt("x".into())).unwrap();
        assert_eq!(json["decision"], "halt");
        assert_eq!(json["reason"], "x");
    }
}
