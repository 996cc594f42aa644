//! Inefficiency pattern detection over the call timeline.
//!
//! Budget tiers say how many calls a task *should* take. The
//! [`InefficiencyDetector`] instead looks at what the calls *are* and flags
//! aimless exploration regardless of tier:
//!
//! | Pattern | Fires when (defaults) |
//! |---------|-----------------------|
//! | [`PatternKind::ExcessiveBrowsing`] | more than 3 browse calls |
//! | [`PatternKind::BrowseBeforeSearch`] | more than 2 browse calls and no search yet |
//! | [`PatternKind::ReadWithoutEdit`] | more than 10 reads and no edit yet |
//! | [`PatternKind::RepeatedReads`] | reads exceed 1.5× the distinct read targets |
//!
//! Separately, once the session passes the hard ceiling (15 calls) without a
//! single decisive action (edit, commit, pull request) the detector emits a
//! [`HaltSignal`]. A halt is blocking; warnings are advisory.
//!
//! Every threshold lives in [`PatternConfig`].

use crate::duplicate::canonical::canonical_string;
use crate::session::{SessionState, ToolCallRecord};
use crate::tools::args::{self, str_arg, str_arg_or};
use crate::tools::catalog::{ToolCatalog, ToolKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::warn;

/// Detection thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Browse calls allowed before warning of aimless exploration. Default: 3.
    pub max_browse_calls: usize,
    /// Browse calls allowed with no search before suggesting search. Default: 2.
    pub browse_before_search: usize,
    /// Reads allowed with no edit before warning. Default: 10.
    pub max_reads_without_edit: usize,
    /// Reads per distinct target above which repeats are flagged. Default: 1.5.
    pub repeated_read_ratio: f64,
    /// Total calls allowed with no decisive action before halting. Default: 15.
    pub hard_ceiling: usize,
    /// Recent tool names attached to a halt for context. Default: 5.
    pub halt_context_tools: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            max_browse_calls: 3,
            browse_before_search: 2,
            max_reads_without_edit: 10,
            repeated_read_ratio: 1.5,
            hard_ceiling: 15,
            halt_context_tools: 5,
        }
    }
}

/// Which inefficiency was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    ExcessiveBrowsing,
    BrowseBeforeSearch,
    ReadWithoutEdit,
    RepeatedReads,
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PatternKind::ExcessiveBrowsing => "excessive_browsing",
            PatternKind::BrowseBeforeSearch => "browse_before_search",
            PatternKind::ReadWithoutEdit => "read_without_edit",
            PatternKind::RepeatedReads => "repeated_reads",
        })
    }
}

/// An advisory pattern warning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternWarning {
    pub kind: PatternKind,
    pub message: String,
}

/// Blocking signal: stop issuing exploratory calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HaltSignal {
    pub message: String,
    pub total_calls: usize,
    /// Most recent tool names, oldest first.
    pub recent_tools: Vec<String>,
}

/// Output of one analysis pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternAnalysis {
    pub warnings: Vec<PatternWarning>,
    pub halt: Option<HaltSignal>,
    /// Warning kinds active for the first time in this session.
    #[serde(default)]
    pub first_seen: Vec<PatternKind>,
}

impl PatternAnalysis {
    /// `false` once a halt has been raised.
    pub fn should_continue(&self) -> bool {
        self.halt.is_none()
    }

    pub fn has(&self, kind: PatternKind) -> bool {
        self.warnings.iter().any(|w| w.kind == kind)
    }
}

/// Streaming analyzer over one session's history.
#[derive(Debug, Clone)]
pub struct InefficiencyDetector {
    config: PatternConfig,
    default_branch: String,
    browse_calls: usize,
    search_calls: usize,
    read_calls: usize,
    edit_calls: usize,
    terminal_calls: usize,
    read_targets: HashSet<String>,
    reported: HashSet<PatternKind>,
    halt_reported: bool,
    synced: usize,
}

impl InefficiencyDetector {
    pub fn new(config: PatternConfig) -> Self {
        Self {
            config,
            default_branch: "main".to_string(),
            browse_calls: 0,
            search_calls: 0,
            read_calls: 0,
            edit_calls: 0,
            terminal_calls: 0,
            read_targets: HashSet::new(),
            reported: HashSet::new(),
            halt_reported: false,
            synced: 0,
        }
    }

    /// Branch assumed when a read omits one. Default: `"main"`.
    pub fn with_default_branch(mut self, branch: impl Into<String>) -> Self {
        self.default_branch = branch.into();
        self
    }

    pub fn config(&self) -> &PatternConfig {
        &self.config
    }

    /// Fold in new history records and re-evaluate every pattern.
    pub fn analyze(&mut self, state: &SessionState, catalog: &ToolCatalog) -> PatternAnalysis {
        let history = state.history();
        for record in history.iter().skip(self.synced) {
            self.observe(record, catalog);
        }
        self.synced = history.len();

        let mut analysis = self.evaluate(state, catalog);
        for w in &analysis.warnings {
            if self.reported.insert(w.kind) {
                warn!(pattern = %w.kind, "{}", w.message);
                analysis.first_seen.push(w.kind);
            }
        }
        if let Some(halt) = &analysis.halt
            && !self.halt_reported
        {
            self.halt_reported = true;
            warn!(total_calls = halt.total_calls, "Exploration ceiling reached, halting");
        }
        analysis
    }

    fn observe(&mut self, record: &ToolCallRecord, catalog: &ToolCatalog) {
        let kind = catalog.kind_of(&record.tool);
        match kind {
            ToolKind::Browse => self.browse_calls += 1,
            ToolKind::Search => self.search_calls += 1,
            ToolKind::Read => {
                self.read_calls += 1;
                let target = self.read_target(&record.args);
                self.read_targets.insert(target);
            }
            ToolKind::Edit => self.edit_calls += 1,
            _ => {}
        }
        if kind.is_terminal() {
            self.terminal_calls += 1;
        }
    }

    /// Identity of what a read call reads: repo + path + branch when a path
    /// is present, otherwise the canonical arguments.
    fn read_target(&self, a: &serde_json::Value) -> String {
        match str_arg(a, args::PATH_KEYS) {
            Some(path) => format!(
                "{}/{}:{}@{}",
                str_arg(a, args::OWNER_KEYS).unwrap_or_default(),
                str_arg(a, args::REPO_KEYS).unwrap_or_default(),
                path,
                str_arg_or(a, args::BRANCH_KEYS, &self.default_branch),
            ),
            None => canonical_string(a),
        }
    }

    fn evaluate(&self, state: &SessionState, catalog: &ToolCatalog) -> PatternAnalysis {
        let c = &self.config;
        let mut warnings = Vec::new();

        if self.browse_calls > c.max_browse_calls {
            warnings.push(PatternWarning {
                kind: PatternKind::ExcessiveBrowsing,
                message: format!(
                    "Too many tree calls: {} directory listings (limit {}). \
                     This looks like aimless exploration; search for what you need instead.",
                    self.browse_calls, c.max_browse_calls
                ),
            });
        }

        if self.browse_calls > c.browse_before_search && self.search_calls == 0 {
            let search_tool = catalog
                .tools_of(ToolKind::Search)
                .first()
                .copied()
                .unwrap_or("a search tool");
            warnings.push(PatternWarning {
                kind: PatternKind::BrowseBeforeSearch,
                message: format!(
                    "{} directory listings and no search yet. Use {search_tool} to locate \
                     files instead of browsing.",
                    self.browse_calls
                ),
            });
        }

        if self.read_calls > c.max_reads_without_edit && self.edit_calls == 0 {
            warnings.push(PatternWarning {
                kind: PatternKind::ReadWithoutEdit,
                message: format!(
                    "{} file reads and no edits yet. Stop reading and start making changes.",
                    self.read_calls
                ),
            });
        }

        let distinct = self.read_targets.len();
        if self.read_calls as f64 > c.repeated_read_ratio * distinct as f64 {
            warnings.push(PatternWarning {
                kind: PatternKind::RepeatedReads,
                message: format!(
                    "{} reads across {distinct} distinct files: many reads are repeats. \
                     Reuse content you already have.",
                    self.read_calls
                ),
            });
        }

        let total = state.call_count();
        let halt = (total > c.hard_ceiling && self.terminal_calls == 0).then(|| {
            let recent_tools: Vec<String> = state
                .recent_tools(c.halt_context_tools)
                .into_iter()
                .map(str::to_string)
                .collect();
            HaltSignal {
                message: format!(
                    "Exploration ceiling reached: {total} calls without any decisive action \
                     (edit, commit or pull request). Recent calls: {}. \
                     Stop exploring and act on what you already know.",
                    recent_tools.join(" → ")
                ),
                total_calls: total,
                recent_tools,
            }
        });

        PatternAnalysis {
            warnings,
            halt,
            first_seen: Vec::new(),
        }
    }
}

impl Default for InefficiencyDetector {
    fn default() -> Self {
        Self::new(PatternConfig::default())
    }
}
