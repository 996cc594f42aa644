//! Per-run session state: everything the governor has observed so far.
//!
//! A [`SessionState`] is created when an agent run starts and dropped when it
//! ends. It is never persisted. Two views are kept side by side:
//!
//! - the **call view**, [`SessionState::history`], an append-only sequence of
//!   [`ToolCallRecord`]s. This is the ground truth; every count, index, and
//!   warning elsewhere in the crate can be recomputed from it.
//! - the **domain view**: forked repositories, the current branch, modified
//!   files, searches, and pull requests.
//!
//! Every recording operation appends to the call view, so the two never
//! drift apart. Recording has no error path.
//!
//! # Submodules
//!
//! - [`effects`]: derives domain facts from completed tool calls.

pub mod effects;

use crate::tools::names;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;

pub use effects::DomainFact;

// ── Records ────────────────────────────────────────────────────────

/// An `owner/repo` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// The branch the agent is currently working on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchInfo {
    pub name: String,
    pub base_branch: String,
}

/// One edit to one file. A path may be modified many times per session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileModification {
    pub path: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// A completed search and what it found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
    pub pattern: String,
    pub total_matches: u64,
    pub files: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// A pull request opened during the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRecord {
    pub number: u64,
    pub url: String,
}

/// One executed tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub tool: String,
    pub args: Value,
    pub result: Value,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    /// Caller-supplied flag: the caller already knew this call was
    /// redundant when it recorded it. Feeds the budget tracker's redundant
    /// read/search counters.
    #[serde(default)]
    pub redundant: bool,
    /// Written by a domain recorder rather than a real execution. The
    /// result is a summary, so the record never answers an exact duplicate.
    #[serde(default)]
    pub synthetic: bool,
}

impl ToolCallRecord {
    /// Create a record stamped with the current time.
    pub fn new(tool: impl Into<String>, args: Value, result: Value, success: bool) -> Self {
        Self {
            tool: tool.into(),
            args,
            result,
            success,
            timestamp: Utc::now(),
            redundant: false,
            synthetic: false,
        }
    }

    /// Mark the record as redundant (builder pattern).
    pub fn with_redundant(mut self, redundant: bool) -> Self {
        self.redundant = redundant;
        self
    }
}

// ── SessionState ───────────────────────────────────────────────────

/// Everything observed during one agent run.
///
/// Fields are private: mutation goes through the `record_*` methods only,
/// and all of them append to the call history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionState {
    forked_repos: Vec<RepoRef>,
    current_branch: Option<BranchInfo>,
    modified_files: Vec<FileModification>,
    search_history: Vec<SearchRecord>,
    pull_requests: Vec<PullRequestRecord>,
    tool_call_history: Vec<ToolCallRecord>,
}

impl SessionState {
    /// Create an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    // ── Recording ──────────────────────────────────────────────────

    /// Record a fork of `owner/repo`.
    pub fn record_fork(&mut self, owner: &str, repo: &str) {
        let repo_ref = RepoRef::new(owner, repo);
        self.append_synthetic(ToolCallRecord::new(
            names::FORK_REPOSITORY,
            json!({ "owner": owner, "repo": repo }),
            json!({ "full_name": repo_ref.to_string() }),
            true,
        ));
        self.apply(DomainFact::Forked(repo_ref));
    }

    /// Record creation of branch `name` off `base_branch` in `repo`.
    pub fn record_branch(&mut self, repo: &RepoRef, name: &str, base_branch: &str) {
        self.append_synthetic(ToolCallRecord::new(
            names::CREATE_BRANCH,
            json!({
                "owner": repo.owner,
                "repo": repo.repo,
                "branch": name,
                "from_branch": base_branch,
            }),
            json!({ "ref": format!("refs/heads/{name}") }),
            true,
        ));
        self.apply(DomainFact::Branched(BranchInfo {
            name: name.to_string(),
            base_branch: base_branch.to_string(),
        }));
    }

    /// Record a write of `content` to `path`.
    pub fn record_file_modification(&mut self, path: &str, content: &str) {
        self.append_synthetic(ToolCallRecord::new(
            names::CREATE_OR_UPDATE_FILE,
            json!({ "path": path, "content": content }),
            json!({ "path": path }),
            true,
        ));
        self.apply(DomainFact::FileModified {
            path: path.to_string(),
            content: content.to_string(),
        });
    }

    /// Record a search for `pattern` that matched `total_matches` times
    /// across `files`.
    pub fn record_search(&mut self, pattern: &str, total_matches: u64, files: Vec<String>) {
        let items: Vec<Value> = files.iter().map(|p| json!({ "path": p })).collect();
        self.append_synthetic(ToolCallRecord::new(
            names::SEARCH_CODE,
            json!({ "pattern": pattern }),
            json!({ "total_count": total_matches, "items": items }),
            true,
        ));
        self.apply(DomainFact::Searched {
            pattern: pattern.to_string(),
            total_matches,
            files,
        });
    }

    /// Record a pull request.
    pub fn record_pull_request(&mut self, number: u64, url: &str) {
        self.append_synthetic(ToolCallRecord::new(
            names::CREATE_PULL_REQUEST,
            json!({}),
            json!({ "number": number, "html_url": url }),
            true,
        ));
        self.apply(DomainFact::PullRequestOpened(PullRequestRecord {
            number,
            url: url.to_string(),
        }));
    }

    /// Record an arbitrary tool call. Only the call view changes.
    pub fn record_tool_call(&mut self, record: ToolCallRecord) {
        self.append(record);
    }

    /// Append a record to the call view.
    fn append(&mut self, record: ToolCallRecord) {
        self.tool_call_history.push(record);
    }

    /// Append a record written by one of the domain recorders.
    fn append_synthetic(&mut self, mut record: ToolCallRecord) {
        record.synthetic = true;
        self.append(record);
    }

    /// Fold a domain fact into the domain view without touching history.
    ///
    /// Used by the recorders above and by the governor after it has
    /// appended the originating call itself.
    pub(crate) fn apply(&mut self, fact: DomainFact) {
        match fact {
            DomainFact::Forked(repo) => {
                if !self.forked_repos.contains(&repo) {
                    self.forked_repos.push(repo);
                }
            }
            DomainFact::Branched(branch) => self.current_branch = Some(branch),
            DomainFact::FileModified { path, content } => {
                self.modified_files.push(FileModification {
                    path,
                    content,
                    timestamp: Utc::now(),
                });
            }
            DomainFact::Searched {
                pattern,
                total_matches,
                files,
            } => self.search_history.push(SearchRecord {
                pattern,
                total_matches,
                files,
                timestamp: Utc::now(),
            }),
            DomainFact::PullRequestOpened(pr) => self.pull_requests.push(pr),
        }
    }

    // ── Accessors ──────────────────────────────────────────────────

    /// The full call history, oldest first.
    pub fn history(&self) -> &[ToolCallRecord] {
        &self.tool_call_history
    }

    /// Total number of recorded calls.
    pub fn call_count(&self) -> usize {
        self.tool_call_history.len()
    }

    pub fn forked_repos(&self) -> &[RepoRef] {
        &self.forked_repos
    }

    /// Whether `owner/repo` has already been forked this session.
    pub fn is_forked(&self, owner: &str, repo: &str) -> bool {
        self.forked_repos
            .iter()
            .any(|r| r.owner == owner && r.repo == repo)
    }

    pub fn current_branch(&self) -> Option<&BranchInfo> {
        self.current_branch.as_ref()
    }

    /// Every file modification in recording order, duplicates included.
    pub fn modified_files(&self) -> &[FileModification] {
        &self.modified_files
    }

    /// Modified paths, deduplicated, in order of first modification.
    pub fn touched_files(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for m in &self.modified_files {
            if !seen.contains(&m.path.as_str()) {
                seen.push(&m.path);
            }
        }
        seen
    }

    /// The newest modification of `path`, if any.
    pub fn latest_modification(&self, path: &str) -> Option<&FileModification> {
        self.modified_files.iter().rev().find(|m| m.path == path)
    }

    pub fn search_history(&self) -> &[SearchRecord] {
        &self.search_history
    }

    pub fn pull_requests(&self) -> &[PullRequestRecord] {
        &self.pull_requests
    }

    /// How many recorded calls went to `tool`.
    pub fn calls_to(&self, tool: &str) -> usize {
        self.tool_call_history
            .iter()
            .filter(|r| r.tool == tool)
            .count()
    }

    /// Names of the `n` most recent calls, oldest first.
    pub fn recent_tools(&self, n: usize) -> Vec<&str> {
        let start = self.tool_call_history.len().saturating_sub(n);
        self.tool_call_history[start..]
            .iter()
            .map(|r| r.tool.as_str())
            .collect()
    }

    /// Pretty-printed JSON snapshot of the whole session.
    pub fn snapshot_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }
}
