//! Domain facts derived from completed tool calls.
//!
//! When the agent loop records a call through the governor it only hands
//! over the raw `(tool, args, result, success)` tuple. [`extract`] looks at
//! the tool's [`ToolKind`] and pulls out the domain fact the call
//! established, so the session's domain view stays current without the
//! caller having to call `record_fork` and friends separately.
//!
//! Failed calls never produce a fact.

use super::{BranchInfo, PullRequestRecord, RepoRef, ToolCallRecord};
use crate::tools::args::{self, str_arg, u64_arg};
use crate::tools::catalog::{ToolCatalog, ToolKind};
use serde_json::Value;

/// A change to the session's domain view.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainFact {
    Forked(RepoRef),
    Branched(BranchInfo),
    FileModified {
        path: String,
        content: String,
    },
    Searched {
        pattern: String,
        total_matches: u64,
        files: Vec<String>,
    },
    PullRequestOpened(PullRequestRecord),
}

/// Derive the domain facts a successful call established.
///
/// Multi-file edits (`push_files`-style calls carrying a `files` array)
/// yield one fact per file.
pub fn extract(record: &ToolCallRecord, catalog: &ToolCatalog, default_branch: &str) -> Vec<DomainFact> {
    if !record.success {
        return Vec::new();
    }
    let a = &record.args;
    match catalog.kind_of(&record.tool) {
        ToolKind::Fork => match (str_arg(a, args::OWNER_KEYS), str_arg(a, args::REPO_KEYS)) {
            (Some(owner), Some(repo)) => vec![DomainFact::Forked(RepoRef::new(owner, repo))],
            _ => Vec::new(),
        },
        ToolKind::Branch => match str_arg(a, args::NEW_BRANCH_KEYS) {
            Some(name) => vec![DomainFact::Branched(BranchInfo {
                name: name.to_string(),
                base_branch: args::str_arg_or(a, args::BASE_BRANCH_KEYS, default_branch)
                    .to_string(),
            })],
            None => Vec::new(),
        },
        ToolKind::Edit => edit_facts(a),
        ToolKind::Search => match str_arg(a, args::PATTERN_KEYS) {
            Some(pattern) => {
                let files = result_paths(&record.result);
                let total_matches = u64_arg(&record.result, &["total_count", "totalMatches"])
                    .unwrap_or(files.len() as u64);
                vec![DomainFact::Searched {
                    pattern: pattern.to_string(),
                    total_matches,
                    files,
                }]
            }
            None => Vec::new(),
        },
        ToolKind::PullRequest => match u64_arg(&record.result, &["number"]) {
            Some(number) => {
                let url = str_arg(&record.result, &["html_url", "url"]).unwrap_or_default();
                vec![DomainFact::PullRequestOpened(PullRequestRecord {
                    number,
                    url: url.to_string(),
                })]
            }
            None => Vec::new(),
        },
        ToolKind::Read | ToolKind::Browse | ToolKind::Commit | ToolKind::Other => Vec::new(),
    }
}

fn edit_facts(a: &Value) -> Vec<DomainFact> {
    if let Some(files) = a.get("files").and_then(Value::as_array) {
        return files
            .iter()
            .filter_map(|f| {
                let path = str_arg(f, args::PATH_KEYS)?;
                Some(DomainFact::FileModified {
                    path: path.to_string(),
                    content: str_arg(f, args::CONTENT_KEYS).unwrap_or_default().to_string(),
                })
            })
            .collect();
    }
    match str_arg(a, args::PATH_KEYS) {
        Some(path) => vec![DomainFact::FileModified {
            path: path.to_string(),
            content: str_arg(a, args::CONTENT_KEYS).unwrap_or_default().to_string(),
        }],
        None => Vec::new(),
    }
}

/// File paths out of a search result: `items[].path` or `files[]`.
fn result_paths(result: &Value) -> Vec<String> {
    if let Some(items) = result.get("items").and_then(Value::as_array) {
        return items
            .iter()
            .filter_map(|i| i.get("path").and_then(Value::as_str))
            .map(str::to_string)
            .collect();
    }
    if let Some(files) = result.get("files").and_then(Value::as_array) {
        return files
            .iter()
            .filter_map(|f| match f {
                Value::String(s) => Some(s.clone()),
                other => other.get("path").and_then(Value::as_str).map(str::to_string),
            })
            .collect();
    }
    Vec::new()
}
