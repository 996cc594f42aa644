//! Tool classification by kind.
//!
//! Every component of the governor needs to know what a tool *does* rather
//! than what it is called: the budget tracker counts reads and writes, the
//! pattern detector watches browse and search calls, and the similarity
//! registry picks a near-duplicate rule per family. [`ToolCatalog`] is the
//! single place those names are mapped to a [`ToolKind`].
//!
//! The catalog is plain configuration. Deployments with different tool names
//! add or reassign entries instead of touching the detectors.

use super::names;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// What a tool does, as far as governance is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Pattern or query search over a repository.
    Search,
    /// Reads a single file's contents.
    Read,
    /// Lists a directory or repository tree.
    Browse,
    /// Creates or modifies file contents.
    Edit,
    /// Forks a repository.
    Fork,
    /// Creates a branch.
    Branch,
    /// Opens a pull request.
    PullRequest,
    /// Commits staged changes.
    Commit,
    /// Anything the catalog does not know about.
    Other,
}

impl ToolKind {
    /// Whether a call of this kind counts as decisive progress on the task.
    ///
    /// The exploration ceiling only halts sessions that have produced no
    /// terminal action at all.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ToolKind::Edit | ToolKind::PullRequest | ToolKind::Commit
        )
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ToolKind::Search => "search",
            ToolKind::Read => "read",
            ToolKind::Browse => "browse",
            ToolKind::Edit => "edit",
            ToolKind::Fork => "fork",
            ToolKind::Branch => "branch",
            ToolKind::PullRequest => "pull_request",
            ToolKind::Commit => "commit",
            ToolKind::Other => "other",
        };
        f.write_str(s)
    }
}

/// Mapping from tool name to [`ToolKind`].
///
/// Serializes as a flat JSON object (`{"search_code": "search", ...}`) so
/// it can be overridden from a config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolCatalog {
    kinds: HashMap<String, ToolKind>,
}

impl ToolCatalog {
    /// Create an empty catalog. Every tool is [`ToolKind::Other`].
    pub fn empty() -> Self {
        Self {
            kinds: HashMap::new(),
        }
    }

    /// Assign `tool` to `kind`, replacing any previous assignment.
    pub fn assign(&mut self, tool: impl Into<String>, kind: ToolKind) {
        self.kinds.insert(tool.into(), kind);
    }

    /// Assign `tool` to `kind` (builder pattern).
    pub fn with(mut self, tool: impl Into<String>, kind: ToolKind) -> Self {
        self.assign(tool, kind);
        self
    }

    /// Merge another catalog into this one. Entries in `other` win.
    pub fn extend(&mut self, other: &ToolCatalog) {
        for (tool, kind) in &other.kinds {
            self.kinds.insert(tool.clone(), *kind);
        }
    }

    /// Look up the kind of a tool.
    pub fn kind_of(&self, tool: &str) -> ToolKind {
        self.kinds.get(tool).copied().unwrap_or(ToolKind::Other)
    }

    /// Whether `tool` is one of the decisive kinds.
    pub fn is_terminal(&self, tool: &str) -> bool {
        self.kind_of(tool).is_terminal()
    }

    /// All tool names assigned to `kind`, sorted for stable output.
    pub fn tools_of(&self, kind: ToolKind) -> Vec<&str> {
        let mut tools: Vec<&str> = self
            .kinds
            .iter()
            .filter(|(_, k)| **k == kind)
            .map(|(name, _)| name.as_str())
            .collect();
        tools.sort_unstable();
        tools
    }

    /// Number of catalogued tools.
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Whether the catalog has no entries.
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

impl Default for ToolCatalog {
    fn default() -> Self {
        Self::empty()
            .with(names::SEARCH_CODE, ToolKind::Search)
            .with(names::SEARCH_REPOSITORIES, ToolKind::Search)
            .with(names::GET_FILE_CONTENTS, ToolKind::Read)
            .with(names::READ_FILE, ToolKind::Read)
            .with(names::GET_REPOSITORY_TREE, ToolKind::Browse)
            .with(names::LIST_DIRECTORY, ToolKind::Browse)
            .with(names::CREATE_OR_UPDATE_FILE, ToolKind::Edit)
            .with(names::EDIT_FILE, ToolKind::Edit)
            .with(names::PUSH_FILES, ToolKind::Edit)
            .with(names::FORK_REPOSITORY, ToolKind::Fork)
            .with(names::CREATE_BRANCH, ToolKind::Branch)
            .with(names::CREATE_PULL_REQUEST, ToolKind::PullRequest)
            .with(names::COMMIT_CHANGES, ToolKind::Commit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_classify_known_tools() {
        let catalog = ToolCatalog::default();
        assert_eq!(catalog.kind_of("search_code"), ToolKind::Search);
        assert_eq!(catalog.kind_of("get_file_contents"), ToolKind::Read);
        assert_eq!(catalog.kind_of("get_repository_tree"), ToolKind::Browse);
        assert_eq!(catalog.kind_of("fork_repository"), ToolKind::Fork);
        assert_eq!(catalog.kind_of("create_branch"), ToolKind::Branch);
    }

    #[test]
    fn unknown_tool_is_other() {
        let catalog = ToolCatalog::default();
        assert_eq!(catalog.kind_of("launch_rocket"), ToolKind::Other);
        assert!(!catalog.is_terminal("launch_rocket"));
    }

    #[test]
    fn terminal_kinds() {
        let catalog = ToolCatalog::default();
        assert!(catalog.is_terminal("edit_file"));
        assert!(catalog.is_terminal("create_pull_request"));
        assert!(catalog.is_terminal("commit_changes"));
        assert!(!catalog.is_terminal("get_file_contents"));
        assert!(!catalog.is_terminal("fork_repository"));
    }

    #[test]
    fn assign_overrides_default() {
        let catalog = ToolCatalog::default().with("search_code", ToolKind::Other);
        assert_eq!(catalog.kind_of("search_code"), ToolKind::Other);
    }

    #[test]
    fn tools_of_is_sorted() {
        let catalog = ToolCatalog::default();
        assert_eq!(
            catalog.tools_of(ToolKind::Browse),
            vec!["get_repository_tree", "list_directory"]
        );
    }

    #[test]
    fn deserializes_from_flat_object() {
        let catalog: ToolCatalog =
            serde_json::from_str(r#"{"grep": "search", "cat": "read"}"#).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.kind_of("grep"), ToolKind::Search);
        assert_eq!(catalog.kind_of("cat"), ToolKind::Read);
    }

    #[test]
    fn extend_merges_entries() {
        let mut catalog = ToolCatalog::default();
        let extra = ToolCatalog::empty().with("grep", ToolKind::Search);
        catalog.extend(&extra);
        assert_eq!(catalog.kind_of("grep"), ToolKind::Search);
        assert_eq!(catalog.kind_of("search_code"), ToolKind::Search);
    }
}
