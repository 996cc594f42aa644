//! Canonical tool name constants.
//!
//! All tool-name string literals should reference these constants to avoid
//! scattered magic strings. When a tool is renamed, only this file (and the
//! default [`ToolCatalog`](super::catalog::ToolCatalog)) needs to change.

// ── Search ─────────────────────────────────────────────────────────
pub const SEARCH_CODE: &str = "search_code";
pub const SEARCH_REPOSITORIES: &str = "search_repositories";

// ── Read / browse ──────────────────────────────────────────────────
pub const GET_FILE_CONTENTS: &str = "get_file_contents";
pub const READ_FILE: &str = "read_file";
pub const GET_REPOSITORY_TREE: &str = "get_repository_tree";
pub const LIST_DIRECTORY: &str = "list_directory";

// ── Mutations ──────────────────────────────────────────────────────
pub const CREATE_OR_UPDATE_FILE: &str = "create_or_update_file";
pub const EDIT_FILE: &str = "edit_file";
pub const PUSH_FILES: &str = "push_files";
pub const FORK_REPOSITORY: &str = "fork_repository";
pub const CREATE_BRANCH: &str = "create_branch";
pub const CREATE_PULL_REQUEST: &str = "create_pull_request";
pub const COMMIT_CHANGES: &str = "commit_changes";
