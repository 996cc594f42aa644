//! Near-duplicate rules, keyed by tool family.
//!
//! A near-duplicate is a call that is not byte-identical to an earlier one
//! but would almost certainly produce the same outcome: re-forking the same
//! repository, re-reading the same file, searching for the same pattern with
//! a stray space. Each tool family has one rule deciding that; tools map to a
//! family either explicitly ([`SimilarityRegistry::assign`]) or through their
//! [`ToolKind`] in the catalog.
//!
//! New families register a rule instead of editing a branching chain:
//!
//! ```
//! use callguard::duplicate::rules::SimilarityRegistry;
//! use callguard::tools::args::{str_arg, PATH_KEYS};
//!
//! let mut registry = SimilarityRegistry::with_defaults();
//! registry.register_rule("deploy", |proposed, prior, _ctx| {
//!     (str_arg(proposed, PATH_KEYS) == str_arg(prior, PATH_KEYS))
//!         .then(|| "same deploy target".to_string())
//! });
//! registry.assign("deploy_site", "deploy");
//! assert_eq!(registry.family_tag("deploy_site", &Default::default()), Some("deploy"));
//! ```

use super::similarity::similarity;
use crate::tools::args::{self, str_arg, str_arg_or};
use crate::tools::catalog::{ToolCatalog, ToolKind};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub const SEARCH_FAMILY: &str = "search";
pub const FILE_ACCESS_FAMILY: &str = "file_access";
pub const FORK_FAMILY: &str = "fork";
pub const BRANCH_FAMILY: &str = "branch";

/// Settings a rule may consult.
#[derive(Debug, Clone)]
pub struct RuleContext {
    /// Similarity strictly above this counts as "near". Default: 0.9.
    pub threshold: f64,
    /// Branch assumed when a call omits one. Default: `"main"`.
    pub default_branch: String,
}

impl Default for RuleContext {
    fn default() -> Self {
        Self {
            threshold: 0.9,
            default_branch: "main".to_string(),
        }
    }
}

/// A near-duplicate rule. Returns a short description of why the two
/// argument mappings are near-duplicates, or `None` if they are not.
pub type SimilarityRule = Arc<dyn Fn(&Value, &Value, &RuleContext) -> Option<String> + Send + Sync>;

/// Registry from family tag to rule, plus explicit tool → family overrides.
#[derive(Clone, Default)]
pub struct SimilarityRegistry {
    rules: HashMap<String, SimilarityRule>,
    assignments: HashMap<String, String>,
}

impl fmt::Debug for SimilarityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut families: Vec<&String> = self.rules.keys().collect();
        families.sort();
        f.debug_struct("SimilarityRegistry")
            .field("families", &families)
            .field("assignments", &self.assignments)
            .finish()
    }
}

impl SimilarityRegistry {
    /// An empty registry: every call is either exact or novel.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the four built-in families.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_rule(SEARCH_FAMILY, search_rule);
        registry.register_rule(FILE_ACCESS_FAMILY, file_access_rule);
        registry.register_rule(FORK_FAMILY, fork_rule);
        registry.register_rule(BRANCH_FAMILY, branch_rule);
        registry
    }

    /// Register (or replace) the rule for a family tag.
    pub fn register_rule(
        &mut self,
        family: impl Into<String>,
        rule: impl Fn(&Value, &Value, &RuleContext) -> Option<String> + Send + Sync + 'static,
    ) {
        self.rules.insert(family.into(), Arc::new(rule));
    }

    /// Put `tool` in `family`, overriding the catalog-derived default.
    pub fn assign(&mut self, tool: impl Into<String>, family: impl Into<String>) {
        self.assignments.insert(tool.into(), family.into());
    }

    /// The family tag for `tool`, if it has a registered rule.
    pub fn family_tag<'a>(&'a self, tool: &str, catalog: &ToolCatalog) -> Option<&'a str> {
        let tag = match self.assignments.get(tool) {
            Some(tag) => tag.as_str(),
            None => match catalog.kind_of(tool) {
                ToolKind::Search => SEARCH_FAMILY,
                ToolKind::Read => FILE_ACCESS_FAMILY,
                ToolKind::Fork => FORK_FAMILY,
                ToolKind::Branch => BRANCH_FAMILY,
                _ => return None,
            },
        };
        self.rules.get_key_value(tag).map(|(k, _)| k.as_str())
    }

    /// The rule registered for a family tag.
    pub fn rule(&self, family: &str) -> Option<&SimilarityRule> {
        self.rules.get(family)
    }
}

// ── Built-in rules ─────────────────────────────────────────────────

fn same(a: &Value, b: &Value, keys: &[&str]) -> bool {
    str_arg(a, keys) == str_arg(b, keys)
}

fn same_branch(a: &Value, b: &Value, ctx: &RuleContext) -> bool {
    str_arg_or(a, args::BRANCH_KEYS, &ctx.default_branch)
        == str_arg_or(b, args::BRANCH_KEYS, &ctx.default_branch)
}

/// Same owner/repo/branch and a pattern within the similarity threshold.
fn search_rule(proposed: &Value, prior: &Value, ctx: &RuleContext) -> Option<String> {
    if !same(proposed, prior, args::OWNER_KEYS)
        || !same(proposed, prior, args::REPO_KEYS)
        || !same_branch(proposed, prior, ctx)
    {
        return None;
    }
    let a = str_arg(proposed, args::PATTERN_KEYS).unwrap_or_default();
    let b = str_arg(prior, args::PATTERN_KEYS).unwrap_or_default();
    let score = similarity(a, b);
    (score > ctx.threshold).then(|| {
        format!(
            "search pattern '{a}' is {:.0}% similar to earlier '{b}'",
            score * 100.0
        )
    })
}

/// Same owner/repo/path on the same branch.
fn file_access_rule(proposed: &Value, prior: &Value, ctx: &RuleContext) -> Option<String> {
    let path = str_arg(proposed, args::PATH_KEYS)?;
    let matches = same(proposed, prior, args::OWNER_KEYS)
        && same(proposed, prior, args::REPO_KEYS)
        && str_arg(prior, args::PATH_KEYS) == Some(path)
        && same_branch(proposed, prior, ctx);
    matches.then(|| {
        format!(
            "'{path}' on branch '{}' was already read",
            str_arg_or(proposed, args::BRANCH_KEYS, &ctx.default_branch)
        )
    })
}

/// Same owner/repo.
fn fork_rule(proposed: &Value, prior: &Value, _ctx: &RuleContext) -> Option<String> {
    let owner = str_arg(proposed, args::OWNER_KEYS)?;
    let repo = str_arg(proposed, args::REPO_KEYS)?;
    (same(proposed, prior, args::OWNER_KEYS) && same(proposed, prior, args::REPO_KEYS))
        .then(|| format!("{owner}/{repo} was already forked"))
}

/// Same repo and new branch name.
fn branch_rule(proposed: &Value, prior: &Value, _ctx: &RuleContext) -> Option<String> {
    let name = str_arg(proposed, args::NEW_BRANCH_KEYS)?;
    (same(proposed, prior, args::REPO_KEYS)
        && str_arg(prior, args::NEW_BRANCH_KEYS) == Some(name))
    .then(|| format!("branch '{name}' was already created"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check(family: &str, proposed: Value, prior: Value) -> Option<String> {
        let registry = SimilarityRegistry::with_defaults();
        let rule = registry.rule(family).unwrap();
        rule(&proposed, &prior, &RuleContext::default())
    }

    #[test]
    fn search_near_on_trivial_edit() {
        let hit = check(
            SEARCH_FAMILY,
            json!({"owner": "a", "repo": "b", "branch": "x", "pattern": "gemini-1.5 "}),
            json!({"owner": "a", "repo": "b", "branch": "x", "pattern": "gemini-1.5"}),
        );
        assert!(hit.unwrap().contains("similar"));
    }

    #[test]
    fn search_not_near_for_different_pattern() {
        let hit = check(
            SEARCH_FAMILY,
            json!({"owner": "a", "repo": "b", "pattern": "gemini"}),
            json!({"owner": "a", "repo": "b", "pattern": "redis-cache"}),
        );
        assert!(hit.is_none());
    }

    #[test]
    fn search_not_near_across_repos() {
        let hit = check(
            SEARCH_FAMILY,
            json!({"owner": "a", "repo": "b", "pattern": "TODO"}),
            json!({"owner": "a", "repo": "c", "pattern": "TODO"}),
        );
        assert!(hit.is_none());
    }

    #[test]
    fn search_missing_branch_means_default() {
        let hit = check(
            SEARCH_FAMILY,
            json!({"owner": "a", "repo": "b", "pattern": "TODO"}),
            json!({"owner": "a", "repo": "b", "branch": "main", "pattern": "todo"}),
        );
        assert!(hit.is_some());
    }

    #[test]
    fn file_access_branch_defaults_to_main() {
        let hit = check(
            FILE_ACCESS_FAMILY,
            json!({"owner": "a", "repo": "b", "path": "src/lib.rs"}),
            json!({"owner": "a", "repo": "b", "path": "src/lib.rs", "branch": "main"}),
        );
        assert!(hit.is_some());

        let miss = check(
            FILE_ACCESS_FAMILY,
            json!({"owner": "a", "repo": "b", "path": "src/lib.rs"}),
            json!({"owner": "a", "repo": "b", "path": "src/lib.rs", "branch": "dev"}),
        );
        assert!(miss.is_none());
    }

    #[test]
    fn fork_same_owner_repo() {
        assert!(
            check(
                FORK_FAMILY,
                json!({"owner": "acme", "repo": "widget", "organization": "me"}),
                json!({"owner": "acme", "repo": "widget"}),
            )
            .is_some()
        );
        assert!(
            check(
                FORK_FAMILY,
                json!({"owner": "acme", "repo": "gadget"}),
                json!({"owner": "acme", "repo": "widget"}),
            )
            .is_none()
        );
    }

    #[test]
    fn branch_same_repo_and_name_with_aliases() {
        assert!(
            check(
                BRANCH_FAMILY,
                json!({"repo": "widget", "branchName": "fix/x"}),
                json!({"repo": "widget", "branch": "fix/x", "from_branch": "main"}),
            )
            .is_some()
        );
        assert!(
            check(
                BRANCH_FAMILY,
                json!({"repo": "widget", "branchName": "fix/y"}),
                json!({"repo": "widget", "branchName": "fix/x"}),
            )
            .is_none()
        );
    }

    #[test]
    fn family_tag_from_catalog_and_overrides() {
        let catalog = ToolCatalog::default();
        let mut registry = SimilarityRegistry::with_defaults();
        assert_eq!(registry.family_tag("search_code", &catalog), Some(SEARCH_FAMILY));
        assert_eq!(registry.family_tag("get_file_contents", &catalog), Some(FILE_ACCESS_FAMILY));
        assert_eq!(registry.family_tag("edit_file", &catalog), None);
        assert_eq!(registry.family_tag("unknown", &catalog), None);

        registry.assign("edit_file", FILE_ACCESS_FAMILY);
        assert_eq!(registry.family_tag("edit_file", &catalog), Some(FILE_ACCESS_FAMILY));

        // Assignment to a family without a rule yields nothing.
        registry.assign("grep", "no_such_family");
        assert_eq!(registry.family_tag("grep", &catalog), None);
    }
}
