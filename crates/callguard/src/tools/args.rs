//! Lenient accessors for tool argument mappings.
//!
//! Arguments are opaque JSON to the governor; no schema is required and a
//! missing key is never an error. These helpers pull out the handful of
//! fields the similarity rules and domain extraction care about, trying a
//! list of aliases because different tool providers spell the same field
//! differently (`branchName`, `branch_name`, `branch`).

use serde_json::Value;

pub const OWNER_KEYS: &[&str] = &["owner"];
pub const REPO_KEYS: &[&str] = &["repo", "repository"];
pub const PATH_KEYS: &[&str] = &["path", "file_path", "file"];
pub const BRANCH_KEYS: &[&str] = &["branch", "ref"];
pub const PATTERN_KEYS: &[&str] = &["pattern", "query", "q"];
pub const NEW_BRANCH_KEYS: &[&str] = &["branchName", "branch_name", "branch"];
pub const BASE_BRANCH_KEYS: &[&str] = &["baseBranch", "base_branch", "from_branch"];
pub const CONTENT_KEYS: &[&str] = &["content", "new_content"];

/// First non-empty string value among `keys`.
pub fn str_arg<'a>(args: &'a Value, keys: &[&str]) -> Option<&'a str> {
    let obj = args.as_object()?;
    keys.iter()
        .filter_map(|k| obj.get(*k).and_then(Value::as_str))
        .find(|v| !v.is_empty())
}

/// Same as [`str_arg`], but falls back to `default` when absent.
pub fn str_arg_or<'a>(args: &'a Value, keys: &[&str], default: &'a str) -> &'a str {
    str_arg(args, keys).unwrap_or(default)
}

/// First integer value among `keys`. Accepts numbers and numeric strings.
pub fn u64_arg(args: &Value, keys: &[&str]) -> Option<u64> {
    let obj = args.as_object()?;
    keys.iter().find_map(|k| match obj.get(*k)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn str_arg_tries_aliases_in_order() {
        let args = json!({"branch_name": "fix/x", "branch": "other"});
        assert_eq!(str_arg(&args, NEW_BRANCH_KEYS), Some("fix/x"));
    }

    #[test]
    fn str_arg_skips_empty_and_non_string() {
        let args = json!({"pattern": "", "query": 42, "q": "TODO"});
        assert_eq!(str_arg(&args, PATTERN_KEYS), Some("TODO"));
    }

    #[test]
    fn str_arg_on_non_object_is_none() {
        assert_eq!(str_arg(&json!("just a string"), PATH_KEYS), None);
        assert_eq!(str_arg(&Value::Null, PATH_KEYS), None);
    }

    #[test]
    fn str_arg_or_defaults() {
        let args = json!({"owner": "acme"});
        assert_eq!(str_arg_or(&args, BRANCH_KEYS, "main"), "main");
    }

    #[test]
    fn u64_arg_accepts_numeric_strings() {
        assert_eq!(u64_arg(&json!({"number": 7}), &["number"]), Some(7));
        assert_eq!(u64_arg(&json!({"number": "12"}), &["number"]), Some(12));
        assert_eq!(u64_arg(&json!({"number": "x"}), &["number"]), None);
    }
}
