use callguard::prelude::*;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A tool that counts executions and echoes its arguments.
fn counting(name: &str, count: Arc<AtomicUsize>) -> impl Tool + 'static {
    let tool_name = name.to_string();
    FnTool::new(name, move |args: Value| {
        let count = count.clone();
        let tool_name = tool_name.clone();
        async move {
            count.fetch_add(1, Ordering::SeqCst);
            ToolOutput::ok(json!({ "tool": tool_name, "args": args }))
        }
    })
}

fn executor_with(names: &[&str], count: &Arc<AtomicUsize>) -> GovernedExecutor {
    let mut tools = ToolSet::new();
    for name in names {
        tools.register(counting(name, count.clone()));
    }
    GovernedExecutor::new(Governor::default(), tools)
}

#[tokio::test]
async fn exact_duplicate_is_served_from_cache() {
    let count = Arc::new(AtomicUsize::new(0));
    let exec = executor_with(&["search_code"], &count);
    let args = json!({"owner": "acme", "repo": "widget", "pattern": "TODO"});

    let first = exec.call("search_code", args.clone()).await;
    assert_eq!(first.source, CallSource::Executed);
    assert!(first.success);

    let second = exec.call("search_code", json!({"pattern": "TODO", "repo": "widget", "owner": "acme"})).await;
    assert_eq!(second.source, CallSource::Cached);
    assert_eq!(second.result, first.result);
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(exec.governor().lock().state().call_count(), 1);
}

#[tokio::test]
async fn near_duplicate_proceeds_with_advisory_by_default() {
    let count = Arc::new(AtomicUsize::new(0));
    let exec = executor_with(&["fork_repository"], &count);
    exec.governor().lock().record_fork("acme", "widget");

    let call = exec.call("fork_repository", json!({"owner": "acme", "repo": "widget"})).await;
    assert_eq!(call.source, CallSource::Executed);
    assert!(call.advisory.unwrap().contains("already forked"));
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn near_duplicate_skipped_under_skip_policy() {
    let count = Arc::new(AtomicUsize::new(0));
    let exec = executor_with(&["search_code"], &count).with_near_policy(NearPolicy::Skip);

    exec.call("search_code", json!({"owner": "a", "repo": "b", "pattern": "gemini-1.5"})).await;
    let call = exec
        .call("search_code", json!({"owner": "a", "repo": "b", "pattern": "gemini-1.5 "}))
        .await;
    assert_eq!(call.source, CallSource::Skipped);
    assert!(call.advisory.is_some());
    assert_eq!(call.result["args"]["pattern"], "gemini-1.5");
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

async fn drive_to_halt(exec: &GovernedExecutor) {
    for i in 0..16 {
        let call = exec.call("get_repository_tree", json!({"path": format!("d{i}")})).await;
        assert_eq!(call.source, CallSource::Executed);
    }
    assert!(exec.governor().decision().is_halt());
}

#[tokio::test]
async fn halt_refuses_exploration_but_allows_decisive_actions() {
    let count = Arc::new(AtomicUsize::new(0));
    let exec = executor_with(&["get_repository_tree", "edit_file"], &count);
    drive_to_halt(&exec).await;

    let refused = exec.call("get_repository_tree", json!({"path": "more"})).await;
    assert_eq!(refused.source, CallSource::Refused);
    assert!(!refused.success);
    assert!(refused.result.as_str().unwrap().starts_with("Error: call refused"));
    assert_eq!(count.load(Ordering::SeqCst), 16);
    assert_eq!(exec.governor().lock().state().call_count(), 16);

    let edit = exec.call("edit_file", json!({"path": "src/lib.rs", "content": "x"})).await;
    assert_eq!(edit.source, CallSource::Executed);
    assert_eq!(count.load(Ordering::SeqCst), 17);
}

#[tokio::test]
async fn halt_enforcement_can_be_disabled() {
    let count = Arc::new(AtomicUsize::new(0));
    let exec = executor_with(&["get_repository_tree"], &count).with_halt_enforcement(false);
    drive_to_halt(&exec).await;

    let call = exec.call("get_repository_tree", json!({"path": "more"})).await;
    assert_eq!(call.source, CallSource::Executed);
    assert!(call.decision.is_halt());
}

#[tokio::test]
async fn unknown_tool_is_recorded_as_failure() {
    let count = Arc::new(AtomicUsize::new(0));
    let exec = executor_with(&[], &count);
    let call = exec.call("nope", json!({})).await;
    assert_eq!(call.source, CallSource::Executed);
    assert!(!call.success);
    let governor = exec.governor().lock();
    assert_eq!(governor.state().call_count(), 1);
    assert!(!governor.state().history()[0].success);
}

#[tokio::test]
async fn batch_executes_concurrently_and_records_in_order() {
    let barrier = Arc::new(tokio::sync::Barrier::new(3));
    let b = barrier.clone();
    let tools = ToolSet::new()
        .with_default_timeout(Some(Duration::from_secs(5)))
        .with(FnTool::new("read_file", move |args: Value| {
            let b = b.clone();
            async move {
                // Completes only if all three reads are in flight at once.
                b.wait().await;
                ToolOutput::ok(args["path"].clone())
            }
        }));
    let exec = GovernedExecutor::new(Governor::default(), tools);

    let calls: Vec<(String, Value)> = ["a", "b", "c"]
        .iter()
        .map(|p| ("read_file".to_string(), json!({ "path": p })))
        .collect();
    let results = exec.call_batch(calls).await;

    assert_eq!(results.len(), 3);
    for (result, expected) in results.iter().zip(["a", "b", "c"]) {
        assert!(result.success, "{result:?}");
        assert_eq!(result.result, json!(expected));
    }
    let governor = exec.governor().lock();
    let recorded: Vec<&Value> = governor.state().history().iter().map(|r| &r.args["path"]).collect();
    assert_eq!(recorded, vec![&json!("a"), &json!("b"), &json!("c")]);
}

#[tokio::test]
async fn batch_mixes_cached_and_executed() {
    let count = Arc::new(AtomicUsize::new(0));
    let exec = executor_with(&["read_file"], &count);
    exec.call("read_file", json!({"path": "a"})).await;

    let results = exec
        .call_batch(vec![
            ("read_file".to_string(), json!({"path": "a"})),
            ("read_file".to_string(), json!({"path": "b"})),
        ])
        .await;
    assert_eq!(results[0].source, CallSource::Cached);
    assert_eq!(results[1].source, CallSource::Executed);
    assert_eq!(results[1].result["args"]["path"], "b");
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn cached_failure_stays_a_failure() {
    let count = Arc::new(AtomicUsize::new(0));
    let failures = count.clone();
    let tools = ToolSet::new().with(FnTool::new("fork_repository", move |_| {
        let failures = failures.clone();
        async move {
            failures.fetch_add(1, Ordering::SeqCst);
            ToolOutput::error("404 not found")
        }
    }));
    let exec = GovernedExecutor::new(Governor::default(), tools);
    let args = json!({"owner": "acme", "repo": "widget"});

    let first = exec.call("fork_repository", args.clone()).await;
    assert_eq!(first.source, CallSource::Executed);
    assert!(!first.success);

    let second = exec.call("fork_repository", args).await;
    assert_eq!(second.source, CallSource::Cached);
    assert!(!second.success);
    assert_eq!(second.result, json!("Error: 404 not found"));
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn identical_calls_in_one_batch_execute_once() {
    let count = Arc::new(AtomicUsize::new(0));
    let exec = executor_with(&["fork_repository"], &count);

    let results = exec
        .call_batch(vec![
            ("fork_repository".to_string(), json!({"owner": "acme", "repo": "widget"})),
            ("fork_repository".to_string(), json!({"repo": "widget", "owner": "acme"})),
        ])
        .await;
    let sources: Vec<CallSource> = results.iter().map(|r| r.source).collect();
    assert_eq!(sources, vec![CallSource::Executed, CallSource::Cached]);
    assert_eq!(results[1].result, results[0].result);
    assert!(results[1].success);
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(exec.governor().lock().state().call_count(), 1);
}
