//! Governed tool execution.
//!
//! [`GovernedExecutor`] wires a [`ToolSet`] to a [`SharedGovernor`] so the
//! propose → execute → record protocol cannot be skipped:
//!
//! 1. the call is proposed; an exact duplicate returns the cached result
//!    without executing,
//! 2. a near-duplicate is executed or skipped according to [`NearPolicy`],
//! 3. after a halt, non-terminal tools are refused (unless enforcement is
//!    off),
//! 4. the tool runs (with an optional timeout) and the outcome is recorded.
//!
//! [`GovernedExecutor::call_batch`] runs several tools concurrently while
//! keeping proposals and recordings in input order.

use crate::decision::GovernanceDecision;
use crate::duplicate::Classification;
use crate::duplicate::canonical::canonical_string;
use crate::governor::{Governor, SharedGovernor};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What a tool produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub result: Value,
    pub success: bool,
}

impl ToolOutput {
    pub fn ok(result: Value) -> Self {
        Self {
            result,
            success: true,
        }
    }

    /// A failed call whose result is an `"Error: ..."` string.
    pub fn error(message: impl fmt::Display) -> Self {
        Self {
            result: Value::String(format!("Error: {message}")),
            success: false,
        }
    }
}

/// Boxed future returned by [`Tool::execute`].
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = ToolOutput> + Send + 'a>>;

/// A tool the executor can run.
///
/// Failures are reported through [`ToolOutput::success`], never by panicking.
pub trait Tool: Send + Sync {
    fn name(&self) -> String;

    fn execute(&self, args: &Value) -> ToolFuture<'_>;
}

/// A [`Tool`] backed by an async closure.
pub struct FnTool<F> {
    name: String,
    f: F,
}

impl<F, Fut> FnTool<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = ToolOutput> + Send + 'static,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F, Fut> Tool for FnTool<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = ToolOutput> + Send + 'static,
{
    fn name(&self) -> String {
        self.name.clone()
    }

    fn execute(&self, args: &Value) -> ToolFuture<'_> {
        Box::pin((self.f)(args.clone()))
    }
}

/// Tools dispatched by name.
#[derive(Default)]
pub struct ToolSet {
    tools: HashMap<String, Box<dyn Tool>>,
    /// `None` disables timeouts.
    default_timeout: Option<Duration>,
}

impl fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolSet")
            .field("tools", &self.names())
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.tools.insert(tool.name(), Box::new(tool));
    }

    pub fn with(mut self, tool: impl Tool + 'static) -> Self {
        self.register(tool);
        self
    }

    pub fn with_if(self, condition: bool, tool: impl Tool + 'static) -> Self {
        if condition { self.with(tool) } else { self }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run a tool by name. Unknown tools and timeouts become failed outputs.
    pub async fn execute(&self, name: &str, args: &Value) -> ToolOutput {
        let Some(tool) = self.tools.get(name) else {
            return ToolOutput::error(format!("unknown tool '{name}'"));
        };
        let start = std::time::Instant::now();
        let output = match self.default_timeout {
            Some(limit) => match tokio::time::timeout(limit, tool.execute(args)).await {
                Ok(output) => output,
                Err(_) => {
                    info!("Tool {name} timed out after {:.1}s", limit.as_secs_f64());
                    ToolOutput::error(format!(
                        "tool '{name}' timed out after {:.0} seconds",
                        limit.as_secs_f64()
                    ))
                }
            },
            None => tool.execute(args).await,
        };
        debug!(
            "Tool {name} completed in {:.0}ms (success={})",
            start.elapsed().as_secs_f64() * 1000.0,
            output.success
        );
        output
    }
}

/// What to do with a near-duplicate call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NearPolicy {
    /// Execute it and pass the advisory along.
    #[default]
    Proceed,
    /// Return the earlier similar call's result without executing.
    Skip,
}

/// Where a [`GovernedCall`]'s result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallSource {
    /// The tool ran and the call was recorded.
    Executed,
    /// Exact duplicate: the first identical call's result.
    Cached,
    /// Near-duplicate skipped under [`NearPolicy::Skip`].
    Skipped,
    /// Refused after a halt.
    Refused,
}

/// Outcome of one governed call.
#[derive(Debug, Clone, PartialEq)]
pub struct GovernedCall {
    pub tool: String,
    pub result: Value,
    pub success: bool,
    pub source: CallSource,
    /// Near-duplicate or refusal text for the agent.
    pub advisory: Option<String>,
    /// The governor's decision after this call.
    pub decision: GovernanceDecision,
}

/// Outcome of the pre-execution step.
enum Plan {
    Done(GovernedCall),
    Execute { advisory: Option<String> },
}

enum BatchStep {
    Planned(Plan),
    /// Identical to the batch entry at this position, which executes.
    SameAs(usize),
}

/// Runs tools under a governor.
pub struct GovernedExecutor {
    governor: SharedGovernor,
    tools: ToolSet,
    near_policy: NearPolicy,
    enforce_halt: bool,
}

impl GovernedExecutor {
    pub fn new(governor: impl Into<SharedGovernor>, tools: ToolSet) -> Self {
        Self {
            governor: governor.into(),
            tools,
            near_policy: NearPolicy::default(),
            enforce_halt: true,
        }
    }

    pub fn with_near_policy(mut self, policy: NearPolicy) -> Self {
        self.near_policy = policy;
        self
    }

    /// Whether a halt refuses further non-terminal calls. Default: `true`.
    pub fn with_halt_enforcement(mut self, enforce: bool) -> Self {
        self.enforce_halt = enforce;
        self
    }

    pub fn governor(&self) -> &SharedGovernor {
        &self.governor
    }

    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }

    /// Propose, execute if needed, and record one call.
    pub async fn call(&self, tool: &str, args: Value) -> GovernedCall {
        let advisory = match self.plan(tool, &args) {
            Plan::Done(call) => return call,
            Plan::Execute { advisory } => advisory,
        };
        let output = self.tools.execute(tool, &args).await;
        self.record(tool, args, output, advisory)
    }

    /// Run several calls. Proposals and recordings happen in input order;
    /// the executions run concurrently.
    ///
    /// An entry identical to an earlier entry of the same batch does not
    /// run: it gets that entry's output as a [`CallSource::Cached`] result.
    pub async fn call_batch(&self, calls: Vec<(String, Value)>) -> Vec<GovernedCall> {
        let steps = self.plan_batch(&calls);

        let positions: Vec<usize> = steps
            .iter()
            .enumerate()
            .filter(|(_, step)| matches!(step, BatchStep::Planned(Plan::Execute { .. })))
            .map(|(i, _)| i)
            .collect();
        let pending = positions
            .iter()
            .map(|&i| self.tools.execute(&calls[i].0, &calls[i].1));
        let outputs = futures::future::join_all(pending).await;
        let outputs: HashMap<usize, ToolOutput> = positions.into_iter().zip(outputs).collect();
        let output_at = |i: usize| {
            outputs
                .get(&i)
                .cloned()
                .unwrap_or_else(|| ToolOutput::error("tool produced no output"))
        };

        let mut results = Vec::with_capacity(calls.len());
        for (i, ((tool, args), step)) in calls.into_iter().zip(steps).enumerate() {
            match step {
                BatchStep::Planned(Plan::Done(call)) => results.push(call),
                BatchStep::Planned(Plan::Execute { advisory }) => {
                    results.push(self.record(&tool, args, output_at(i), advisory));
                }
                BatchStep::SameAs(first) => {
                    debug!(tool = %tool, first, "Reusing output of identical call in batch");
                    let output = output_at(first);
                    results.push(GovernedCall {
                        tool,
                        result: output.result,
                        success: output.success,
                        source: CallSource::Cached,
                        advisory: None,
                        decision: self.governor.decision(),
                    });
                }
            }
        }
        results
    }

    fn plan_batch(&self, calls: &[(String, Value)]) -> Vec<BatchStep> {
        let mut planned: HashMap<(&str, String), usize> = HashMap::new();
        let mut steps = Vec::with_capacity(calls.len());
        for (i, (tool, args)) in calls.iter().enumerate() {
            let key = (tool.as_str(), canonical_string(args));
            if let Some(&first) = planned.get(&key) {
                steps.push(BatchStep::SameAs(first));
                continue;
            }
            let plan = self.plan(tool, args);
            if matches!(plan, Plan::Execute { .. }) {
                planned.insert(key, i);
            }
            steps.push(BatchStep::Planned(plan));
        }
        steps
    }

    fn plan(&self, tool: &str, args: &Value) -> Plan {
        let mut governor = self.governor.lock();
        match governor.propose_call(tool, args) {
            Classification::Exact {
                result,
                prior_calls,
                index,
            } => {
                debug!(tool, prior_calls, "Serving cached result");
                let success = governor
                    .state()
                    .history()
                    .get(index)
                    .is_none_or(|r| r.success);
                Plan::Done(GovernedCall {
                    tool: tool.to_string(),
                    result,
                    success,
                    source: CallSource::Cached,
                    advisory: None,
                    decision: governor.decision().clone(),
                })
            }
            Classification::Near { message, index, .. } => match self.near_policy {
                NearPolicy::Skip => {
                    let (result, success) = governor
                        .state()
                        .history()
                        .get(index)
                        .map_or((Value::Null, true), |r| (r.result.clone(), r.success));
                    Plan::Done(GovernedCall {
                        tool: tool.to_string(),
                        result,
                        success,
                        source: CallSource::Skipped,
                        advisory: Some(message),
                        decision: governor.decision().clone(),
                    })
                }
                NearPolicy::Proceed => self.halt_gate(&governor, tool, Some(message)),
            },
            Classification::Novel => self.halt_gate(&governor, tool, None),
        }
    }

    fn halt_gate(&self, governor: &Governor, tool: &str, advisory: Option<String>) -> Plan {
        let decision = governor.decision();
        if !(self.enforce_halt && decision.is_halt() && !governor.is_terminal(tool)) {
            return Plan::Execute { advisory };
        }
        let reason = decision.message().unwrap_or("session halted");
        warn!(tool, "Refusing exploratory call after halt");
        Plan::Done(GovernedCall {
            tool: tool.to_string(),
            result: Value::String(format!(
                "Error: call refused. {reason} Only decisive actions \
                 (edit, commit, pull request) are allowed now."
            )),
            success: false,
            source: CallSource::Refused,
            advisory: Some(reason.to_string()),
            decision: decision.clone(),
        })
    }

    fn record(
        &self,
        tool: &str,
        args: Value,
        output: ToolOutput,
        advisory: Option<String>,
    ) -> GovernedCall {
        let decision = self.governor.record_completed_call(
            tool,
            args,
            output.result.clone(),
            output.success,
        );
        GovernedCall {
            tool: tool.to_string(),
            result: output.result,
            success: output.success,
            source: CallSource::Executed,
            advisory,
            decision,
        }
    }
}
