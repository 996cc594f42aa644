//! Events emitted by the [`Governor`](crate::governor::Governor).
//!
//! Every classification, recording, budget transition and pattern signal is
//! reported as a [`GovernanceEvent`]. Callers implement [`EventHandler`] to
//! observe them for logging, UI updates or metrics.
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests and embedded use |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FnEventHandler`] | Quick closures |
//! | [`CompositeEventHandler`] | Several handlers in order |

use crate::budget::BudgetTransition;
use crate::patterns::PatternWarning;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Events emitted while governing a session.
#[derive(Debug)]
pub enum GovernanceEvent<'a> {
    /// A call was classified before execution.
    CallProposed {
        tool: &'a str,
        args: &'a Value,
        classification: &'static str,
    },
    /// An exact duplicate was answered from history.
    ExactReplay { tool: &'a str, prior_calls: usize },
    /// A near-duplicate was flagged.
    NearDuplicate { tool: &'a str, message: &'a str },
    /// A call was appended to the history.
    CallRecorded {
        tool: &'a str,
        success: bool,
        redundant: bool,
        total_calls: usize,
    },
    /// The budget state advanced.
    BudgetTransition(&'a BudgetTransition),
    /// An inefficiency pattern fired.
    PatternWarning(&'a PatternWarning),
    /// The session hit a halt condition.
    Halt { reason: &'a str },
}

impl GovernanceEvent<'_> {
    /// The tool the event concerns, if any.
    pub fn tool(&self) -> Option<&str> {
        match self {
            GovernanceEvent::CallProposed { tool, .. }
            | GovernanceEvent::ExactReplay { tool, .. }
            | GovernanceEvent::NearDuplicate { tool, .. }
            | GovernanceEvent::CallRecorded { tool, .. } => Some(tool),
            _ => None,
        }
    }
}

/// Handler for governance events.
///
/// The default implementation ignores everything.
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &GovernanceEvent<'_>) {
        let _ = event;
    }
}

/// Ignores every event.
pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// An event handler backed by a closure.
///
/// ```
/// use callguard::events::{EventHandler, FnEventHandler, GovernanceEvent};
///
/// let handler = FnEventHandler::new(|event| {
///     if let GovernanceEvent::Halt { reason } = event {
///         eprintln!("{reason}");
///     }
/// });
/// handler.on_event(&GovernanceEvent::Halt { reason: "done" });
/// ```
pub struct FnEventHandler<F>(F)
where
    F: Fn(&GovernanceEvent<'_>) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&GovernanceEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&GovernanceEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &GovernanceEvent<'_>) {
        (self.0)(event)
    }
}

/// Dispatches every event to each inner handler in registration order.
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Add `handler` only when `condition` holds.
    pub fn with_if(self, condition: bool, handler: impl EventHandler + 'static) -> Self {
        if condition { self.with(handler) } else { self }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for CompositeEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for CompositeEventHandler {
    fn on_event(&self, event: &GovernanceEvent<'_>) {
        for handler in &self.handlers {
            handler.on_event(event);
        }
    }
}

/// Logs events via `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &GovernanceEvent<'_>) {
        match event {
            GovernanceEvent::CallProposed {
                tool,
                classification,
                ..
            } => {
                debug!("Proposed {tool}: {classification}");
            }
            GovernanceEvent::ExactReplay { tool, prior_calls } => {
                info!("Replaying cached result for {tool} ({prior_calls} prior call(s))");
            }
            GovernanceEvent::NearDuplicate { tool, message } => {
                info!("Near-duplicate {tool}: {message}");
            }
            GovernanceEvent::CallRecorded {
                tool,
                success,
                redundant,
                total_calls,
            } => {
                debug!(
                    "Recorded call #{total_calls}: {tool} (success={success}, redundant={redundant})"
                );
            }
            GovernanceEvent::BudgetTransition(t) => {
                warn!("Budget {} → {} at call {}", t.from, t.to, t.at_call);
            }
            GovernanceEvent::PatternWarning(w) => {
                warn!("[{}] {}", w.kind, w.message);
            }
            GovernanceEvent::Halt { reason } => {
                warn!("Halt: {reason}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::BudgetState;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn composite_dispatches_to_all() {
        let count = Arc::new(AtomicUsize::new(0));
        let a = count.clone();
        let b = count.clone();
        let handler = CompositeEventHandler::new()
            .with(FnEventHandler::new(move |_| {
                a.fetch_add(1, Ordering::SeqCst);
            }))
            .with(FnEventHandler::new(move |_| {
                b.fetch_add(10, Ordering::SeqCst);
            }))
            .with_if(false, NoopHandler);
        assert_eq!(handler.len(), 2);

        handler.on_event(&GovernanceEvent::Halt { reason: "x" });
        assert_eq!(count.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn logging_handler_accepts_every_variant() {
        let args = serde_json::json!({});
        let transition = BudgetTransition {
            from: BudgetState::WithinBudget,
            to: BudgetState::OverExpected,
            at_call: 9,
        };
        let handler = LoggingHandler;
        handler.on_event(&GovernanceEvent::CallProposed {
            tool: "t",
            args: &args,
            classification: "NOVEL",
        });
        handler.on_event(&GovernanceEvent::BudgetTransition(&transition));
        handler.on_event(&GovernanceEvent::Halt { reason: "r" });
    }

    #[test]
    fn tool_accessor() {
        assert_eq!(
            GovernanceEvent::ExactReplay {
                tool: "search_code",
                prior_calls: 1
            }
            .tool(),
            Some("search_code")
        );
        assert_eq!(GovernanceEvent::Halt { reason: "r" }.tool(), None);
    }
}
