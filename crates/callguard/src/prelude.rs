//! Convenience re-exports for common `callguard` types.
//!
//! ```
//! use callguard::prelude::*;
//! ```
//!
//! Rule closures, canonicalization helpers and tier constants are left out;
//! import those from their modules.

// ── Governing ───────────────────────────────────────────────────────
pub use crate::config::GovernorConfig;
pub use crate::decision::{GovernanceDecision, Severity};
pub use crate::duplicate::Classification;
pub use crate::governor::{Governor, SharedGovernor};

// ── Budget and patterns ─────────────────────────────────────────────
pub use crate::budget::{BudgetReport, BudgetState, BudgetTier, CallMetrics, TierRegistry};
pub use crate::patterns::{PatternConfig, PatternKind};

// ── Session ─────────────────────────────────────────────────────────
pub use crate::session::{RepoRef, SessionState, ToolCallRecord};

// ── Execution and events ────────────────────────────────────────────
pub use crate::events::{
    CompositeEventHandler, EventHandler, FnEventHandler, GovernanceEvent, LoggingHandler,
    NoopHandler,
};
pub use crate::executor::{
    CallSource, FnTool, GovernedCall, GovernedExecutor, NearPolicy, Tool, ToolFuture, ToolOutput,
    ToolSet,
};
pub use crate::tools::{ToolCatalog, ToolKind};
