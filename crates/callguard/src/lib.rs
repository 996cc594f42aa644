//! Tool-call governance for LLM agents.
//!
//! `callguard` sits between an agent loop and the tools it calls. It keeps an
//! append-only record of the session, recognizes repeated and near-repeated
//! calls before they run, counts calls against a budget tier, and watches the
//! call timeline for aimless exploration. Every recorded call yields one
//! [`GovernanceDecision`](decision::GovernanceDecision): continue, warn, or
//! halt.
//!
//! # Getting started
//!
//! ```
//! use callguard::prelude::*;
//! use serde_json::json;
//!
//! let mut governor = Governor::new(GovernorConfig::new().with_tier("simple_replace"));
//!
//! let args = json!({"owner": "acme", "repo": "widget", "pattern": "TODO"});
//! assert!(governor.propose_call("search_code", &args).is_novel());
//!
//! // ... execute the tool ...
//! let result = json!({"total_count": 1, "items": [{"path": "src/lib.rs"}]});
//! let decision = governor.record_completed_call("search_code", args.clone(), result, true);
//! assert!(decision.should_continue());
//!
//! // The same call again is answered from history.
//! assert!(governor.propose_call("search_code", &args).is_exact());
//! println!("{}", governor.render_state_block());
//! ```
//!
//! # Where to find things
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`session`] | [`SessionState`](session::SessionState), the append-only call history and domain view |
//! | [`duplicate`] | exact and near-duplicate classification, the similarity rule registry |
//! | [`budget`] | budget tiers, the monotonic budget state machine, reports |
//! | [`patterns`] | inefficiency patterns and the exploration ceiling |
//! | [`decision`] | [`GovernanceDecision`](decision::GovernanceDecision) and severities |
//! | [`governor`] | [`Governor`](governor::Governor) and [`SharedGovernor`](governor::SharedGovernor) |
//! | [`executor`] | [`GovernedExecutor`](executor::GovernedExecutor) running async tools under a governor |
//! | [`synthesis`] | the state-awareness text block |
//! | [`events`] | [`EventHandler`](events::EventHandler) and built-in handlers |
//! | [`config`] | [`GovernorConfig`](config::GovernorConfig), loadable from JSON |
//! | [`tools`] | tool names, the [`ToolCatalog`](tools::ToolCatalog), argument aliases |
//!
//! # Concurrency
//!
//! A [`Governor`](governor::Governor) observes calls in a strict total order.
//! Callers that execute tools concurrently share it through
//! [`SharedGovernor`](governor::SharedGovernor), which serializes proposals
//! and recordings behind one mutex while executions run in parallel.

pub mod budget;
pub mod config;
pub mod decision;
pub mod duplicate;
pub mod events;
pub mod executor;
pub mod governor;
pub mod patterns;
pub mod prelude;
pub mod session;
pub mod synthesis;
pub mod tools;
