//! Tool vocabulary shared by every detector.
//!
//! - [`names`]: the default tool names.
//! - [`catalog`]: [`ToolCatalog`](catalog::ToolCatalog), mapping tool names
//!   to a [`ToolKind`](catalog::ToolKind).
//! - [`args`]: alias-aware argument readers (`repo` / `repository`,
//!   `pattern` / `query` / `q`, ...).

pub mod args;
pub mod catalog;
pub mod names;

pub use catalog::{ToolCatalog, ToolKind};
