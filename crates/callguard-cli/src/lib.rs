//! Offline replay of recorded agent sessions through `callguard`.
//!
//! The `callguard` binary reads a transcript of tool calls an agent made and
//! feeds it through a [`Governor`](callguard::governor::Governor), showing
//! where the duplicates, budget transitions, warnings and halts would have
//! fired.

pub mod logging;
pub mod replay;
pub mod transcript;
