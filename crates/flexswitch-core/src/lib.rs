//! # Flexswitch Core
//!
//! The configuration-graph engine for a software-programmable match-action
//! switch. This crate owns everything that lives *inside* one forwarding
//! configuration:
//!
//! - **`graph`**: the [`ConfigGraph`](graph::ConfigGraph) -- named pipelines of
//!   match tables, conditionals, and flex nodes -- plus the JSON loader and the
//!   in-place edit primitives used by incremental reconfiguration
//! - **`table`**: direct and indirect match tables with stable entry handles
//! - **`action_profile`**: shared member/group pools for indirect tables
//! - **`register`**: register, counter, and meter arrays, and parse value sets
//! - **`reconfig`**: the staged-edit protocol (`new_` / `old_` / `flx_` id
//!   discipline, flex-node triggers, plan scripts)
//!
//! The runtime layer (contexts, swap protocol, control-plane facade) lives in
//! the `flexswitch-runtime` crate and drives this one through the types
//! re-exported here.
//!
//! ## Design principles
//!
//! 1. **Structure is lock-free to read** -- graph topology only changes under
//!    the owning context's exclusive lock; readers never see half an edit
//! 2. **State is interior-mutable** -- entry, counter, meter, and register
//!    updates go through per-object locks so they can run under a *shared*
//!    context lock, concurrent with the data plane
//! 3. **Edits are named operations** -- every reconfiguration primitive is
//!    addressed by a prefixed id and validated before it touches the graph

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod action_profile;
pub mod crc;
pub mod graph;
pub mod lookup;
pub mod reconfig;
pub mod register;
pub mod table;

// Re-export key types
pub use graph::{ConfigGraph, Node, Pipeline};
pub use reconfig::EditSession;

/// Result type for flexswitch-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for flexswitch-core
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration loading or graph-structure errors
    #[error("config error: {0}")]
    Config(#[from] graph::ConfigError),

    /// Match-table and action-profile errors
    #[error("match error: {0}")]
    Match(#[from] table::MatchError),

    /// Register array errors
    #[error("register error: {0}")]
    Register(#[from] register::RegisterError),

    /// Counter array errors
    #[error("counter error: {0}")]
    Counter(#[from] register::CounterError),

    /// Meter array errors
    #[error("meter error: {0}")]
    Meter(#[from] register::MeterError),

    /// Parse value set errors
    #[error("parse vset error: {0}")]
    Vset(#[from] register::VsetError),

    /// CRC calculator errors
    #[error("crc error: {0}")]
    Crc(#[from] crc::CrcError),

    /// Incremental reconfiguration errors
    #[error("reconfig error: {0}")]
    Reconfig(#[from] reconfig::ReconfigError),
}
