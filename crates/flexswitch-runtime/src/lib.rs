//! # Flexswitch Runtime
//!
//! The switch runtime around the `flexswitch-core` configuration engine:
//!
//! - **[`Context`]**: a switch-within-the-switch owning one live
//!   configuration, a staged replacement, and an in-progress edit session,
//!   behind one reader-writer lock
//! - **[`SwitchCore`]**: the context fleet, the process-wide packet-inflight
//!   barrier, switch-global component registries, and swap orchestration
//! - **[`RuntimeControl`]**: the uniform control-plane facade; every call is
//!   `(context_id, operation, args)` and delegates into the addressed
//!   context
//! - **[`notify`]**: swap-status notifications over a message transport
//! - **[`snapshot`]**: the versioned state envelope behind
//!   `serialize`/`deserialize`
//!
//! ## Concurrency model
//!
//! Data-plane workers take a context's shared lock to walk its live graph;
//! control-plane table operations do the same and go through per-object
//! interior locks. Structure edits and swaps take the exclusive side. A full
//! config swap additionally takes the write side of the packet-inflight
//! barrier, whose read side every [`Packet`] holds for its lifetime, so no
//! packet exists anywhere in the switch while live graphs are replaced.

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod context;
pub mod notify;
pub mod packet;
pub mod registry;
pub mod runtime;
pub mod snapshot;
pub mod switch;
pub mod target;

// Re-export key types
pub use context::{Context, ContextId, DeviceId, ExternLease};
pub use packet::Packet;
pub use runtime::RuntimeControl;
pub use switch::{SwapOutcome, SwitchCore};
pub use target::SwitchTarget;

/// Result type for flexswitch-runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for flexswitch-runtime
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The addressed context id does not exist.
    #[error("switch error: {0}")]
    Switch(#[from] switch::SwitchError),

    /// Swap protocol errors.
    #[error("swap error: {0}")]
    Swap(#[from] switch::SwapError),

    /// State persistence errors.
    #[error("state error: {0}")]
    State(#[from] snapshot::StateError),

    /// Match-table and action-profile errors.
    #[error("match error: {0}")]
    Match(#[from] flexswitch_core::table::MatchError),

    /// Configuration loading errors.
    #[error("config error: {0}")]
    Config(#[from] flexswitch_core::graph::ConfigError),

    /// Incremental reconfiguration errors.
    #[error("reconfig error: {0}")]
    Reconfig(#[from] flexswitch_core::reconfig::ReconfigError),

    /// Register array errors.
    #[error("register error: {0}")]
    Register(#[from] flexswitch_core::register::RegisterError),

    /// Counter array errors.
    #[error("counter error: {0}")]
    Counter(#[from] flexswitch_core::register::CounterError),

    /// Meter array errors.
    #[error("meter error: {0}")]
    Meter(#[from] flexswitch_core::register::MeterError),

    /// Parse value set errors.
    #[error("parse vset error: {0}")]
    Vset(#[from] flexswitch_core::register::VsetError),

    /// CRC calculator errors.
    #[error("crc error: {0}")]
    Crc(#[from] flexswitch_core::crc::CrcError),
}
