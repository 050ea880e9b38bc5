//! # Incremental reconfiguration
//!
//! Fine-grained graph surgery on a live configuration without quiescing the
//! data plane. New graph material is staged in a side [`ConfigGraph`] and
//! referenced through a prefixed-id discipline:
//!
//! - `new_<name>` -- an object from the staging graph; must be inserted
//!   before its first reference
//! - `old_<name>` -- an object already present in the live graph; the suffix
//!   is used verbatim
//! - `flx_<name>` -- a flex node created by the reconfiguration layer
//! - `null` -- a terminal (no successor)
//!
//! Edits that have not flipped a flex trigger are invisible to packets:
//! they only touch nodes unreachable from the live init. The trigger is the
//! single pivot that makes a group of staged edits observable, and it flips
//! under the owning context's exclusive lock so a packet sees the whole old
//! graph or the whole new graph, never a mixture.
//!
//! [`EditSession`] carries the staging graph and the id map for one edit
//! sequence; [`plan`] parses and applies the line-oriented plan scripts the
//! control plane ships whole sequences in.

pub mod plan;
pub mod session;

// Re-export key types
pub use plan::{apply_plan, parse_plan, PlanCommand};
pub use session::{EditSession, RegisterChange};

use crate::graph::ConfigError;

/// Errors from reconfiguration primitives and plan scripts.
#[derive(Debug, thiserror::Error)]
pub enum ReconfigError {
    /// The id carries none of the `new_` / `old_` / `flx_` prefixes.
    #[error("id '{0}' has no recognized prefix")]
    Prefix(String),

    /// A `new_` / `flx_` id was inserted twice.
    #[error("duplicate staged id: {0}")]
    DuplicateId(String),

    /// A `new_` / `flx_` id was referenced before being inserted.
    #[error("staged id not found: {0}")]
    UnknownId(String),

    /// The staging configuration failed to build.
    #[error("staging config rejected: {0}")]
    Staging(#[source] ConfigError),

    /// A primitive failed against the live graph.
    #[error(transparent)]
    Graph(#[from] ConfigError),

    /// A malformed plan line, change type, or mount-point tag.
    #[error("invalid reconfiguration command: {0}")]
    InvalidCommand(String),

    /// A named hash calculation referenced by an edit does not exist.
    #[error("hash function not found: {0}")]
    HashFunctionNotFound(String),
}
