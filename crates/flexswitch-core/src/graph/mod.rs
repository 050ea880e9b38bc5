//! # Configuration graph
//!
//! One [`ConfigGraph`] is one complete forwarding configuration: a set of
//! named [`Pipeline`]s -- each a directed graph of [`Node`]s with a
//! distinguished init node -- plus every named stateful object the
//! configuration declares (register/counter/meter arrays, parse value sets,
//! action profiles, CRC calculators, extern instances, learn lists) and the
//! header layout used for required-field validation.
//!
//! ## Mutability contract
//!
//! - Graph *structure* (nodes, successor edges, init pointers, the object
//!   maps themselves) only changes through the `&mut self` edit primitives,
//!   which the owning context calls under its exclusive lock.
//! - Object *state* (entries, counters, meter rates, register cells) is
//!   interior-mutable and safe to touch under the shared lock.
//!
//! A packet walking a pipeline under the shared lock therefore sees either
//! none or all of an edit group; the flex-trigger flip is the single pivot
//! that makes staged structure reachable.

pub mod config;
pub mod load;
pub mod node;
pub mod pipeline;

// Re-export key types
pub use config::{
    ConfigError, ConfigGraph, ExternInstance, FieldList, HeaderField, LearnList,
};
pub use load::{load_config, ArithSpec};
pub use node::{BranchNode, FlexNode, Node, NodeKind, TableNode};
pub use pipeline::{Decision, Pipeline};
