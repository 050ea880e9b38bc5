//! Pipeline node variants.
//!
//! Each node is a tagged variant with successor edges typed by variant: a
//! table routes by action/"next" label, a conditional by its predicate, and
//! a flex node by its trigger state. An absent successor is a terminal
//! (the packet leaves the pipeline).

use std::fmt;

use fxhash::FxHashMap;
use smallvec::SmallVec;

use crate::table::MatchTable;

/// Discriminant of a [`Node`], used where an operation only applies to one
/// variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Match-table node.
    Table,
    /// Conditional node.
    Conditional,
    /// Flex node (reconfiguration-injected conditional).
    Flex,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Table => write!(f, "table"),
            NodeKind::Conditional => write!(f, "conditional"),
            NodeKind::Flex => write!(f, "flex"),
        }
    }
}

/// A table node: the match table plus its labeled successor edges.
#[derive(Debug)]
pub struct TableNode {
    /// The table state.
    pub table: MatchTable,
    /// Successor per action/"next" label. `None` values are terminals.
    pub next: FxHashMap<String, Option<String>>,
}

/// A conditional node: a predicate with true/false successors.
///
/// The predicate itself is opaque to the core; the executor evaluates the
/// expression text against the packet.
#[derive(Debug, Clone)]
pub struct BranchNode {
    /// Node name.
    pub name: String,
    /// Predicate source, as carried by the configuration.
    pub expression: Option<String>,
    /// Successor when the predicate holds.
    pub true_next: Option<String>,
    /// Successor when it does not.
    pub false_next: Option<String>,
}

/// A flex node: a conditional injected by incremental reconfiguration whose
/// predicate is its own trigger state.
///
/// While armed, packets take `true_next` (the staged path); while disarmed,
/// `false_next` (the original path). Arming happens under the owning
/// context's exclusive lock, so a packet in flight observes one coherent
/// setting.
#[derive(Debug, Clone)]
pub struct FlexNode {
    /// Node name.
    pub name: String,
    /// Successor while armed.
    pub true_next: Option<String>,
    /// Successor while disarmed.
    pub false_next: Option<String>,
    /// Trigger state.
    pub armed: bool,
    /// Mount-point tag for selective triggering, when the node was created
    /// with one.
    pub mount_point: Option<u32>,
}

/// A pipeline node.
#[derive(Debug)]
pub enum Node {
    /// Match-table node.
    Table(TableNode),
    /// Conditional node.
    Conditional(BranchNode),
    /// Flex node.
    Flex(FlexNode),
}

impl Node {
    /// Node name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Node::Table(t) => t.table.name(),
            Node::Conditional(c) => &c.name,
            Node::Flex(x) => &x.name,
        }
    }

    /// Node kind.
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Table(_) => NodeKind::Table,
            Node::Conditional(_) => NodeKind::Conditional,
            Node::Flex(_) => NodeKind::Flex,
        }
    }

    /// Every successor target, for edge validation. Terminals are skipped.
    /// `SmallVec` keeps the common few-successor case off the heap.
    #[must_use]
    pub fn successors(&self) -> SmallVec<[&str; 4]> {
        let mut out = SmallVec::new();
        match self {
            Node::Table(t) => {
                for target in t.next.values().flatten() {
                    out.push(target.as_str());
                }
            }
            Node::Conditional(c) => {
                out.extend(c.true_next.as_deref());
                out.extend(c.false_next.as_deref());
            }
            Node::Flex(x) => {
                out.extend(x.true_next.as_deref());
                out.extend(x.false_next.as_deref());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::DefaultLookupFactory;
    use crate::table::{MatchKind, TableDecl, TableKind};

    #[test]
    fn successors_cover_all_variants() {
        let table = MatchTable::new(
            TableDecl {
                name: "t".to_string(),
                kind: TableKind::Direct,
                match_kind: MatchKind::Exact,
                actions: vec!["a".to_string()],
                profile: None,
                with_counters: false,
                with_meters: false,
            },
            &DefaultLookupFactory,
        );
        let mut next = FxHashMap::default();
        next.insert("a".to_string(), Some("t2".to_string()));
        next.insert("miss".to_string(), None);
        let node = Node::Table(TableNode { table, next });
        assert_eq!(node.successors().as_slice(), ["t2"]);
        assert_eq!(node.kind(), NodeKind::Table);

        let cond = Node::Conditional(BranchNode {
            name: "c".to_string(),
            expression: None,
            true_next: Some("x".to_string()),
            false_next: None,
        });
        assert_eq!(cond.successors().as_slice(), ["x"]);

        let flex = Node::Flex(FlexNode {
            name: "f".to_string(),
            true_next: Some("x".to_string()),
            false_next: Some("y".to_string()),
            armed: false,
            mount_point: Some(3),
        });
        assert_eq!(flex.successors().as_slice(), ["x", "y"]);
    }
}
