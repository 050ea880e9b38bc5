//! Named pipelines: a node table plus a distinguished init node.

use fxhash::FxHashMap;

use super::config::ConfigError;
use super::node::{Node, NodeKind};

/// How a walk resolves the successor of a node it cannot decide itself.
///
/// Flex nodes are never asked: their trigger state decides for them.
#[derive(Debug, Clone)]
pub enum Decision {
    /// For a table node: the action/"next" label the lookup resolved to.
    Label(String),
    /// For a conditional node: the predicate outcome.
    Branch(bool),
}

/// A named directed graph of nodes with an init node.
#[derive(Debug)]
pub struct Pipeline {
    name: String,
    init: Option<String>,
    nodes: FxHashMap<String, Node>,
}

impl Pipeline {
    /// Creates an empty pipeline.
    #[must_use]
    pub fn new(name: String) -> Self {
        Pipeline {
            name,
            init: None,
            nodes: FxHashMap::default(),
        }
    }

    /// Pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the init node, when set.
    #[must_use]
    pub fn init(&self) -> Option<&str> {
        self.init.as_deref()
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Looks a node up by name.
    #[must_use]
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    /// Looks a node up mutably by name.
    pub fn node_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.nodes.get_mut(name)
    }

    /// Iterates every node.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Iterates every node mutably.
    pub(crate) fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.values_mut()
    }

    /// Adds a node.
    ///
    /// # Errors
    ///
    /// `DuplicateObject` when a node of this name exists.
    pub fn add_node(&mut self, node: Node) -> Result<(), ConfigError> {
        let name = node.name().to_string();
        if self.nodes.contains_key(&name) {
            return Err(ConfigError::DuplicateObject(name));
        }
        self.nodes.insert(name, node);
        Ok(())
    }

    /// Removes a node, checking it has the expected kind.
    ///
    /// # Errors
    ///
    /// `UnknownNode` when absent, `WrongNodeKind` on a kind mismatch.
    pub fn remove_node(&mut self, name: &str, kind: NodeKind) -> Result<(), ConfigError> {
        let node = self
            .nodes
            .get(name)
            .ok_or_else(|| ConfigError::UnknownNode(name.to_string()))?;
        if node.kind() != kind {
            return Err(ConfigError::WrongNodeKind(name.to_string()));
        }
        self.nodes.remove(name);
        Ok(())
    }

    /// Repoints the init node.
    ///
    /// # Errors
    ///
    /// `UnknownNode` when the target does not exist.
    pub fn set_init(&mut self, target: Option<String>) -> Result<(), ConfigError> {
        if let Some(ref t) = target {
            if !self.nodes.contains_key(t) {
                return Err(ConfigError::UnknownNode(t.clone()));
            }
        }
        self.init = target;
        Ok(())
    }

    /// Checks every successor edge and the init pointer resolve to nodes of
    /// this pipeline.
    ///
    /// # Errors
    ///
    /// `UnknownNode` naming the first dangling target found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ref init) = self.init {
            if !self.nodes.contains_key(init) {
                return Err(ConfigError::UnknownNode(init.clone()));
            }
        }
        for node in self.nodes.values() {
            for target in node.successors() {
                if !self.nodes.contains_key(target) {
                    return Err(ConfigError::UnknownNode(target.to_string()));
                }
            }
        }
        Ok(())
    }

    /// Walks from the init node, returning the visited node names in order.
    ///
    /// `decide` resolves table labels and conditional outcomes; flex nodes
    /// route by their own trigger state. The walk stops at a terminal, at a
    /// dangling edge, or after `node_count()` steps (an edit introduced a
    /// cycle; the executor's recirculation limit is its own concern).
    pub fn walk<F>(&self, mut decide: F) -> Vec<String>
    where
        F: FnMut(&Node) -> Decision,
    {
        let mut visited = Vec::new();
        let mut current = self.init.clone();
        while let Some(name) = current {
            let Some(node) = self.nodes.get(&name) else {
                break;
            };
            visited.push(name);
            if visited.len() > self.nodes.len() {
                break;
            }
            current = match node {
                Node::Table(t) => match decide(node) {
                    Decision::Label(label) => t.next.get(&label).cloned().flatten(),
                    Decision::Branch(_) => None,
                },
                Node::Conditional(c) => match decide(node) {
                    Decision::Branch(true) => c.true_next.clone(),
                    Decision::Branch(false) => c.false_next.clone(),
                    Decision::Label(_) => None,
                },
                Node::Flex(x) => {
                    if x.armed {
                        x.true_next.clone()
                    } else {
                        x.false_next.clone()
                    }
                }
            };
        }
        visited
    }
}

#[cfg(test)]
mod tests {
    use fxhash::FxHashMap;

    use super::*;
    use crate::graph::node::{BranchNode, FlexNode, TableNode};
    use crate::lookup::DefaultLookupFactory;
    use crate::table::{MatchKind, MatchTable, TableDecl, TableKind};

    fn table_node(name: &str, next: &[(&str, Option<&str>)]) -> Node {
        let table = MatchTable::new(
            TableDecl {
                name: name.to_string(),
                kind: TableKind::Direct,
                match_kind: MatchKind::Exact,
                actions: vec!["hit".to_string()],
                profile: None,
                with_counters: false,
                with_meters: false,
            },
            &DefaultLookupFactory,
        );
        let mut map = FxHashMap::default();
        for (label, target) in next {
            map.insert((*label).to_string(), target.map(str::to_string));
        }
        Node::Table(TableNode { table, next: map })
    }

    fn linear_pipeline() -> Pipeline {
        let mut p = Pipeline::new("ingress".to_string());
        p.add_node(table_node("t1", &[("hit", Some("t2"))])).unwrap();
        p.add_node(table_node("t2", &[("hit", None)])).unwrap();
        p.set_init(Some("t1".to_string())).unwrap();
        p
    }

    #[test]
    fn walk_linear() {
        let p = linear_pipeline();
        let path = p.walk(|_| Decision::Label("hit".to_string()));
        assert_eq!(path, vec!["t1", "t2"]);
    }

    #[test]
    fn flex_routes_by_trigger_state() {
        let mut p = linear_pipeline();
        p.add_node(Node::Flex(FlexNode {
            name: "fx".to_string(),
            true_next: Some("t2".to_string()),
            false_next: Some("t1".to_string()),
            armed: false,
            mount_point: None,
        }))
        .unwrap();
        p.set_init(Some("fx".to_string())).unwrap();

        let path = p.walk(|_| Decision::Label("hit".to_string()));
        assert_eq!(path, vec!["fx", "t1", "t2"]);

        if let Some(Node::Flex(x)) = p.node_mut("fx") {
            x.armed = true;
        }
        let path = p.walk(|_| Decision::Label("hit".to_string()));
        assert_eq!(path, vec!["fx", "t2"]);
    }

    #[test]
    fn conditional_branches() {
        let mut p = Pipeline::new("ingress".to_string());
        p.add_node(table_node("then", &[])).unwrap();
        p.add_node(table_node("else", &[])).unwrap();
        p.add_node(Node::Conditional(BranchNode {
            name: "c".to_string(),
            expression: Some("valid(ipv4)".to_string()),
            true_next: Some("then".to_string()),
            false_next: Some("else".to_string()),
        }))
        .unwrap();
        p.set_init(Some("c".to_string())).unwrap();

        let path = p.walk(|n| match n.kind() {
            NodeKind::Conditional => Decision::Branch(false),
            _ => Decision::Label("hit".to_string()),
        });
        assert_eq!(path, vec!["c", "else"]);
    }

    #[test]
    fn validate_rejects_dangling_edge() {
        let mut p = Pipeline::new("ingress".to_string());
        p.add_node(table_node("t1", &[("hit", Some("ghost"))]))
            .unwrap();
        p.set_init(Some("t1".to_string())).unwrap();
        assert!(matches!(p.validate(), Err(ConfigError::UnknownNode(n)) if n == "ghost"));
    }

    #[test]
    fn init_must_exist() {
        let mut p = Pipeline::new("ingress".to_string());
        assert!(p.set_init(Some("nope".to_string())).is_err());
    }

    #[test]
    fn walk_survives_cycles() {
        let mut p = Pipeline::new("ingress".to_string());
        p.add_node(table_node("a", &[("hit", Some("b"))])).unwrap();
        p.add_node(table_node("b", &[("hit", Some("a"))])).unwrap();
        p.set_init(Some("a".to_string())).unwrap();
        let path = p.walk(|_| Decision::Label("hit".to_string()));
        assert!(path.len() <= 3);
    }
}
