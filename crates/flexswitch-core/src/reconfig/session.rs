//! Edit sessions: the staging graph plus the id-naming discipline.

use fxhash::FxHashMap;

use crate::graph::{ConfigGraph, NodeKind};

use super::ReconfigError;

/// Marker prefix of a staged-object id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdPrefix {
    New,
    Old,
    Flex,
}

/// Splits a prefixed id into its prefix and suffix.
fn split_id(id: &str) -> Result<(IdPrefix, &str), ReconfigError> {
    let (prefix, suffix) = match (id.get(..4), id.get(4..)) {
        (Some(p), Some(s)) => (p, s),
        _ => return Err(ReconfigError::Prefix(id.to_string())),
    };
    match prefix {
        "new_" => Ok((IdPrefix::New, suffix)),
        "old_" => Ok((IdPrefix::Old, suffix)),
        "flx_" => Ok((IdPrefix::Flex, suffix)),
        _ => Err(ReconfigError::Prefix(id.to_string())),
    }
}

/// Extracts the mount-point tag from a flex-id suffix of the form
/// `flex_func_mount_point_number_$<n>$`. Any other shape yields no tag.
fn parse_mount_point(suffix: &str) -> Result<Option<u32>, ReconfigError> {
    let Some(first) = suffix.find('$') else {
        return Ok(None);
    };
    let Some(last) = suffix.rfind('$') else {
        return Ok(None);
    };
    if &suffix[..first] != "flex_func_mount_point_number_" || last <= first {
        return Ok(None);
    }
    let number: i64 = suffix[first + 1..last]
        .parse()
        .map_err(|_| ReconfigError::InvalidCommand(format!("bad mount point in '{suffix}'")))?;
    let tag = u32::try_from(number).map_err(|_| {
        ReconfigError::InvalidCommand(format!("mount point {number} out of range"))
    })?;
    Ok(Some(tag))
}

/// Register-array change selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterChange {
    /// Resize the array to a new cell count.
    Resize(usize),
    /// Change the cell width in bits.
    Bitwidth(u32),
}

/// One edit sequence: the staging graph (source of `new_` material) and the
/// map from prefixed ids to the names objects received on installation.
///
/// The session exists from the first reconfiguration call until the trigger
/// that activates the edits; the id map is empty outside a session.
#[derive(Debug)]
pub struct EditSession {
    staging: ConfigGraph,
    id_map: FxHashMap<String, String>,
}

impl EditSession {
    /// Opens a session around a built staging graph.
    #[must_use]
    pub fn new(staging: ConfigGraph) -> Self {
        EditSession {
            staging,
            id_map: FxHashMap::default(),
        }
    }

    /// The id → installed-name map.
    #[must_use]
    pub fn id_map(&self) -> &FxHashMap<String, String> {
        &self.id_map
    }

    /// Resolves a reference id to a live node name; `None` is a terminal.
    ///
    /// # Errors
    ///
    /// `Prefix` for an unrecognized prefix, `UnknownId` for a `new_`/`flx_`
    /// id that was never installed.
    pub fn resolve(&self, id: &str) -> Result<Option<String>, ReconfigError> {
        if id == "null" {
            return Ok(None);
        }
        let (prefix, suffix) = split_id(id)?;
        match prefix {
            IdPrefix::Old => Ok(Some(suffix.to_string())),
            IdPrefix::New | IdPrefix::Flex => self
                .id_map
                .get(id)
                .cloned()
                .map(Some)
                .ok_or_else(|| ReconfigError::UnknownId(id.to_string())),
        }
    }

    fn expect_fresh(&self, id: &str) -> Result<(), ReconfigError> {
        if self.id_map.contains_key(id) {
            return Err(ReconfigError::DuplicateId(id.to_string()));
        }
        Ok(())
    }

    fn resolve_required(&self, id: &str) -> Result<String, ReconfigError> {
        self.resolve(id)?
            .ok_or_else(|| ReconfigError::InvalidCommand(format!("'{id}' cannot be a terminal here")))
    }

    /// Copies a staged match table into the live graph.
    ///
    /// # Errors
    ///
    /// `Prefix` unless the id is `new_`-prefixed, `DuplicateId` on a second
    /// insert, graph errors when the staged table or pipeline is missing.
    pub fn insert_table(
        &mut self,
        live: &mut ConfigGraph,
        pipeline: &str,
        id: &str,
    ) -> Result<(), ReconfigError> {
        let (prefix, suffix) = split_id(id)?;
        if prefix != IdPrefix::New {
            return Err(ReconfigError::Prefix(id.to_string()));
        }
        self.expect_fresh(id)?;
        let assigned = live.insert_table_from(&self.staging, pipeline, suffix)?;
        self.id_map.insert(id.to_string(), assigned);
        Ok(())
    }

    /// Copies a staged conditional into the live graph.
    ///
    /// # Errors
    ///
    /// As [`EditSession::insert_table`].
    pub fn insert_conditional(
        &mut self,
        live: &mut ConfigGraph,
        pipeline: &str,
        id: &str,
    ) -> Result<(), ReconfigError> {
        let (prefix, suffix) = split_id(id)?;
        if prefix != IdPrefix::New {
            return Err(ReconfigError::Prefix(id.to_string()));
        }
        self.expect_fresh(id)?;
        let assigned = live.insert_conditional_from(&self.staging, pipeline, suffix)?;
        self.id_map.insert(id.to_string(), assigned);
        Ok(())
    }

    /// Creates a flex node with both successors resolved through the id
    /// discipline. A suffix of the form `flex_func_mount_point_number_$<n>$`
    /// tags the node with mount point `n`.
    ///
    /// # Errors
    ///
    /// `Prefix` unless the id is `flx_`-prefixed, `DuplicateId` on a second
    /// insert, `UnknownId`/`Prefix` from successor resolution, graph errors
    /// when a successor does not exist.
    pub fn insert_flex(
        &mut self,
        live: &mut ConfigGraph,
        pipeline: &str,
        id: &str,
        true_id: &str,
        false_id: &str,
    ) -> Result<(), ReconfigError> {
        let (prefix, suffix) = split_id(id)?;
        if prefix != IdPrefix::Flex {
            return Err(ReconfigError::Prefix(id.to_string()));
        }
        let true_next = self.resolve(true_id)?;
        let false_next = self.resolve(false_id)?;
        self.expect_fresh(id)?;
        let mount_point = parse_mount_point(suffix)?;
        let assigned = live.insert_flex(pipeline, suffix, true_next, false_next, mount_point)?;
        self.id_map.insert(id.to_string(), assigned);
        Ok(())
    }

    /// Rewrites one labeled outgoing edge of a table.
    ///
    /// # Errors
    ///
    /// Resolution errors for either id, graph errors for the edit itself.
    pub fn change_table(
        &mut self,
        live: &mut ConfigGraph,
        pipeline: &str,
        id: &str,
        label: &str,
        next_id: &str,
    ) -> Result<(), ReconfigError> {
        let node = self.resolve_required(id)?;
        let target = self.resolve(next_id)?;
        live.change_table_next(pipeline, &node, label, target)?;
        Ok(())
    }

    /// Rewrites the true or false successor of a conditional or flex node.
    /// Flex nodes share the conditional's two-armed edge model, so one
    /// routine serves both.
    ///
    /// # Errors
    ///
    /// Resolution errors for either id, graph errors for the edit itself.
    pub fn change_branch(
        &mut self,
        live: &mut ConfigGraph,
        pipeline: &str,
        id: &str,
        true_branch: bool,
        next_id: &str,
    ) -> Result<(), ReconfigError> {
        let node = self.resolve_required(id)?;
        let target = self.resolve(next_id)?;
        live.change_branch_next(pipeline, &node, true_branch, target)?;
        Ok(())
    }

    /// Repoints a pipeline's init node.
    ///
    /// # Errors
    ///
    /// Resolution errors for the id, graph errors for the edit.
    pub fn change_init(
        &mut self,
        live: &mut ConfigGraph,
        pipeline: &str,
        next_id: &str,
    ) -> Result<(), ReconfigError> {
        let target = self.resolve(next_id)?;
        live.change_init(pipeline, target)?;
        Ok(())
    }

    fn delete_node(
        &mut self,
        live: &mut ConfigGraph,
        pipeline: &str,
        id: &str,
        kind: NodeKind,
    ) -> Result<(), ReconfigError> {
        let node = self.resolve_required(id)?;
        live.delete_node(pipeline, &node, kind)?;
        self.id_map.remove(id);
        Ok(())
    }

    /// Removes a table from the live graph.
    ///
    /// # Errors
    ///
    /// Resolution errors, `UnknownNode`, or `WrongNodeKind`.
    pub fn delete_table(
        &mut self,
        live: &mut ConfigGraph,
        pipeline: &str,
        id: &str,
    ) -> Result<(), ReconfigError> {
        self.delete_node(live, pipeline, id, NodeKind::Table)
    }

    /// Removes a conditional from the live graph.
    ///
    /// # Errors
    ///
    /// Resolution errors, `UnknownNode`, or `WrongNodeKind`.
    pub fn delete_conditional(
        &mut self,
        live: &mut ConfigGraph,
        pipeline: &str,
        id: &str,
    ) -> Result<(), ReconfigError> {
        self.delete_node(live, pipeline, id, NodeKind::Conditional)
    }

    /// Removes a flex node from the live graph.
    ///
    /// # Errors
    ///
    /// Resolution errors, `UnknownNode`, or `WrongNodeKind`.
    pub fn delete_flex(
        &mut self,
        live: &mut ConfigGraph,
        pipeline: &str,
        id: &str,
    ) -> Result<(), ReconfigError> {
        self.delete_node(live, pipeline, id, NodeKind::Flex)
    }

    /// Creates a register array of the given size and width.
    ///
    /// # Errors
    ///
    /// `Prefix` unless the id is `new_`-prefixed, `DuplicateId` on a second
    /// insert, graph errors when the name is taken.
    pub fn insert_register_array(
        &mut self,
        live: &mut ConfigGraph,
        id: &str,
        size: usize,
        bitwidth: u32,
    ) -> Result<(), ReconfigError> {
        let (prefix, suffix) = split_id(id)?;
        if prefix != IdPrefix::New {
            return Err(ReconfigError::Prefix(id.to_string()));
        }
        self.expect_fresh(id)?;
        let assigned = live.insert_register_array(suffix, size, bitwidth)?;
        self.id_map.insert(id.to_string(), assigned);
        Ok(())
    }

    /// Resizes or re-widths a register array.
    ///
    /// # Errors
    ///
    /// Resolution errors, `UnknownRegister`.
    pub fn change_register_array(
        &mut self,
        live: &mut ConfigGraph,
        id: &str,
        change: RegisterChange,
    ) -> Result<(), ReconfigError> {
        let name = self.resolve_required(id)?;
        match change {
            RegisterChange::Resize(size) => live.resize_register_array(&name, size)?,
            RegisterChange::Bitwidth(width) => live.rewidth_register_array(&name, width)?,
        }
        Ok(())
    }

    /// Rebinds a register array's hash calculation.
    ///
    /// # Errors
    ///
    /// `HashFunctionNotFound` when no calculator of that name exists in the
    /// live graph, plus resolution and `UnknownRegister` errors.
    pub fn change_register_hash(
        &mut self,
        live: &mut ConfigGraph,
        id: &str,
        calc: &str,
    ) -> Result<(), ReconfigError> {
        let name = self.resolve_required(id)?;
        if live.crc_calculator(calc).is_none() {
            return Err(ReconfigError::HashFunctionNotFound(calc.to_string()));
        }
        live.set_register_hash(&name, Some(calc.to_string()))?;
        Ok(())
    }

    /// Removes a register array.
    ///
    /// # Errors
    ///
    /// Resolution errors, `UnknownRegister`.
    pub fn delete_register_array(
        &mut self,
        live: &mut ConfigGraph,
        id: &str,
    ) -> Result<(), ReconfigError> {
        let name = self.resolve_required(id)?;
        live.delete_register_array(&name)?;
        self.id_map.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use fxhash::FxHashSet;

    use super::*;
    use crate::graph::{load_config, ArithSpec};
    use crate::lookup::DefaultLookupFactory;

    fn graph(json: &str) -> ConfigGraph {
        let factory: Arc<dyn crate::lookup::LookupFactory> = Arc::new(DefaultLookupFactory);
        load_config(
            json.as_bytes(),
            &FxHashSet::default(),
            &ArithSpec::default(),
            &factory,
        )
        .unwrap()
    }

    fn live_graph() -> ConfigGraph {
        graph(
            r#"{
                "pipelines": [
                    {"name": "ingress", "init_node": "t1",
                     "nodes": [
                        {"kind": "table", "name": "t1", "actions": ["hit"],
                         "next": {"hit": "t2"}},
                        {"kind": "table", "name": "t2", "actions": ["hit"],
                         "next": {"hit": null}}
                     ]}
                ],
                "crc_calculators": [{"name": "calc0", "width": 32}]
            }"#,
        )
    }

    fn staging_graph() -> ConfigGraph {
        graph(
            r#"{
                "pipelines": [
                    {"name": "ingress",
                     "nodes": [
                        {"kind": "table", "name": "t3", "actions": ["hit"]}
                     ]}
                ]
            }"#,
        )
    }

    #[test]
    fn insert_and_wire_staged_table() {
        let mut live = live_graph();
        let mut session = EditSession::new(staging_graph());

        session.insert_table(&mut live, "ingress", "new_t3").unwrap();
        assert!(live.table("t3").is_some());
        session
            .change_table(&mut live, "ingress", "new_t3", "hit", "old_t2")
            .unwrap();
        session
            .insert_flex(&mut live, "ingress", "flx_f1", "new_t3", "old_t1")
            .unwrap();
        session.change_init(&mut live, "ingress", "flx_f1").unwrap();
        assert_eq!(live.pipeline("ingress").unwrap().init(), Some("f1"));
    }

    #[test]
    fn duplicate_insert_rejected() {
        let mut live = live_graph();
        let mut session = EditSession::new(staging_graph());
        session.insert_table(&mut live, "ingress", "new_t3").unwrap();
        let err = session
            .insert_table(&mut live, "ingress", "new_t3")
            .unwrap_err();
        assert!(matches!(err, ReconfigError::DuplicateId(_)));
    }

    #[test]
    fn bad_prefix_rejected() {
        let mut live = live_graph();
        let mut session = EditSession::new(staging_graph());
        let err = session
            .change_table(&mut live, "ingress", "xxx_t1", "hit", "null")
            .unwrap_err();
        assert!(matches!(err, ReconfigError::Prefix(_)));
        let err = session
            .insert_table(&mut live, "ingress", "flx_t3")
            .unwrap_err();
        assert!(matches!(err, ReconfigError::Prefix(_)));
    }

    #[test]
    fn unseen_staged_id_rejected() {
        let mut live = live_graph();
        let mut session = EditSession::new(staging_graph());
        let err = session
            .change_table(&mut live, "ingress", "new_unseen", "hit", "null")
            .unwrap_err();
        assert!(matches!(err, ReconfigError::UnknownId(_)));
    }

    #[test]
    fn unknown_old_target_rejected() {
        let mut live = live_graph();
        let mut session = EditSession::new(staging_graph());
        let err = session
            .insert_flex(&mut live, "ingress", "flx_f1", "old_ghost", "null")
            .unwrap_err();
        assert!(matches!(
            err,
            ReconfigError::Graph(crate::graph::ConfigError::UnknownNode(_))
        ));
    }

    #[test]
    fn mount_point_captured_from_suffix() {
        let mut live = live_graph();
        let mut session = EditSession::new(staging_graph());
        session
            .insert_flex(
                &mut live,
                "ingress",
                "flx_flex_func_mount_point_number_$7$",
                "old_t2",
                "old_t1",
            )
            .unwrap();
        let pipeline = live.pipeline("ingress").unwrap();
        let node = pipeline.node("flex_func_mount_point_number_$7$").unwrap();
        match node {
            crate::graph::Node::Flex(x) => assert_eq!(x.mount_point, Some(7)),
            _ => panic!("expected flex node"),
        }
    }

    #[test]
    fn negative_mount_point_rejected() {
        let mut live = live_graph();
        let mut session = EditSession::new(staging_graph());
        let err = session
            .insert_flex(
                &mut live,
                "ingress",
                "flx_flex_func_mount_point_number_$-3$",
                "old_t2",
                "old_t1",
            )
            .unwrap_err();
        assert!(matches!(err, ReconfigError::InvalidCommand(_)));
    }

    #[test]
    fn register_array_lifecycle() {
        let mut live = live_graph();
        let mut session = EditSession::new(staging_graph());
        session
            .insert_register_array(&mut live, "new_sketch", 64, 16)
            .unwrap();
        assert_eq!(live.register_array("sketch").unwrap().size(), 64);
        session
            .change_register_array(&mut live, "new_sketch", RegisterChange::Resize(128))
            .unwrap();
        assert_eq!(live.register_array("sketch").unwrap().size(), 128);
        session
            .change_register_array(&mut live, "new_sketch", RegisterChange::Bitwidth(8))
            .unwrap();
        assert_eq!(live.register_array("sketch").unwrap().bitwidth(), 8);
        session
            .change_register_hash(&mut live, "new_sketch", "calc0")
            .unwrap();
        assert_eq!(
            live.register_array("sketch").unwrap().hash_calc(),
            Some("calc0")
        );
        let err = session
            .change_register_hash(&mut live, "new_sketch", "nope")
            .unwrap_err();
        assert!(matches!(err, ReconfigError::HashFunctionNotFound(_)));
        session
            .delete_register_array(&mut live, "new_sketch")
            .unwrap();
        assert!(live.register_array("sketch").is_none());
    }

    #[test]
    fn delete_checks_node_kind() {
        let mut live = live_graph();
        let mut session = EditSession::new(staging_graph());
        let err = session
            .delete_flex(&mut live, "ingress", "old_t1")
            .unwrap_err();
        assert!(matches!(
            err,
            ReconfigError::Graph(crate::graph::ConfigError::WrongNodeKind(_))
        ));
        session.delete_table(&mut live, "ingress", "old_t2").unwrap();
        assert!(live.table("t2").is_none());
    }
}
