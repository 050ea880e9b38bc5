//! The complete forwarding configuration and its in-place edit primitives.

use std::fmt;
use std::sync::Arc;

use fxhash::FxHashMap;

use crate::action_profile::ActionProfile;
use crate::crc::CrcCalculator;
use crate::lookup::LookupFactory;
use crate::register::{CounterArray, MeterArray, ParseValueSet, RegisterArray};
use crate::table::MatchTable;

use super::node::{BranchNode, FlexNode, Node, NodeKind, TableNode};
use super::pipeline::Pipeline;

/// Errors from configuration loading and graph-structure edits.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration bytes did not parse.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// A required header field is absent from the configuration.
    #[error("required field missing: {header}.{field}")]
    RequiredFieldMissing {
        /// Header name.
        header: String,
        /// Field name.
        field: String,
    },

    /// An object of this name already exists.
    #[error("duplicate object name: {0}")]
    DuplicateObject(String),

    /// No pipeline with this name.
    #[error("pipeline not found: {0}")]
    UnknownPipeline(String),

    /// No node with this name (as an edge target, init pointer, or edit
    /// operand).
    #[error("node not found: {0}")]
    UnknownNode(String),

    /// No register array with this name.
    #[error("register array not found: {0}")]
    UnknownRegister(String),

    /// The node exists but has the wrong kind for this operation.
    #[error("wrong node kind: {0}")]
    WrongNodeKind(String),

    /// A declaration references an undefined object (action profile,
    /// header, ...).
    #[error("unresolved reference in configuration: {0}")]
    UnresolvedReference(String),
}

/// One field of a header declaration.
#[derive(Debug, Clone)]
pub struct HeaderField {
    /// Field name.
    pub name: String,
    /// Width in bits.
    pub bitwidth: u32,
    /// Whether arithmetic is enabled for the field.
    pub arith: bool,
}

/// A learn list: fields sampled into learning digests.
#[derive(Debug, Clone)]
pub struct LearnList {
    /// List id, referenced by learning digests.
    pub id: u32,
    /// List name.
    pub name: String,
    /// `(header, field)` pairs sampled by the list.
    pub fields: Vec<(String, String)>,
}

/// A field list: fields referenced as a unit (hash inputs, recirculation
/// metadata).
#[derive(Debug, Clone)]
pub struct FieldList {
    /// List id.
    pub id: u32,
    /// `(header, field)` pairs of the list.
    pub fields: Vec<(String, String)>,
}

/// An extern instance declared by the configuration. The core stores the
/// declaration; behavior belongs to the target.
#[derive(Debug, Clone)]
pub struct ExternInstance {
    /// Instance name.
    pub name: String,
    /// Extern type name.
    pub kind: String,
    /// Attribute map, as declared.
    pub attributes: FxHashMap<String, String>,
}

/// One complete forwarding configuration.
///
/// Built by [`load_config`](super::load::load_config), owned by exactly one
/// context slot. Structure is edited only through the `&mut self` primitives
/// below; see the [module docs](super) for the mutability contract.
pub struct ConfigGraph {
    pipelines: FxHashMap<String, Pipeline>,
    action_profiles: FxHashMap<String, ActionProfile>,
    register_arrays: FxHashMap<String, RegisterArray>,
    counter_arrays: FxHashMap<String, CounterArray>,
    meter_arrays: FxHashMap<String, MeterArray>,
    parse_vsets: FxHashMap<String, ParseValueSet>,
    learn_lists: FxHashMap<String, LearnList>,
    crc_calculators: FxHashMap<String, CrcCalculator>,
    extern_instances: FxHashMap<String, ExternInstance>,
    config_options: FxHashMap<String, String>,
    parsers: Vec<String>,
    deparsers: Vec<String>,
    field_lists: FxHashMap<u32, FieldList>,
    headers: FxHashMap<String, Vec<HeaderField>>,
    factory: Arc<dyn LookupFactory>,
    source: String,
}

impl fmt::Debug for ConfigGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigGraph")
            .field("pipelines", &self.pipelines.keys().collect::<Vec<_>>())
            .field("register_arrays", &self.register_arrays.len())
            .field("counter_arrays", &self.counter_arrays.len())
            .field("meter_arrays", &self.meter_arrays.len())
            .finish_non_exhaustive()
    }
}

impl ConfigGraph {
    /// Creates an empty configuration (no pipelines, no objects).
    #[must_use]
    pub fn empty(factory: Arc<dyn LookupFactory>) -> Self {
        ConfigGraph {
            pipelines: FxHashMap::default(),
            action_profiles: FxHashMap::default(),
            register_arrays: FxHashMap::default(),
            counter_arrays: FxHashMap::default(),
            meter_arrays: FxHashMap::default(),
            parse_vsets: FxHashMap::default(),
            learn_lists: FxHashMap::default(),
            crc_calculators: FxHashMap::default(),
            extern_instances: FxHashMap::default(),
            config_options: FxHashMap::default(),
            parsers: Vec::new(),
            deparsers: Vec::new(),
            field_lists: FxHashMap::default(),
            headers: FxHashMap::default(),
            factory,
            source: String::from("{}"),
        }
    }

    // ---------- accessors ----------

    /// The lookup factory this configuration was built with.
    #[must_use]
    pub fn factory(&self) -> &Arc<dyn LookupFactory> {
        &self.factory
    }

    /// Raw configuration text the graph was loaded from.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Looks a pipeline up by name.
    #[must_use]
    pub fn pipeline(&self, name: &str) -> Option<&Pipeline> {
        self.pipelines.get(name)
    }

    /// Iterates every pipeline.
    pub fn pipelines(&self) -> impl Iterator<Item = &Pipeline> {
        self.pipelines.values()
    }

    /// Finds a match table by name, across pipelines.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&MatchTable> {
        self.pipelines.values().find_map(|p| match p.node(name) {
            Some(Node::Table(t)) => Some(&t.table),
            _ => None,
        })
    }

    /// Iterates every match table, across pipelines.
    pub fn tables(&self) -> impl Iterator<Item = &MatchTable> {
        self.pipelines.values().flat_map(|p| {
            p.nodes().filter_map(|n| match n {
                Node::Table(t) => Some(&t.table),
                _ => None,
            })
        })
    }

    /// Looks an action profile up by name.
    #[must_use]
    pub fn action_profile(&self, name: &str) -> Option<&ActionProfile> {
        self.action_profiles.get(name)
    }

    /// Looks a register array up by name.
    #[must_use]
    pub fn register_array(&self, name: &str) -> Option<&RegisterArray> {
        self.register_arrays.get(name)
    }

    /// Iterates every register array.
    pub fn register_arrays(&self) -> impl Iterator<Item = &RegisterArray> {
        self.register_arrays.values()
    }

    /// Looks a counter array up by name.
    #[must_use]
    pub fn counter_array(&self, name: &str) -> Option<&CounterArray> {
        self.counter_arrays.get(name)
    }

    /// Iterates every counter array.
    pub fn counter_arrays(&self) -> impl Iterator<Item = &CounterArray> {
        self.counter_arrays.values()
    }

    /// Looks a meter array up by name.
    #[must_use]
    pub fn meter_array(&self, name: &str) -> Option<&MeterArray> {
        self.meter_arrays.get(name)
    }

    /// Iterates every meter array.
    pub fn meter_arrays(&self) -> impl Iterator<Item = &MeterArray> {
        self.meter_arrays.values()
    }

    /// Looks a parse value set up by name.
    #[must_use]
    pub fn parse_vset(&self, name: &str) -> Option<&ParseValueSet> {
        self.parse_vsets.get(name)
    }

    /// Looks a learn list up by name.
    #[must_use]
    pub fn learn_list(&self, name: &str) -> Option<&LearnList> {
        self.learn_lists.get(name)
    }

    /// Looks a CRC calculator up by name.
    #[must_use]
    pub fn crc_calculator(&self, name: &str) -> Option<&CrcCalculator> {
        self.crc_calculators.get(name)
    }

    /// Looks an extern instance up by name.
    #[must_use]
    pub fn extern_instance(&self, name: &str) -> Option<&ExternInstance> {
        self.extern_instances.get(name)
    }

    /// Target-specific options carried by the configuration.
    #[must_use]
    pub fn config_options(&self) -> &FxHashMap<String, String> {
        &self.config_options
    }

    /// Whether a parser of this name is declared.
    #[must_use]
    pub fn has_parser(&self, name: &str) -> bool {
        self.parsers.iter().any(|p| p == name)
    }

    /// Whether a deparser of this name is declared.
    #[must_use]
    pub fn has_deparser(&self, name: &str) -> bool {
        self.deparsers.iter().any(|p| p == name)
    }

    /// Looks a field list up by id.
    #[must_use]
    pub fn field_list(&self, id: u32) -> Option<&FieldList> {
        self.field_lists.get(&id)
    }

    /// Whether `header.field` is declared.
    #[must_use]
    pub fn field_exists(&self, header: &str, field: &str) -> bool {
        self.headers
            .get(header)
            .is_some_and(|fields| fields.iter().any(|f| f.name == field))
    }

    /// Enables arithmetic on one field. No effect when the field is absent.
    pub fn enable_arith(&mut self, header: &str, field: &str) {
        if let Some(fields) = self.headers.get_mut(header) {
            for f in fields.iter_mut().filter(|f| f.name == field) {
                f.arith = true;
            }
        }
    }

    /// Enables arithmetic on every field of a header.
    pub fn enable_header_arith(&mut self, header: &str) {
        if let Some(fields) = self.headers.get_mut(header) {
            for f in fields {
                f.arith = true;
            }
        }
    }

    /// Whether arithmetic is enabled for `header.field`.
    #[must_use]
    pub fn arith_enabled(&self, header: &str, field: &str) -> bool {
        self.headers
            .get(header)
            .is_some_and(|fields| fields.iter().any(|f| f.name == field && f.arith))
    }

    // ---------- whole-graph operations ----------

    /// Checks structural invariants: every edge target and init pointer
    /// resolves, and node names are unique across pipelines.
    ///
    /// # Errors
    ///
    /// `UnknownNode` or `DuplicateObject` naming the offender.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen: FxHashMap<&str, ()> = FxHashMap::default();
        for pipeline in self.pipelines.values() {
            pipeline.validate()?;
            for node in pipeline.nodes() {
                if seen.insert(node.name(), ()).is_some() {
                    return Err(ConfigError::DuplicateObject(node.name().to_string()));
                }
            }
        }
        Ok(())
    }

    /// Discards all mutable state: entries, counters, meters, registers,
    /// parse value sets, profile members. Structure is untouched.
    pub fn reset_state(&self) {
        for table in self.tables() {
            table.clear_entries(true);
        }
        for profile in self.action_profiles.values() {
            profile.reset_state();
        }
        for counters in self.counter_arrays.values() {
            counters.reset();
        }
        for meters in self.meter_arrays.values() {
            meters.reset();
        }
        for registers in self.register_arrays.values() {
            registers.reset();
        }
        for vset in self.parse_vsets.values() {
            vset.clear();
        }
    }

    // ---------- edit primitives ----------

    fn node_name_taken(&self, name: &str) -> bool {
        self.pipelines.values().any(|p| p.node(name).is_some())
    }

    /// Picks a name for an inserted node: the staged name when free,
    /// otherwise the first free `name$k` variant.
    fn fresh_node_name(&self, base: &str) -> String {
        if !self.node_name_taken(base) {
            return base.to_string();
        }
        let mut k = 1;
        loop {
            let candidate = format!("{base}${k}");
            if !self.node_name_taken(&candidate) {
                return candidate;
            }
            k += 1;
        }
    }

    fn pipeline_mut(&mut self, name: &str) -> Result<&mut Pipeline, ConfigError> {
        self.pipelines
            .get_mut(name)
            .ok_or_else(|| ConfigError::UnknownPipeline(name.to_string()))
    }

    fn check_target_exists(&self, pipeline: &str, target: Option<&str>) -> Result<(), ConfigError> {
        let p = self
            .pipelines
            .get(pipeline)
            .ok_or_else(|| ConfigError::UnknownPipeline(pipeline.to_string()))?;
        if let Some(t) = target {
            if p.node(t).is_none() {
                return Err(ConfigError::UnknownNode(t.to_string()));
            }
        }
        Ok(())
    }

    /// Copies a staged match table into a pipeline of this graph, successor
    /// edges cleared. Returns the name the node received.
    ///
    /// # Errors
    ///
    /// `UnknownNode` when the staging graph has no such table,
    /// `UnknownPipeline` for the destination.
    pub fn insert_table_from(
        &mut self,
        staging: &ConfigGraph,
        pipeline: &str,
        table_name: &str,
    ) -> Result<String, ConfigError> {
        let staged = staging
            .table(table_name)
            .ok_or_else(|| ConfigError::UnknownNode(table_name.to_string()))?;
        let assigned = self.fresh_node_name(table_name);
        let mut table = staged.duplicate(self.factory.as_ref());
        table.set_name(assigned.clone());
        let node = Node::Table(TableNode {
            table,
            next: FxHashMap::default(),
        });
        self.pipeline_mut(pipeline)?.add_node(node)?;
        tracing::debug!("inserted staged table '{table_name}' as '{assigned}' into '{pipeline}'");
        Ok(assigned)
    }

    /// Copies a staged conditional into a pipeline of this graph, successor
    /// edges cleared. Returns the name the node received.
    ///
    /// # Errors
    ///
    /// `UnknownNode` when the staging graph has no such conditional,
    /// `UnknownPipeline` for the destination.
    pub fn insert_conditional_from(
        &mut self,
        staging: &ConfigGraph,
        pipeline: &str,
        cond_name: &str,
    ) -> Result<String, ConfigError> {
        let staged = staging
            .pipelines()
            .find_map(|p| match p.node(cond_name) {
                Some(Node::Conditional(c)) => Some(c.clone()),
                _ => None,
            })
            .ok_or_else(|| ConfigError::UnknownNode(cond_name.to_string()))?;
        let assigned = self.fresh_node_name(cond_name);
        let node = Node::Conditional(BranchNode {
            name: assigned.clone(),
            expression: staged.expression,
            true_next: None,
            false_next: None,
        });
        self.pipeline_mut(pipeline)?.add_node(node)?;
        tracing::debug!("inserted staged conditional '{cond_name}' as '{assigned}' into '{pipeline}'");
        Ok(assigned)
    }

    /// Creates a flex node with both successors, disarmed. Returns the name
    /// the node received.
    ///
    /// # Errors
    ///
    /// `UnknownPipeline`, or `UnknownNode` when a successor target does not
    /// exist in the pipeline.
    pub fn insert_flex(
        &mut self,
        pipeline: &str,
        name: &str,
        true_next: Option<String>,
        false_next: Option<String>,
        mount_point: Option<u32>,
    ) -> Result<String, ConfigError> {
        self.check_target_exists(pipeline, true_next.as_deref())?;
        self.check_target_exists(pipeline, false_next.as_deref())?;
        let assigned = self.fresh_node_name(name);
        let node = Node::Flex(FlexNode {
            name: assigned.clone(),
            true_next,
            false_next,
            armed: false,
            mount_point,
        });
        self.pipeline_mut(pipeline)?.add_node(node)?;
        Ok(assigned)
    }

    /// Rewrites one labeled outgoing edge of a table node.
    ///
    /// # Errors
    ///
    /// `UnknownPipeline`, `UnknownNode` for the node or a non-terminal
    /// target, `WrongNodeKind` when the node is not a table.
    pub fn change_table_next(
        &mut self,
        pipeline: &str,
        node_name: &str,
        label: &str,
        target: Option<String>,
    ) -> Result<(), ConfigError> {
        self.check_target_exists(pipeline, target.as_deref())?;
        let p = self.pipeline_mut(pipeline)?;
        match p.node_mut(node_name) {
            Some(Node::Table(t)) => {
                t.next.insert(label.to_string(), target);
                Ok(())
            }
            Some(_) => Err(ConfigError::WrongNodeKind(node_name.to_string())),
            None => Err(ConfigError::UnknownNode(node_name.to_string())),
        }
    }

    /// Rewrites the true or false successor of a conditional or flex node.
    /// Both variants share the two-armed edge model, so one routine serves
    /// them; tables are rejected.
    ///
    /// # Errors
    ///
    /// `UnknownPipeline`, `UnknownNode`, or `WrongNodeKind`.
    pub fn change_branch_next(
        &mut self,
        pipeline: &str,
        node_name: &str,
        true_branch: bool,
        target: Option<String>,
    ) -> Result<(), ConfigError> {
        self.check_target_exists(pipeline, target.as_deref())?;
        let p = self.pipeline_mut(pipeline)?;
        match p.node_mut(node_name) {
            Some(Node::Conditional(c)) => {
                if true_branch {
                    c.true_next = target;
                } else {
                    c.false_next = target;
                }
                Ok(())
            }
            Some(Node::Flex(x)) => {
                if true_branch {
                    x.true_next = target;
                } else {
                    x.false_next = target;
                }
                Ok(())
            }
            Some(Node::Table(_)) => Err(ConfigError::WrongNodeKind(node_name.to_string())),
            None => Err(ConfigError::UnknownNode(node_name.to_string())),
        }
    }

    /// Repoints a pipeline's init node.
    ///
    /// # Errors
    ///
    /// `UnknownPipeline` or `UnknownNode`.
    pub fn change_init(&mut self, pipeline: &str, target: Option<String>) -> Result<(), ConfigError> {
        self.pipeline_mut(pipeline)?.set_init(target)
    }

    /// Removes a node of the expected kind from a pipeline.
    ///
    /// # Errors
    ///
    /// `UnknownPipeline`, `UnknownNode`, or `WrongNodeKind`.
    pub fn delete_node(
        &mut self,
        pipeline: &str,
        name: &str,
        kind: NodeKind,
    ) -> Result<(), ConfigError> {
        self.pipeline_mut(pipeline)?.remove_node(name, kind)
    }

    /// Creates a register array. Returns the name it received.
    ///
    /// # Errors
    ///
    /// `DuplicateObject` when the name is taken.
    pub fn insert_register_array(
        &mut self,
        name: &str,
        size: usize,
        bitwidth: u32,
    ) -> Result<String, ConfigError> {
        if self.register_arrays.contains_key(name) {
            return Err(ConfigError::DuplicateObject(name.to_string()));
        }
        self.register_arrays.insert(
            name.to_string(),
            RegisterArray::new(name.to_string(), size, bitwidth),
        );
        Ok(name.to_string())
    }

    /// Resizes a register array.
    ///
    /// # Errors
    ///
    /// `UnknownRegister` when absent.
    pub fn resize_register_array(&mut self, name: &str, new_size: usize) -> Result<(), ConfigError> {
        self.register_arrays
            .get(name)
            .ok_or_else(|| ConfigError::UnknownRegister(name.to_string()))?
            .resize(new_size);
        Ok(())
    }

    /// Changes a register array's cell width, re-masking stored values.
    ///
    /// # Errors
    ///
    /// `UnknownRegister` when absent.
    pub fn rewidth_register_array(&mut self, name: &str, bitwidth: u32) -> Result<(), ConfigError> {
        self.register_arrays
            .get_mut(name)
            .ok_or_else(|| ConfigError::UnknownRegister(name.to_string()))?
            .set_bitwidth(bitwidth);
        Ok(())
    }

    /// Binds a register array to a named hash calculation.
    ///
    /// # Errors
    ///
    /// `UnknownRegister` when absent.
    pub fn set_register_hash(
        &mut self,
        name: &str,
        calc: Option<String>,
    ) -> Result<(), ConfigError> {
        self.register_arrays
            .get_mut(name)
            .ok_or_else(|| ConfigError::UnknownRegister(name.to_string()))?
            .set_hash_calc(calc);
        Ok(())
    }

    /// Removes a register array.
    ///
    /// # Errors
    ///
    /// `UnknownRegister` when absent.
    pub fn delete_register_array(&mut self, name: &str) -> Result<(), ConfigError> {
        self.register_arrays
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ConfigError::UnknownRegister(name.to_string()))
    }

    /// Arms (`on = true`) or disarms flex nodes. With a mount-point number,
    /// only nodes carrying that tag flip; without one, all of them do.
    /// Returns how many nodes flipped.
    pub fn flex_trigger(&mut self, on: bool, number: Option<u32>) -> usize {
        let mut flipped = 0;
        for pipeline in self.pipelines.values_mut() {
            for node in pipeline.nodes_mut() {
                if let Node::Flex(x) = node {
                    if number.is_none() || x.mount_point == number {
                        x.armed = on;
                        flipped += 1;
                    }
                }
            }
        }
        tracing::debug!("flex trigger {} flipped {flipped} node(s)", if on { "on" } else { "off" });
        flipped
    }

    // ---------- construction (loader use) ----------

    pub(crate) fn add_pipeline(&mut self, pipeline: Pipeline) -> Result<(), ConfigError> {
        if self.pipelines.contains_key(pipeline.name()) {
            return Err(ConfigError::DuplicateObject(pipeline.name().to_string()));
        }
        self.pipelines.insert(pipeline.name().to_string(), pipeline);
        Ok(())
    }

    pub(crate) fn add_header(&mut self, name: String, fields: Vec<HeaderField>) {
        self.headers.insert(name, fields);
    }

    pub(crate) fn add_action_profile(&mut self, profile: ActionProfile) -> Result<(), ConfigError> {
        if self.action_profiles.contains_key(profile.name()) {
            return Err(ConfigError::DuplicateObject(profile.name().to_string()));
        }
        self.action_profiles.insert(profile.name().to_string(), profile);
        Ok(())
    }

    pub(crate) fn add_register_array(&mut self, array: RegisterArray) -> Result<(), ConfigError> {
        if self.register_arrays.contains_key(array.name()) {
            return Err(ConfigError::DuplicateObject(array.name().to_string()));
        }
        self.register_arrays.insert(array.name().to_string(), array);
        Ok(())
    }

    pub(crate) fn add_counter_array(&mut self, array: CounterArray) -> Result<(), ConfigError> {
        if self.counter_arrays.contains_key(array.name()) {
            return Err(ConfigError::DuplicateObject(array.name().to_string()));
        }
        self.counter_arrays.insert(array.name().to_string(), array);
        Ok(())
    }

    pub(crate) fn add_meter_array(&mut self, array: MeterArray) -> Result<(), ConfigError> {
        if self.meter_arrays.contains_key(array.name()) {
            return Err(ConfigError::DuplicateObject(array.name().to_string()));
        }
        self.meter_arrays.insert(array.name().to_string(), array);
        Ok(())
    }

    pub(crate) fn add_parse_vset(&mut self, vset: ParseValueSet) -> Result<(), ConfigError> {
        if self.parse_vsets.contains_key(vset.name()) {
            return Err(ConfigError::DuplicateObject(vset.name().to_string()));
        }
        self.parse_vsets.insert(vset.name().to_string(), vset);
        Ok(())
    }

    pub(crate) fn add_learn_list(&mut self, list: LearnList) {
        self.learn_lists.insert(list.name.clone(), list);
    }

    pub(crate) fn add_crc_calculator(&mut self, calc: CrcCalculator) {
        self.crc_calculators.insert(calc.name().to_string(), calc);
    }

    pub(crate) fn add_extern_instance(&mut self, instance: ExternInstance) {
        self.extern_instances.insert(instance.name.clone(), instance);
    }

    pub(crate) fn add_field_list(&mut self, list: FieldList) {
        self.field_lists.insert(list.id, list);
    }

    pub(crate) fn set_parsers(&mut self, parsers: Vec<String>, deparsers: Vec<String>) {
        self.parsers = parsers;
        self.deparsers = deparsers;
    }

    pub(crate) fn set_config_options(&mut self, options: FxHashMap<String, String>) {
        self.config_options = options;
    }

    pub(crate) fn set_source(&mut self, source: String) {
        self.source = source;
    }
}
