//! JSON configuration loader.
//!
//! Turns a configuration byte stream into a fully-built [`ConfigGraph`],
//! then validates it against the switch's required fields and applies the
//! forced-arithmetic spec. The schema is deliberately compact; anything the
//! core does not interpret (expressions, extern attributes, target options)
//! is carried as opaque strings.

use std::sync::Arc;

use fxhash::{FxHashMap, FxHashSet};
use serde::Deserialize;

use crate::action_profile::ActionProfile;
use crate::crc::CrcCalculator;
use crate::lookup::LookupFactory;
use crate::register::{CounterArray, MeterArray, ParseValueSet, RegisterArray};
use crate::table::{MatchKind, MatchTable, TableDecl, TableKind};

use super::config::{
    ConfigError, ConfigGraph, ExternInstance, FieldList, HeaderField, LearnList,
};
use super::node::{BranchNode, FlexNode, Node, TableNode};
use super::pipeline::Pipeline;

/// Fields that must come up arithmetic-capable, applied at load time.
///
/// Fields absent from the configuration are skipped, matching the loader's
/// contract that forcing arithmetic is a safeguard, not a requirement.
#[derive(Debug, Clone, Default)]
pub struct ArithSpec {
    /// Individual `(header, field)` pairs.
    pub fields: FxHashSet<(String, String)>,
    /// Whole headers.
    pub headers: FxHashSet<String>,
}

#[derive(Deserialize)]
struct RawConfig {
    #[serde(default)]
    headers: Vec<RawHeader>,
    #[serde(default)]
    pipelines: Vec<RawPipeline>,
    #[serde(default)]
    action_profiles: Vec<RawProfile>,
    #[serde(default)]
    register_arrays: Vec<RawRegister>,
    #[serde(default)]
    counter_arrays: Vec<RawCounter>,
    #[serde(default)]
    meter_arrays: Vec<RawMeter>,
    #[serde(default)]
    parse_vsets: Vec<RawVset>,
    #[serde(default)]
    learn_lists: Vec<RawLearnList>,
    #[serde(default)]
    crc_calculators: Vec<RawCrc>,
    #[serde(default)]
    extern_instances: Vec<RawExtern>,
    #[serde(default)]
    field_lists: Vec<RawFieldList>,
    #[serde(default)]
    parsers: Vec<String>,
    #[serde(default)]
    deparsers: Vec<String>,
    #[serde(default)]
    config_options: FxHashMap<String, String>,
}

#[derive(Deserialize)]
struct RawHeader {
    name: String,
    #[serde(default)]
    fields: Vec<(String, u32)>,
}

#[derive(Deserialize)]
struct RawPipeline {
    name: String,
    #[serde(default)]
    init_node: Option<String>,
    #[serde(default)]
    nodes: Vec<RawNode>,
}

#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum RawNode {
    Table {
        name: String,
        #[serde(default = "default_match_kind")]
        match_kind: RawMatchKind,
        #[serde(default)]
        mode: RawTableMode,
        #[serde(default)]
        actions: Vec<String>,
        #[serde(default)]
        profile: Option<String>,
        #[serde(default)]
        next: FxHashMap<String, Option<String>>,
        #[serde(default)]
        with_counters: bool,
        #[serde(default)]
        with_meters: bool,
    },
    Conditional {
        name: String,
        #[serde(default)]
        expression: Option<String>,
        #[serde(default)]
        true_next: Option<String>,
        #[serde(default)]
        false_next: Option<String>,
    },
    Flex {
        name: String,
        #[serde(default)]
        true_next: Option<String>,
        #[serde(default)]
        false_next: Option<String>,
        #[serde(default)]
        mount_point: Option<u32>,
    },
}

#[derive(Deserialize, Clone, Copy)]
#[serde(rename_all = "snake_case")]
enum RawMatchKind {
    Exact,
    Lpm,
    Ternary,
    Range,
}

fn default_match_kind() -> RawMatchKind {
    RawMatchKind::Exact
}

#[derive(Deserialize, Clone, Copy, Default)]
#[serde(rename_all = "snake_case")]
enum RawTableMode {
    #[default]
    Direct,
    Indirect,
    IndirectWs,
}

#[derive(Deserialize)]
struct RawProfile {
    name: String,
    #[serde(default)]
    actions: Vec<String>,
    #[serde(default)]
    with_selector: bool,
}

#[derive(Deserialize)]
struct RawRegister {
    name: String,
    size: usize,
    bitwidth: u32,
}

#[derive(Deserialize)]
struct RawCounter {
    name: String,
    size: usize,
}

#[derive(Deserialize)]
struct RawMeter {
    name: String,
    size: usize,
    #[serde(default = "default_rate_count")]
    rate_count: usize,
}

fn default_rate_count() -> usize {
    2
}

#[derive(Deserialize)]
struct RawVset {
    name: String,
    compressed_bitwidth: u32,
}

#[derive(Deserialize)]
struct RawLearnList {
    id: u32,
    name: String,
    #[serde(default)]
    fields: Vec<(String, String)>,
}

#[derive(Deserialize)]
struct RawCrc {
    name: String,
    width: u32,
}

#[derive(Deserialize)]
struct RawExtern {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    attributes: FxHashMap<String, String>,
}

#[derive(Deserialize)]
struct RawFieldList {
    id: u32,
    #[serde(default)]
    fields: Vec<(String, String)>,
}

impl From<RawMatchKind> for MatchKind {
    fn from(raw: RawMatchKind) -> Self {
        match raw {
            RawMatchKind::Exact => MatchKind::Exact,
            RawMatchKind::Lpm => MatchKind::Lpm,
            RawMatchKind::Ternary => MatchKind::Ternary,
            RawMatchKind::Range => MatchKind::Range,
        }
    }
}

impl From<RawTableMode> for TableKind {
    fn from(raw: RawTableMode) -> Self {
        match raw {
            RawTableMode::Direct => TableKind::Direct,
            RawTableMode::Indirect => TableKind::Indirect,
            RawTableMode::IndirectWs => TableKind::IndirectWs,
        }
    }
}

/// Builds a [`ConfigGraph`] from configuration bytes.
///
/// Validation order follows failure visibility: parse, then object
/// construction (duplicate and reference checks), then graph structure,
/// then required fields. The forced-arithmetic spec is applied last and
/// never fails.
///
/// # Errors
///
/// `Parse` for malformed bytes, `DuplicateObject`/`UnresolvedReference`/
/// `UnknownNode` for ill-formed configurations, `RequiredFieldMissing` when
/// a registered required field is absent.
pub fn load_config(
    bytes: &[u8],
    required_fields: &FxHashSet<(String, String)>,
    arith: &ArithSpec,
    factory: &Arc<dyn LookupFactory>,
) -> Result<ConfigGraph, ConfigError> {
    let raw: RawConfig = serde_json::from_slice(bytes)?;
    let mut graph = ConfigGraph::empty(Arc::clone(factory));

    for header in raw.headers {
        let fields = header
            .fields
            .into_iter()
            .map(|(name, bitwidth)| HeaderField {
                name,
                bitwidth,
                arith: false,
            })
            .collect();
        graph.add_header(header.name, fields);
    }

    for profile in &raw.action_profiles {
        graph.add_action_profile(ActionProfile::new(
            profile.name.clone(),
            profile.actions.clone(),
            profile.with_selector,
        ))?;
    }

    for pipeline in raw.pipelines {
        let mut p = Pipeline::new(pipeline.name);
        for node in pipeline.nodes {
            p.add_node(build_node(node, &raw.action_profiles, factory)?)?;
        }
        p.set_init(pipeline.init_node)?;
        graph.add_pipeline(p)?;
    }

    for register in raw.register_arrays {
        graph.add_register_array(RegisterArray::new(
            register.name,
            register.size,
            register.bitwidth,
        ))?;
    }
    for counter in raw.counter_arrays {
        graph.add_counter_array(CounterArray::new(counter.name, counter.size))?;
    }
    for meter in raw.meter_arrays {
        graph.add_meter_array(MeterArray::new(meter.name, meter.size, meter.rate_count))?;
    }
    for vset in raw.parse_vsets {
        graph.add_parse_vset(ParseValueSet::new(vset.name, vset.compressed_bitwidth))?;
    }
    for list in raw.learn_lists {
        graph.add_learn_list(LearnList {
            id: list.id,
            name: list.name,
            fields: list.fields,
        });
    }
    for crc in raw.crc_calculators {
        let calc = match crc.width {
            16 => CrcCalculator::crc16(crc.name),
            _ => CrcCalculator::crc32(crc.name),
        };
        graph.add_crc_calculator(calc);
    }
    for ext in raw.extern_instances {
        graph.add_extern_instance(ExternInstance {
            name: ext.name,
            kind: ext.kind,
            attributes: ext.attributes,
        });
    }
    for list in raw.field_lists {
        graph.add_field_list(FieldList {
            id: list.id,
            fields: list.fields,
        });
    }
    graph.set_parsers(raw.parsers, raw.deparsers);
    graph.set_config_options(raw.config_options);

    graph.validate()?;

    for (header, field) in required_fields {
        if !graph.field_exists(header, field) {
            return Err(ConfigError::RequiredFieldMissing {
                header: header.clone(),
                field: field.clone(),
            });
        }
    }

    for (header, field) in &arith.fields {
        graph.enable_arith(header, field);
    }
    for header in &arith.headers {
        graph.enable_header_arith(header);
    }

    graph.set_source(String::from_utf8_lossy(bytes).into_owned());
    Ok(graph)
}

fn build_node(
    raw: RawNode,
    profiles: &[RawProfile],
    factory: &Arc<dyn LookupFactory>,
) -> Result<Node, ConfigError> {
    match raw {
        RawNode::Table {
            name,
            match_kind,
            mode,
            actions,
            profile,
            next,
            with_counters,
            with_meters,
        } => {
            let kind = TableKind::from(mode);
            if kind != TableKind::Direct {
                let profile_name = profile
                    .as_deref()
                    .ok_or_else(|| ConfigError::UnresolvedReference(name.clone()))?;
                if !profiles.iter().any(|p| p.name == profile_name) {
                    return Err(ConfigError::UnresolvedReference(profile_name.to_string()));
                }
            }
            let table = MatchTable::new(
                TableDecl {
                    name,
                    kind,
                    match_kind: match_kind.into(),
                    actions,
                    profile,
                    with_counters,
                    with_meters,
                },
                factory.as_ref(),
            );
            Ok(Node::Table(TableNode { table, next }))
        }
        RawNode::Conditional {
            name,
            expression,
            true_next,
            false_next,
        } => Ok(Node::Conditional(BranchNode {
            name,
            expression,
            true_next,
            false_next,
        })),
        RawNode::Flex {
            name,
            true_next,
            false_next,
            mount_point,
        } => Ok(Node::Flex(FlexNode {
            name,
            true_next,
            false_next,
            armed: false,
            mount_point,
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::DefaultLookupFactory;

    fn factory() -> Arc<dyn LookupFactory> {
        Arc::new(DefaultLookupFactory)
    }

    fn basic_config() -> &'static str {
        r#"{
            "headers": [
                {"name": "standard_metadata",
                 "fields": [["ingress_port", 9], ["egress_port", 9]]},
                {"name": "ipv4", "fields": [["dstAddr", 32], ["ttl", 8]]}
            ],
            "pipelines": [
                {"name": "ingress", "init_node": "acl",
                 "nodes": [
                    {"kind": "table", "name": "acl",
                     "match_kind": "ternary",
                     "actions": ["permit", "deny"],
                     "next": {"permit": "fwd", "deny": null}},
                    {"kind": "table", "name": "fwd",
                     "actions": ["set_port"],
                     "next": {"set_port": null}}
                 ]}
            ],
            "register_arrays": [{"name": "r0", "size": 16, "bitwidth": 32}],
            "counter_arrays": [{"name": "c0", "size": 8}],
            "meter_arrays": [{"name": "m0", "size": 4, "rate_count": 2}],
            "parse_vsets": [{"name": "v0", "compressed_bitwidth": 12}],
            "crc_calculators": [{"name": "calc0", "width": 16}],
            "extern_instances": [
                {"name": "e0", "type": "stateful_probe", "attributes": {"depth": "4"}}
            ],
            "config_options": {"target": "softswitch"}
        }"#
    }

    #[test]
    fn loads_complete_config() {
        let graph = load_config(
            basic_config().as_bytes(),
            &FxHashSet::default(),
            &ArithSpec::default(),
            &factory(),
        )
        .unwrap();
        assert!(graph.pipeline("ingress").is_some());
        assert_eq!(graph.pipeline("ingress").unwrap().init(), Some("acl"));
        assert!(graph.table("acl").is_some());
        assert_eq!(graph.register_array("r0").unwrap().size(), 16);
        assert_eq!(graph.counter_array("c0").unwrap().size(), 8);
        assert!(graph.crc_calculator("calc0").is_some());
        assert_eq!(graph.extern_instance("e0").unwrap().kind, "stateful_probe");
        assert_eq!(
            graph.config_options().get("target").map(String::as_str),
            Some("softswitch")
        );
        assert!(graph.field_exists("ipv4", "ttl"));
    }

    #[test]
    fn malformed_json_rejected() {
        let err = load_config(
            b"not json",
            &FxHashSet::default(),
            &ArithSpec::default(),
            &factory(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn required_field_enforced() {
        let mut required = FxHashSet::default();
        required.insert(("standard_metadata".to_string(), "mcast_grp".to_string()));
        let err = load_config(
            basic_config().as_bytes(),
            &required,
            &ArithSpec::default(),
            &factory(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::RequiredFieldMissing { ref header, ref field }
                if header == "standard_metadata" && field == "mcast_grp"
        ));
    }

    #[test]
    fn required_field_present_passes() {
        let mut required = FxHashSet::default();
        required.insert(("standard_metadata".to_string(), "egress_port".to_string()));
        load_config(
            basic_config().as_bytes(),
            &required,
            &ArithSpec::default(),
            &factory(),
        )
        .unwrap();
    }

    #[test]
    fn dangling_edge_rejected() {
        let config = r#"{
            "pipelines": [
                {"name": "ingress", "init_node": "t",
                 "nodes": [
                    {"kind": "table", "name": "t", "actions": ["a"],
                     "next": {"a": "missing"}}
                 ]}
            ]
        }"#;
        let err = load_config(
            config.as_bytes(),
            &FxHashSet::default(),
            &ArithSpec::default(),
            &factory(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownNode(n) if n == "missing"));
    }

    #[test]
    fn indirect_table_requires_known_profile() {
        let config = r#"{
            "pipelines": [
                {"name": "ingress",
                 "nodes": [
                    {"kind": "table", "name": "t", "mode": "indirect",
                     "profile": "ghost"}
                 ]}
            ]
        }"#;
        let err = load_config(
            config.as_bytes(),
            &FxHashSet::default(),
            &ArithSpec::default(),
            &factory(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnresolvedReference(p) if p == "ghost"));
    }

    #[test]
    fn arith_spec_applied() {
        let arith = ArithSpec {
            fields: [("ipv4".to_string(), "ttl".to_string())].into_iter().collect(),
            headers: ["standard_metadata".to_string()].into_iter().collect(),
        };
        let graph = load_config(
            basic_config().as_bytes(),
            &FxHashSet::default(),
            &arith,
            &factory(),
        )
        .unwrap();
        assert!(graph.arith_enabled("ipv4", "ttl"));
        assert!(!graph.arith_enabled("ipv4", "dstAddr"));
        assert!(graph.arith_enabled("standard_metadata", "ingress_port"));
    }
}
