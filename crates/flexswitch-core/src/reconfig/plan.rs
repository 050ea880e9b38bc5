//! Plan scripts: line-oriented reconfiguration command sequences.
//!
//! The control plane ships an edit group as a plan, one command per line:
//!
//! ```text
//! insert tabl ingress new_t3
//! change tabl ingress new_t3 hit old_t2
//! insert flex ingress flx_f1 new_t3 old_t1
//! change init ingress flx_f1
//! trigger on
//! ```
//!
//! Parsing is separated from application so that a malformed plan is
//! rejected before any command touches the live graph. Application stops at
//! the first failing command, leaving earlier commands applied; the control
//! plane compensates or resets.

use super::session::{EditSession, RegisterChange};
use super::ReconfigError;
use crate::graph::ConfigGraph;

/// One parsed plan command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanCommand {
    /// `insert tabl <pipeline> <new_id>`
    InsertTable {
        /// Destination pipeline.
        pipeline: String,
        /// Staged table id.
        id: String,
    },
    /// `insert cond <pipeline> <new_id>`
    InsertConditional {
        /// Destination pipeline.
        pipeline: String,
        /// Staged conditional id.
        id: String,
    },
    /// `insert flex <pipeline> <flx_id> <true_id> <false_id>`
    InsertFlex {
        /// Destination pipeline.
        pipeline: String,
        /// Flex node id.
        id: String,
        /// Successor while armed.
        true_id: String,
        /// Successor while disarmed.
        false_id: String,
    },
    /// `insert register_array <new_id> <size> <bitwidth>`
    InsertRegisterArray {
        /// Register array id.
        id: String,
        /// Cell count.
        size: usize,
        /// Cell width in bits.
        bitwidth: u32,
    },
    /// `change tabl <pipeline> <id> <label> <next_id>`
    ChangeTable {
        /// Pipeline of the node.
        pipeline: String,
        /// Table id.
        id: String,
        /// Edge label.
        label: String,
        /// New successor id.
        next_id: String,
    },
    /// `change cond|flex <pipeline> <id> true_next|false_next <next_id>`
    ChangeBranch {
        /// Pipeline of the node.
        pipeline: String,
        /// Conditional or flex id.
        id: String,
        /// Which successor to rewrite.
        true_branch: bool,
        /// New successor id.
        next_id: String,
    },
    /// `change init <pipeline> <next_id>`
    ChangeInit {
        /// Pipeline to repoint.
        pipeline: String,
        /// New init id.
        next_id: String,
    },
    /// `change register_array_size <id> <size>` or
    /// `change register_array_bitwidth <id> <bitwidth>`
    ChangeRegisterArray {
        /// Register array id.
        id: String,
        /// The change to apply.
        change: RegisterChange,
    },
    /// `change register_array_hash <id> <calc_name>`
    ChangeRegisterHash {
        /// Register array id.
        id: String,
        /// Hash calculation name.
        calc: String,
    },
    /// `delete tabl|cond|flex <pipeline> <id>`
    DeleteNode {
        /// Pipeline of the node.
        pipeline: String,
        /// Node id.
        id: String,
        /// Which node kind the command named.
        target: DeleteTarget,
    },
    /// `delete register_array <id>`
    DeleteRegisterArray {
        /// Register array id.
        id: String,
    },
    /// `trigger on|off [number]`
    Trigger {
        /// Arm (`true`) or disarm.
        on: bool,
        /// Mount-point filter; `None` selects every flex node.
        number: Option<u32>,
    },
}

/// Node kind named by a `delete` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteTarget {
    /// `delete tabl`
    Table,
    /// `delete cond`
    Conditional,
    /// `delete flex`
    Flex,
}

fn bad(line: &str) -> ReconfigError {
    ReconfigError::InvalidCommand(line.to_string())
}

fn parse_branch_selector(token: &str, line: &str) -> Result<bool, ReconfigError> {
    match token {
        "true_next" => Ok(true),
        "false_next" => Ok(false),
        _ => Err(bad(line)),
    }
}

/// Parses a whole plan. No command is applied.
///
/// # Errors
///
/// `InvalidCommand` naming the offending line.
pub fn parse_plan(text: &str) -> Result<Vec<PlanCommand>, ReconfigError> {
    let mut commands = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let command = match (tokens[0], tokens.get(1).copied()) {
            ("insert", Some("tabl")) => match &tokens[2..] {
                [pipeline, id] => PlanCommand::InsertTable {
                    pipeline: pipeline.to_string(),
                    id: id.to_string(),
                },
                _ => return Err(bad(line)),
            },
            ("insert", Some("cond")) => match &tokens[2..] {
                [pipeline, id] => PlanCommand::InsertConditional {
                    pipeline: pipeline.to_string(),
                    id: id.to_string(),
                },
                _ => return Err(bad(line)),
            },
            ("insert", Some("flex")) => match &tokens[2..] {
                [pipeline, id, true_id, false_id] => PlanCommand::InsertFlex {
                    pipeline: pipeline.to_string(),
                    id: id.to_string(),
                    true_id: true_id.to_string(),
                    false_id: false_id.to_string(),
                },
                _ => return Err(bad(line)),
            },
            ("insert", Some("register_array")) => match &tokens[2..] {
                [id, size, bitwidth] => PlanCommand::InsertRegisterArray {
                    id: id.to_string(),
                    size: size.parse().map_err(|_| bad(line))?,
                    bitwidth: bitwidth.parse().map_err(|_| bad(line))?,
                },
                _ => return Err(bad(line)),
            },
            ("change", Some("tabl")) => match &tokens[2..] {
                [pipeline, id, label, next_id] => PlanCommand::ChangeTable {
                    pipeline: pipeline.to_string(),
                    id: id.to_string(),
                    label: label.to_string(),
                    next_id: next_id.to_string(),
                },
                _ => return Err(bad(line)),
            },
            ("change", Some("cond" | "flex")) => match &tokens[2..] {
                [pipeline, id, selector, next_id] => PlanCommand::ChangeBranch {
                    pipeline: pipeline.to_string(),
                    id: id.to_string(),
                    true_branch: parse_branch_selector(selector, line)?,
                    next_id: next_id.to_string(),
                },
                _ => return Err(bad(line)),
            },
            ("change", Some("init")) => match &tokens[2..] {
                [pipeline, next_id] => PlanCommand::ChangeInit {
                    pipeline: pipeline.to_string(),
                    next_id: next_id.to_string(),
                },
                _ => return Err(bad(line)),
            },
            ("change", Some("register_array_size")) => match &tokens[2..] {
                [id, size] => PlanCommand::ChangeRegisterArray {
                    id: id.to_string(),
                    change: RegisterChange::Resize(size.parse().map_err(|_| bad(line))?),
                },
                _ => return Err(bad(line)),
            },
            ("change", Some("register_array_bitwidth")) => match &tokens[2..] {
                [id, bitwidth] => PlanCommand::ChangeRegisterArray {
                    id: id.to_string(),
                    change: RegisterChange::Bitwidth(bitwidth.parse().map_err(|_| bad(line))?),
                },
                _ => return Err(bad(line)),
            },
            ("change", Some("register_array_hash")) => match &tokens[2..] {
                [id, calc] => PlanCommand::ChangeRegisterHash {
                    id: id.to_string(),
                    calc: calc.to_string(),
                },
                _ => return Err(bad(line)),
            },
            ("delete", Some(target @ ("tabl" | "cond" | "flex"))) => match &tokens[2..] {
                [pipeline, id] => PlanCommand::DeleteNode {
                    pipeline: pipeline.to_string(),
                    id: id.to_string(),
                    target: match target {
                        "tabl" => DeleteTarget::Table,
                        "cond" => DeleteTarget::Conditional,
                        _ => DeleteTarget::Flex,
                    },
                },
                _ => return Err(bad(line)),
            },
            ("delete", Some("register_array")) => match &tokens[2..] {
                [id] => PlanCommand::DeleteRegisterArray { id: id.to_string() },
                _ => return Err(bad(line)),
            },
            ("trigger", Some(state @ ("on" | "off"))) => {
                let number = match &tokens[2..] {
                    [] => None,
                    [n] => Some(n.parse().map_err(|_| bad(line))?),
                    _ => return Err(bad(line)),
                };
                PlanCommand::Trigger {
                    on: state == "on",
                    number,
                }
            }
            _ => return Err(bad(line)),
        };
        commands.push(command);
    }
    Ok(commands)
}

/// Applies a parsed plan through a session. Returns whether any
/// `trigger on` ran, which is what ends the edit session for the caller.
///
/// Application stops at the first failing command.
///
/// # Errors
///
/// The first command failure, verbatim.
pub fn apply_plan(
    live: &mut ConfigGraph,
    session: &mut EditSession,
    commands: &[PlanCommand],
) -> Result<bool, ReconfigError> {
    let mut triggered_on = false;
    for command in commands {
        match command {
            PlanCommand::InsertTable { pipeline, id } => {
                session.insert_table(live, pipeline, id)?;
            }
            PlanCommand::InsertConditional { pipeline, id } => {
                session.insert_conditional(live, pipeline, id)?;
            }
            PlanCommand::InsertFlex {
                pipeline,
                id,
                true_id,
                false_id,
            } => {
                session.insert_flex(live, pipeline, id, true_id, false_id)?;
            }
            PlanCommand::InsertRegisterArray { id, size, bitwidth } => {
                session.insert_register_array(live, id, *size, *bitwidth)?;
            }
            PlanCommand::ChangeTable {
                pipeline,
                id,
                label,
                next_id,
            } => {
                session.change_table(live, pipeline, id, label, next_id)?;
            }
            PlanCommand::ChangeBranch {
                pipeline,
                id,
                true_branch,
                next_id,
            } => {
                session.change_branch(live, pipeline, id, *true_branch, next_id)?;
            }
            PlanCommand::ChangeInit { pipeline, next_id } => {
                session.change_init(live, pipeline, next_id)?;
            }
            PlanCommand::ChangeRegisterArray { id, change } => {
                session.change_register_array(live, id, *change)?;
            }
            PlanCommand::ChangeRegisterHash { id, calc } => {
                session.change_register_hash(live, id, calc)?;
            }
            PlanCommand::DeleteNode {
                pipeline,
                id,
                target,
            } => match target {
                DeleteTarget::Table => session.delete_table(live, pipeline, id)?,
                DeleteTarget::Conditional => session.delete_conditional(live, pipeline, id)?,
                DeleteTarget::Flex => session.delete_flex(live, pipeline, id)?,
            },
            PlanCommand::DeleteRegisterArray { id } => {
                session.delete_register_array(live, id)?;
            }
            PlanCommand::Trigger { on, number } => {
                live.flex_trigger(*on, *number);
                if *on {
                    triggered_on = true;
                }
            }
        }
    }
    Ok(triggered_on)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use fxhash::FxHashSet;

    use super::*;
    use crate::graph::{load_config, ArithSpec, Decision};
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
                ]
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
    fn parse_rejects_unknown_op() {
        assert!(matches!(
            parse_plan("summon tabl ingress new_x"),
            Err(ReconfigError::InvalidCommand(_))
        ));
        assert!(matches!(
            parse_plan("insert tabl ingress"),
            Err(ReconfigError::InvalidCommand(_))
        ));
        assert!(matches!(
            parse_plan("trigger maybe"),
            Err(ReconfigError::InvalidCommand(_))
        ));
    }

    #[test]
    fn parse_skips_blank_and_comment_lines() {
        let commands = parse_plan("\n# staged rollout\ninsert tabl ingress new_t3\n").unwrap();
        assert_eq!(commands.len(), 1);
    }

    #[test]
    fn full_plan_reroutes_pipeline() {
        let mut live = live_graph();
        let mut session = EditSession::new(staging_graph());
        let commands = parse_plan(
            "insert tabl ingress new_t3\n\
             change tabl ingress new_t3 hit old_t2\n\
             insert flex ingress flx_f1 new_t3 old_t1\n\
             change init ingress flx_f1\n\
             trigger on",
        )
        .unwrap();

        let triggered = apply_plan(&mut live, &mut session, &commands).unwrap();
        assert!(triggered);

        let path = live
            .pipeline("ingress")
            .unwrap()
            .walk(|_| Decision::Label("hit".to_string()));
        assert_eq!(path, vec!["f1", "t3", "t2"]);

        // disarm: back to the original route
        live.flex_trigger(false, None);
        let path = live
            .pipeline("ingress")
            .unwrap()
            .walk(|_| Decision::Label("hit".to_string()));
        assert_eq!(path, vec!["f1", "t1", "t2"]);
    }

    #[test]
    fn trigger_with_number_parses() {
        let commands = parse_plan("trigger on 4").unwrap();
        assert_eq!(
            commands,
            vec![PlanCommand::Trigger {
                on: true,
                number: Some(4)
            }]
        );
    }

    #[test]
    fn apply_stops_at_first_failure() {
        let mut live = live_graph();
        let mut session = EditSession::new(staging_graph());
        let commands = parse_plan(
            "insert tabl ingress new_t3\n\
             change tabl ingress new_ghost hit old_t2\n\
             change init ingress new_t3",
        )
        .unwrap();
        let err = apply_plan(&mut live, &mut session, &commands).unwrap_err();
        assert!(matches!(err, ReconfigError::UnknownId(_)));
        // the first command landed, the last never ran
        assert!(live.table("t3").is_some());
        assert_eq!(live.pipeline("ingress").unwrap().init(), Some("t1"));
    }
}
