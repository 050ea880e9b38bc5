//! Incremental reconfiguration: trigger atomicity, the id-naming
//! discipline, plan scripts, mount-point filtering, register surgery.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use flexswitch_core::graph::{Decision, Node};
use flexswitch_core::reconfig::ReconfigError;
use flexswitch_runtime::context::{ContextId, DeviceId};
use flexswitch_runtime::notify::NullTransport;
use flexswitch_runtime::switch::SwitchCore;
use flexswitch_runtime::target::InertTarget;
use flexswitch_runtime::{Error, RuntimeControl};

const LIVE: &str = r#"{
    "pipelines": [
        {"name": "ingress", "init_node": "a",
         "nodes": [
            {"kind": "table", "name": "a", "actions": ["hit"],
             "next": {"hit": "t1"}},
            {"kind": "table", "name": "t1", "actions": ["hit"],
             "next": {"hit": "t2"}},
            {"kind": "table", "name": "t2", "actions": ["hit"],
             "next": {"hit": null}}
         ]}
    ],
    "crc_calculators": [{"name": "calc0", "width": 32}]
}"#;

const STAGING: &str = r#"{
    "pipelines": [
        {"name": "ingress",
         "nodes": [
            {"kind": "table", "name": "t3", "actions": ["hit"]}
         ]}
    ]
}"#;

fn hit() -> impl FnMut(&Node) -> Decision {
    |_| Decision::Label("hit".to_string())
}

fn preloaded_switch() -> Arc<SwitchCore> {
    let sw = Arc::new(SwitchCore::new(
        1,
        true,
        Box::new(InertTarget),
        Arc::new(NullTransport),
    ));
    sw.init_objects(LIVE.as_bytes(), DeviceId(1)).unwrap();
    sw
}

fn walk(sw: &SwitchCore) -> Vec<String> {
    sw.context(ContextId(0))
        .unwrap()
        .live()
        .pipeline("ingress")
        .unwrap()
        .walk(hit())
}

#[test]
fn staged_edits_invisible_until_trigger() {
    let sw = preloaded_switch();
    let cxt = ContextId(0);

    sw.reconfig_init_staging(cxt, STAGING.as_bytes()).unwrap();
    sw.reconfig_insert_table(cxt, "ingress", "new_t3").unwrap();
    sw.reconfig_change_table(cxt, "ingress", "new_t3", "hit", "old_t2")
        .unwrap();
    sw.reconfig_insert_flex(cxt, "ingress", "flx_f1", "new_t3", "old_a")
        .unwrap();
    sw.reconfig_change_init(cxt, "ingress", "flx_f1").unwrap();

    // flex disarmed: packets still take the original region
    assert_eq!(walk(&sw), vec!["f1", "a", "t1", "t2"]);

    sw.reconfig_trigger(cxt, true, -1).unwrap();
    assert_eq!(walk(&sw), vec!["f1", "t3", "t2"]);

    // the trigger ended the edit session
    assert!(!sw.context(cxt).unwrap().edit_session_open());

    sw.reconfig_trigger(cxt, false, -1).unwrap();
    assert_eq!(walk(&sw), vec!["f1", "a", "t1", "t2"]);
}

#[test]
fn trigger_is_atomic_under_concurrent_walks() {
    let sw = preloaded_switch();
    let cxt = ContextId(0);

    sw.reconfig_init_staging(cxt, STAGING.as_bytes()).unwrap();
    sw.reconfig_insert_table(cxt, "ingress", "new_t3").unwrap();
    sw.reconfig_change_table(cxt, "ingress", "new_t3", "hit", "old_t2")
        .unwrap();
    sw.reconfig_insert_flex(cxt, "ingress", "flx_f1", "new_t3", "old_a")
        .unwrap();
    sw.reconfig_change_init(cxt, "ingress", "flx_f1").unwrap();

    let pre_trigger = vec![
        "f1".to_string(),
        "a".to_string(),
        "t1".to_string(),
        "t2".to_string(),
    ];
    let post_trigger = vec!["f1".to_string(), "t3".to_string(), "t2".to_string()];

    let stop = Arc::new(AtomicBool::new(false));
    let triggered = Arc::new(AtomicBool::new(false));

    let mut walkers = Vec::new();
    for _ in 0..4 {
        let sw = Arc::clone(&sw);
        let stop = Arc::clone(&stop);
        let triggered = Arc::clone(&triggered);
        let pre = pre_trigger.clone();
        let post = post_trigger.clone();
        walkers.push(thread::spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                let trigger_was_done = triggered.load(Ordering::SeqCst);
                let path = walk(&sw);
                assert!(
                    path == pre || path == post,
                    "mixed successor view: {path:?}"
                );
                // once the trigger call has returned, only the new region
                if trigger_was_done {
                    assert_eq!(path, post);
                }
            }
        }));
    }

    thread::sleep(Duration::from_millis(30));
    sw.reconfig_trigger(cxt, true, -1).unwrap();
    triggered.store(true, Ordering::SeqCst);
    thread::sleep(Duration::from_millis(30));
    stop.store(true, Ordering::SeqCst);
    for walker in walkers {
        walker.join().unwrap();
    }
}

#[test]
fn id_naming_discipline_enforced() {
    let sw = preloaded_switch();
    let cxt = ContextId(0);
    sw.reconfig_init_staging(cxt, STAGING.as_bytes()).unwrap();

    sw.reconfig_insert_table(cxt, "ingress", "new_t3").unwrap();

    let err = sw.reconfig_insert_table(cxt, "ingress", "new_t3").unwrap_err();
    assert!(matches!(err, Error::Reconfig(ReconfigError::DuplicateId(_))));

    let err = sw
        .reconfig_change_table(cxt, "ingress", "xxx_foo", "hit", "old_t2")
        .unwrap_err();
    assert!(matches!(err, Error::Reconfig(ReconfigError::Prefix(_))));

    let err = sw
        .reconfig_change_table(cxt, "ingress", "new_unseen", "hit", "old_t2")
        .unwrap_err();
    assert!(matches!(err, Error::Reconfig(ReconfigError::UnknownId(_))));
}

#[test]
fn plan_script_drives_whole_edit_group() {
    let sw = preloaded_switch();
    let cxt = ContextId(0);

    sw.run_reconfig_plan(
        cxt,
        STAGING.as_bytes(),
        "insert tabl ingress new_t3\n\
         change tabl ingress new_t3 hit old_t2\n\
         insert flex ingress flx_f1 new_t3 old_a\n\
         change init ingress flx_f1\n\
         trigger on",
    )
    .unwrap();

    assert_eq!(walk(&sw), vec!["f1", "t3", "t2"]);
    assert!(!sw.context(cxt).unwrap().edit_session_open());
}

#[test]
fn plan_without_trigger_keeps_session_open() {
    let sw = preloaded_switch();
    let cxt = ContextId(0);

    sw.run_reconfig_plan(
        cxt,
        STAGING.as_bytes(),
        "insert tabl ingress new_t3\n\
         change tabl ingress new_t3 hit old_t2",
    )
    .unwrap();

    assert!(sw.context(cxt).unwrap().edit_session_open());
    // data plane unaffected: nothing reaches t3 yet
    assert_eq!(walk(&sw), vec!["a", "t1", "t2"]);
}

#[test]
fn trigger_number_filters_by_mount_point() {
    let sw = preloaded_switch();
    let cxt = ContextId(0);
    sw.reconfig_init_staging(cxt, STAGING.as_bytes()).unwrap();

    sw.reconfig_insert_flex(
        cxt,
        "ingress",
        "flx_flex_func_mount_point_number_$1$",
        "old_t2",
        "old_t1",
    )
    .unwrap();
    sw.reconfig_insert_flex(
        cxt,
        "ingress",
        "flx_flex_func_mount_point_number_$2$",
        "old_t2",
        "old_t1",
    )
    .unwrap();

    sw.reconfig_trigger(cxt, true, 1).unwrap();

    let ctx = sw.context(cxt).unwrap();
    let live = ctx.live();
    let pipeline = live.pipeline("ingress").unwrap();
    let armed = |name: &str| match pipeline.node(name) {
        Some(Node::Flex(x)) => x.armed,
        _ => panic!("expected flex node {name}"),
    };
    assert!(armed("flex_func_mount_point_number_$1$"));
    assert!(!armed("flex_func_mount_point_number_$2$"));
}

#[test]
fn register_array_surgery_through_facade() {
    let sw = preloaded_switch();
    let cxt = ContextId(0);
    sw.reconfig_init_staging(cxt, STAGING.as_bytes()).unwrap();

    sw.reconfig_insert_register_array(cxt, "new_sketch", 32, 16)
        .unwrap();
    sw.register_write(cxt, "sketch", 3, 0xffff).unwrap();

    // resize keeps the prefix
    sw.reconfig_change_register_array(cxt, "new_sketch", 0, 64)
        .unwrap();
    assert_eq!(sw.register_read(cxt, "sketch", 3).unwrap(), 0xffff);
    assert_eq!(sw.register_read_all(cxt, "sketch").unwrap().len(), 64);

    // re-width re-masks stored values
    sw.reconfig_change_register_array(cxt, "new_sketch", 1, 8)
        .unwrap();
    assert_eq!(sw.register_read(cxt, "sketch", 3).unwrap(), 0xff);

    let err = sw
        .reconfig_change_register_array(cxt, "new_sketch", 2, 8)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Reconfig(ReconfigError::InvalidCommand(_))
    ));

    sw.reconfig_delete_register_array(cxt, "new_sketch").unwrap();
    assert!(sw.register_read(cxt, "sketch", 0).is_err());
}

#[test]
fn conditional_surgery_shares_flex_edge_model() {
    let staging = r#"{
        "pipelines": [
            {"name": "ingress",
             "nodes": [
                {"kind": "conditional", "name": "guard",
                 "expression": "hdr.ipv4.ttl > 1"}
             ]}
        ]
    }"#;
    let sw = preloaded_switch();
    let cxt = ContextId(0);
    sw.reconfig_init_staging(cxt, staging.as_bytes()).unwrap();

    sw.reconfig_insert_conditional(cxt, "ingress", "new_guard")
        .unwrap();
    sw.reconfig_change_conditional(cxt, "ingress", "new_guard", true, "old_t1")
        .unwrap();
    sw.reconfig_change_conditional(cxt, "ingress", "new_guard", false, "old_t2")
        .unwrap();

    let ctx = sw.context(cxt).unwrap();
    {
        let live = ctx.live();
        match live.pipeline("ingress").unwrap().node("guard") {
            Some(Node::Conditional(c)) => {
                assert_eq!(c.true_next.as_deref(), Some("t1"));
                assert_eq!(c.false_next.as_deref(), Some("t2"));
            }
            _ => panic!("expected conditional"),
        }
    }

    // rewiring a table through the branch path is a kind error
    let err = sw
        .reconfig_change_flex(cxt, "ingress", "old_t1", true, "old_t2")
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Reconfig(ReconfigError::Graph(
            flexswitch_core::graph::ConfigError::WrongNodeKind(_)
        ))
    ));

    sw.reconfig_delete_conditional(cxt, "ingress", "new_guard")
        .unwrap();
}
