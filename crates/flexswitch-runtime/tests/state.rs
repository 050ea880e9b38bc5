//! State persistence: serialize/deserialize round-trips and structural
//! mismatch rejection.

use std::fs::File;
use std::sync::Arc;

use flexswitch_core::register::RateConfig;
use flexswitch_core::table::{ActionData, EntryTarget, MatchKeyParam};
use flexswitch_runtime::context::{ContextId, DeviceId};
use flexswitch_runtime::notify::NullTransport;
use flexswitch_runtime::snapshot::StateError;
use flexswitch_runtime::switch::SwitchCore;
use flexswitch_runtime::target::InertTarget;
use flexswitch_runtime::{Error, RuntimeControl};

const CONFIG: &str = r#"{
    "pipelines": [
        {"name": "ingress", "init_node": "fwd",
         "nodes": [
            {"kind": "table", "name": "fwd",
             "actions": ["set_port", "drop"],
             "with_counters": true,
             "next": {"set_port": null, "drop": null}}
         ]}
    ],
    "register_arrays": [{"name": "r0", "size": 8, "bitwidth": 32}],
    "counter_arrays": [{"name": "c0", "size": 4}],
    "meter_arrays": [{"name": "m0", "size": 2, "rate_count": 2}]
}"#;

const OTHER_CONFIG: &str = r#"{
    "pipelines": [
        {"name": "ingress", "init_node": "other",
         "nodes": [
            {"kind": "table", "name": "other", "actions": ["x"],
             "next": {"x": null}}
         ]}
    ]
}"#;

fn preloaded_switch(config: &str) -> SwitchCore {
    let sw = SwitchCore::new(1, true, Box::new(InertTarget), Arc::new(NullTransport));
    sw.init_objects(config.as_bytes(), DeviceId(1)).unwrap();
    sw
}

fn populate(sw: &SwitchCore) {
    let cxt = ContextId(0);
    let h = sw
        .mt_add_entry(
            cxt,
            "fwd",
            vec![MatchKeyParam::Exact(vec![10, 0, 0, 1])],
            "set_port",
            ActionData(vec![vec![3]]),
            None,
        )
        .unwrap();
    sw.mt_write_counters(cxt, "fwd", h, 640, 10).unwrap();
    sw.mt_set_default_action(cxt, "fwd", "drop", ActionData::default())
        .unwrap();
    sw.register_write(cxt, "r0", 5, 0xdead_beef).unwrap();
    sw.write_counters(cxt, "c0", 2, 1500, 3).unwrap();
    sw.meter_set_rates(
        cxt,
        "m0",
        1,
        &[
            RateConfig {
                info_rate: 0.25,
                burst_size: 128,
            },
            RateConfig {
                info_rate: 0.5,
                burst_size: 256,
            },
        ],
    )
    .unwrap();
}

#[test]
fn round_trip_reproduces_mutable_state() {
    let source = preloaded_switch(CONFIG);
    populate(&source);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.bin");
    source
        .serialize_state(ContextId(0), &mut File::create(&path).unwrap())
        .unwrap();

    let restored = preloaded_switch(CONFIG);
    restored
        .deserialize_state(ContextId(0), &mut File::open(&path).unwrap())
        .unwrap();

    let cxt = ContextId(0);
    let entry = restored
        .mt_get_entry_from_key(cxt, "fwd", &[MatchKeyParam::Exact(vec![10, 0, 0, 1])], None)
        .unwrap();
    assert!(matches!(
        entry.target,
        EntryTarget::Action { ref name, ref data } if name == "set_port" && *data == ActionData(vec![vec![3]])
    ));
    assert_eq!(
        restored.mt_read_counters(cxt, "fwd", entry.handle).unwrap(),
        (640, 10)
    );
    assert!(matches!(
        restored.mt_get_default_entry(cxt, "fwd").unwrap(),
        EntryTarget::Action { ref name, .. } if name == "drop"
    ));
    assert_eq!(restored.register_read(cxt, "r0", 5).unwrap(), 0xdead_beef);
    assert_eq!(restored.read_counters(cxt, "c0", 2).unwrap(), (1500, 3));
    let rates = restored.meter_get_rates(cxt, "m0", 1).unwrap();
    assert_eq!(rates.len(), 2);
    assert_eq!(rates[0].burst_size, 128);
    // untouched cells stayed untouched
    assert!(restored.meter_get_rates(cxt, "m0", 0).unwrap().is_empty());
}

#[test]
fn structural_mismatch_is_rejected() {
    let source = preloaded_switch(CONFIG);
    populate(&source);

    let mut buffer = Vec::new();
    source.serialize_state(ContextId(0), &mut buffer).unwrap();

    let other = preloaded_switch(OTHER_CONFIG);
    let err = other
        .deserialize_state(ContextId(0), &mut buffer.as_slice())
        .unwrap_err();
    assert!(matches!(err, Error::State(StateError::Mismatch(_))));

    // nothing was applied
    assert_eq!(other.mt_get_num_entries(ContextId(0), "other").unwrap(), 0);
}

#[test]
fn garbage_bytes_fail_to_decode() {
    let sw = preloaded_switch(CONFIG);
    let err = sw
        .deserialize_state(ContextId(0), &mut b"not a snapshot".as_slice())
        .unwrap_err();
    assert!(matches!(err, Error::State(StateError::Codec(_))));
}

#[test]
fn staged_configuration_is_not_serialized() {
    let source = preloaded_switch(CONFIG);
    populate(&source);
    source
        .load_new_config(ContextId(0), CONFIG.as_bytes())
        .unwrap();

    let mut buffer = Vec::new();
    source.serialize_state(ContextId(0), &mut buffer).unwrap();

    let restored = preloaded_switch(CONFIG);
    restored
        .deserialize_state(ContextId(0), &mut buffer.as_slice())
        .unwrap();
    // the restored context comes up idle, with no swap pending
    assert!(!restored.swap_requested());
}
