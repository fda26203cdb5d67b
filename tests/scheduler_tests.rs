mod common;

use common::{binary, field, group, int, prepare, program, run, store};
use serde_json::json;
use weft::{
    program::AccessMode,
    runtime::{RuntimeConfig, Value, composition::LockEntry},
};

fn independent_instances(count: usize) -> weft::program::Program {
    let instances: Vec<_> = (0..count)
        .map(|i| json!({ "name": format!("t{i}"), "type": "Tally" }))
        .collect();
    program(json!({
        "types": [{
            "name": "Tally",
            "size": 8,
            "fields": [{ "name": "hits", "offset": 0, "kind": { "scalar": "int" } }],
            "actions": [{
                "name": "hit",
                "triggers": group(json!([{ "fields": ["hits"], "mode": "write" }])),
                "body": [store(0, "int", binary("add", field(0, "int"), int(1)))]
            }]
        }],
        "instances": instances
    }))
}

#[test]
fn every_enabled_instance_fires_with_any_worker_count() {
    for workers in 1..=4 {
        let runtime = run(independent_instances(16), workers);
        for i in 0..16 {
            let name = format!("t{i}");
            assert_eq!(runtime.firings(&name), Some(1), "{name} with {workers} workers");
            assert_eq!(runtime.read_field(&name, "hits").unwrap(), Value::Int(1));
        }
    }
}

#[test]
fn deferred_stores_requeue_until_disabled() {
    let counter = json!({
        "name": "Loop",
        "size": 8,
        "fields": [{ "name": "n", "offset": 0, "kind": { "scalar": "int" } }],
        "actions": [{
            "name": "step",
            "precondition": binary("lt", field(0, "int"), int(100)),
            "triggers": group(json!([{ "fields": ["n"], "mode": "write" }])),
            "body": [{
                "trigger": {
                    "body": [store(0, "int", binary("add", field(0, "int"), int(1)))]
                }
            }]
        }]
    });
    let program = program(json!({
        "types": [counter],
        "instances": [
            { "name": "first", "type": "Loop" },
            { "name": "second", "type": "Loop" },
            { "name": "third", "type": "Loop" }
        ]
    }));

    let runtime = run(program, 4);
    for name in ["first", "second", "third"] {
        assert_eq!(runtime.read_field(name, "n").unwrap(), Value::Int(100));
        assert_eq!(runtime.firings(name), Some(100));
    }
}

#[test]
fn one_port_feeds_every_bound_reaction() {
    let mut program = common::demo(include_str!("../demos/producer_consumer.json"));
    program.instances.push(weft::program::InstanceDecl {
        name: "audit".into(),
        type_name: "Consumer".into(),
    });
    program.bindings.push(weft::program::Binding {
        output: vec!["producer".into(), "out".into()],
        input: vec!["audit".into(), "take".into()],
    });
    program.validate().unwrap();

    let runtime = run(program, 3);
    assert_eq!(runtime.read_field("consumer", "total").unwrap(), Value::Int(10));
    assert_eq!(runtime.read_field("audit", "total").unwrap(), Value::Int(10));
    assert_eq!(runtime.firings("audit"), Some(5));
    assert_eq!(runtime.output().contents().lines().count(), 10);
}

#[test]
fn plans_lock_in_declared_order() {
    let program = program(json!({
        "types": [
            {
                "name": "Cell",
                "size": 8,
                "fields": [{ "name": "x", "offset": 0, "kind": { "scalar": "int" } }]
            },
            {
                "name": "Pair",
                "size": 24,
                "fields": [
                    { "name": "left", "offset": 0, "kind": { "component": "Cell" } },
                    { "name": "right", "offset": 8, "kind": { "component": "Cell" } },
                    { "name": "done", "offset": 16, "kind": { "scalar": "bool" } }
                ],
                "actions": [{
                    "name": "once",
                    "precondition": { "unary": { "op": "not", "operand": field(16, "bool") } },
                    "triggers": group(json!([
                        { "path": ["left"], "fields": ["x"], "mode": "write" },
                        { "path": ["right"], "fields": ["x"], "mode": "read" },
                        { "fields": ["done"], "mode": "write" }
                    ])),
                    "body": [store(16, "bool", json!({ "bool": true }))]
                }]
            }
        ],
        "instances": [{ "name": "pair", "type": "Pair" }]
    }));

    let runtime = match prepare(program, RuntimeConfig::default().with_workers(2)) {
        Ok(runtime) => runtime,
        Err(err) => panic!("{}", err.to_diagnostic().render_plain()),
    };
    let instances = runtime.instances().unwrap();
    let id = |name: &str| instances.find(name).unwrap().id;
    let plan = runtime.lock_plans().unwrap().plan(id("pair"), 0);
    assert_eq!(
        plan.entries(),
        &[
            LockEntry {
                instance: id("pair.left"),
                mode: AccessMode::Write
            },
            LockEntry {
                instance: id("pair.right"),
                mode: AccessMode::Read
            },
            LockEntry {
                instance: id("pair"),
                mode: AccessMode::Write
            },
        ]
    );

    runtime.run(runtime.config().stack_size).unwrap();
    assert_eq!(runtime.read_field("pair", "done").unwrap(), Value::Bool(true));
    assert_eq!(runtime.firings("pair"), Some(1));
}

/// Body that bumps `inflight`, spins, counts an overlap when another firing
/// of the same instance bumped it meanwhile, then drops `inflight` again.
fn guarded_body(extra: Option<serde_json::Value>) -> serde_json::Value {
    let mut body = vec![
        store(0, "int", binary("add", field(0, "int"), int(1))),
        json!({ "set_local": { "slot": 0, "value": int(0) } }),
        json!({
            "while": {
                "cond": binary("lt", json!({ "local": 0 }), int(200)),
                "body": [{
                    "set_local": {
                        "slot": 0,
                        "value": binary("add", json!({ "local": 0 }), int(1))
                    }
                }]
            }
        }),
        json!({
            "if": {
                "cond": binary("ne", field(0, "int"), int(1)),
                "then": [store(8, "int", binary("add", field(8, "int"), int(1)))]
            }
        }),
        store(0, "int", binary("sub", field(0, "int"), int(1))),
    ];
    body.extend(extra);
    serde_json::Value::Array(body)
}

#[test]
fn firings_of_one_instance_never_overlap() {
    let bump = json!({
        "trigger": { "body": [store(16, "int", binary("add", field(16, "int"), int(1)))] }
    });
    let program = program(json!({
        "types": [{
            "name": "Busy",
            "size": 24,
            "fields": [
                { "name": "inflight", "offset": 0, "kind": { "scalar": "int" } },
                { "name": "overlaps", "offset": 8, "kind": { "scalar": "int" } },
                { "name": "count", "offset": 16, "kind": { "scalar": "int" } }
            ],
            "actions": [
                {
                    "name": "tick",
                    "precondition": binary("lt", field(16, "int"), int(200)),
                    "locals": 1,
                    "body": guarded_body(Some(bump))
                },
                { "name": "tock", "locals": 1, "body": guarded_body(None) }
            ]
        }],
        "instances": [
            { "name": "a", "type": "Busy" },
            { "name": "b", "type": "Busy" }
        ]
    }));

    let runtime = run(program, 8);
    for name in ["a", "b"] {
        assert_eq!(runtime.read_field(name, "overlaps").unwrap(), Value::Int(0));
        assert_eq!(runtime.read_field(name, "count").unwrap(), Value::Int(200));
        assert_eq!(runtime.read_field(name, "inflight").unwrap(), Value::Int(0));
    }
}

#[test]
fn reaction_garbage_is_collected_without_refiring_its_owner() {
    let program = program(json!({
        "types": [
            {
                "name": "Source",
                "size": 16,
                "fields": [
                    { "name": "sent", "offset": 0, "kind": { "scalar": "int" } },
                    { "name": "out", "offset": 8, "kind": { "output": [] } }
                ],
                "actions": [{
                    "name": "send",
                    "precondition": binary("lt", field(0, "int"), int(3)),
                    "triggers": group(json!([{ "fields": ["sent", "out"], "mode": "write" }])),
                    "body": [{
                        "trigger": {
                            "calls": [{ "port": "out" }],
                            "body": [store(0, "int", binary("add", field(0, "int"), int(1)))]
                        }
                    }]
                }]
            },
            {
                "name": "Sink",
                "size": 8,
                "reactions": [{
                    "name": "take",
                    "body": [{ "expr": { "new": { "size": 16 } } }]
                }]
            }
        ],
        "instances": [
            { "name": "source", "type": "Source" },
            { "name": "sink", "type": "Sink" }
        ],
        "bindings": [{ "output": ["source", "out"], "input": ["sink", "take"] }]
    }));

    let runtime = run(program, 2);
    assert_eq!(runtime.firings("sink"), Some(3));
    let stats = runtime.heap_stats("sink").unwrap();
    assert_eq!(stats.allocations, 4);
    assert_eq!(stats.freed_objects, 3);
}
