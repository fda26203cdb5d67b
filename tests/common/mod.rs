#![allow(dead_code)]

use serde_json::{Value as Json, json};
use weft::{
    program::Program,
    runtime::{Output, Runtime, RuntimeConfig, error::WeftError},
};

pub fn program(description: Json) -> Program {
    let program: Program = serde_json::from_value(description)
        .unwrap_or_else(|e| panic!("test program does not parse: {e}"));
    program
        .validate()
        .unwrap_or_else(|e| panic!("test program is invalid: {e}"));
    program
}

pub fn demo(source: &str) -> Program {
    Program::from_json(source).unwrap_or_else(|e| panic!("demo does not load: {e}"))
}

/// Runs every start-up step but does not fire anything.
pub fn prepare(program: Program, config: RuntimeConfig) -> Result<Runtime, WeftError> {
    let mut runtime = Runtime::new(program, config).with_output(Output::buffer());
    runtime.allocate_instances()?;
    runtime.create_bindings()?;
    runtime.analyze_composition()?;
    Ok(runtime)
}

pub fn analysis_error(program: Program) -> WeftError {
    match prepare(program, RuntimeConfig::default()) {
        Ok(_) => panic!("expected the composition to be rejected"),
        Err(err) => err,
    }
}

pub fn run(program: Program, workers: usize) -> Runtime {
    let config = RuntimeConfig::default().with_workers(workers);
    let runtime = prepare(program, config)
        .unwrap_or_else(|e| panic!("{}", e.to_diagnostic().render_plain()));
    runtime
        .run(runtime.config().stack_size)
        .unwrap_or_else(|e| panic!("{}", e.to_diagnostic().render_plain()));
    runtime
}

pub fn run_error(program: Program) -> WeftError {
    let runtime = prepare(program, RuntimeConfig::default())
        .unwrap_or_else(|e| panic!("{}", e.to_diagnostic().render_plain()));
    runtime
        .run(runtime.config().stack_size)
        .expect_err("expected the run to fail")
}

pub fn int(value: i64) -> Json {
    json!({ "int": value })
}

pub fn field(offset: u64, ty: &str) -> Json {
    json!({ "load": { "place": { "self_field": { "offset": offset } }, "ty": ty } })
}

pub fn binary(op: &str, lhs: Json, rhs: Json) -> Json {
    json!({ "binary": { "op": op, "lhs": lhs, "rhs": rhs } })
}

pub fn store(offset: u64, ty: &str, value: Json) -> Json {
    json!({ "store": { "place": { "self_field": { "offset": offset } }, "ty": ty, "value": value } })
}

pub fn group(triggers: Json) -> Json {
    json!([{ "triggers": triggers }])
}
