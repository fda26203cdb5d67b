use crate::runtime::value::Value;

use super::helpers::{arg_number, check_arity, type_error};

pub(super) fn builtin_abs(args: &[Value]) -> Result<Value, String> {
    check_arity(args, 1, "abs", "abs(n)")?;
    match &args[0] {
        Value::Int(v) => Ok(Value::Int(v.wrapping_abs())),
        Value::Float(v) => Ok(Value::Float(v.abs())),
        other => Err(type_error(
            "abs",
            "argument",
            "Number",
            other.type_name(),
            "abs(n)",
        )),
    }
}

pub(super) fn builtin_min(args: &[Value]) -> Result<Value, String> {
    check_arity(args, 2, "min", "min(a, b)")?;
    if let (Value::Int(a), Value::Int(b)) = (&args[0], &args[1]) {
        return Ok(Value::Int(*a.min(b)));
    }
    let a = arg_number(args, 0, "min", "first argument", "min(a, b)")?;
    let b = arg_number(args, 1, "min", "second argument", "min(a, b)")?;
    Ok(Value::Float(a.min(b)))
}

pub(super) fn builtin_max(args: &[Value]) -> Result<Value, String> {
    check_arity(args, 2, "max", "max(a, b)")?;
    if let (Value::Int(a), Value::Int(b)) = (&args[0], &args[1]) {
        return Ok(Value::Int(*a.max(b)));
    }
    let a = arg_number(args, 0, "max", "first argument", "max(a, b)")?;
    let b = arg_number(args, 1, "max", "second argument", "max(a, b)")?;
    Ok(Value::Float(a.max(b)))
}
