use crate::{
    program::{BinaryOp, UnaryOp},
    runtime::{error::RuntimeError, value::Value},
};

fn mismatch(expected: &'static str, found: &Value) -> RuntimeError {
    RuntimeError::TypeMismatch {
        expected,
        found: found.type_name(),
    }
}

pub fn unary(op: UnaryOp, value: Value) -> Result<Value, RuntimeError> {
    match (op, value) {
        (UnaryOp::Neg, Value::Int(v)) => Ok(Value::Int(v.wrapping_neg())),
        (UnaryOp::Neg, Value::Float(v)) => Ok(Value::Float(-v)),
        (UnaryOp::Not, Value::Bool(v)) => Ok(Value::Bool(!v)),
        (UnaryOp::Neg, other) => Err(mismatch("Number", &other)),
        (UnaryOp::Not, other) => Err(mismatch("Bool", &other)),
    }
}

/// Applies a strict binary operator. `And` and `Or` short-circuit and are
/// evaluated by the interpreter.
pub fn binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, RuntimeError> {
    use BinaryOp::*;

    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => int_op(op, a, b),
        (Value::Float(a), Value::Float(b)) => float_op(op, a, b),
        (Value::Int(a), Value::Float(b)) => float_op(op, a as f64, b),
        (Value::Float(a), Value::Int(b)) => float_op(op, a, b as f64),
        (lhs, rhs) => match op {
            Eq => Ok(Value::Bool(lhs == rhs)),
            Ne => Ok(Value::Bool(lhs != rhs)),
            And | Or => match (&lhs, &rhs) {
                (Value::Bool(a), Value::Bool(b)) if op == And => Ok(Value::Bool(*a && *b)),
                (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(*a || *b)),
                (Value::Bool(_), other) | (other, _) => Err(mismatch("Bool", other)),
            },
            _ => Err(mismatch("Number", if is_number(&lhs) { &rhs } else { &lhs })),
        },
    }
}

fn is_number(value: &Value) -> bool {
    matches!(value, Value::Int(_) | Value::Float(_))
}

fn int_op(op: BinaryOp, a: i64, b: i64) -> Result<Value, RuntimeError> {
    use BinaryOp::*;

    let value = match op {
        Add => Value::Int(a.wrapping_add(b)),
        Sub => Value::Int(a.wrapping_sub(b)),
        Mul => Value::Int(a.wrapping_mul(b)),
        Div if b == 0 => return Err(RuntimeError::DivisionByZero),
        Div => Value::Int(a.wrapping_div(b)),
        Rem if b == 0 => return Err(RuntimeError::DivisionByZero),
        Rem => Value::Int(a.wrapping_rem(b)),
        Eq => Value::Bool(a == b),
        Ne => Value::Bool(a != b),
        Lt => Value::Bool(a < b),
        Le => Value::Bool(a <= b),
        Gt => Value::Bool(a > b),
        Ge => Value::Bool(a >= b),
        And | Or => return Err(mismatch("Bool", &Value::Int(a))),
    };
    Ok(value)
}

fn float_op(op: BinaryOp, a: f64, b: f64) -> Result<Value, RuntimeError> {
    use BinaryOp::*;

    let value = match op {
        Add => Value::Float(a + b),
        Sub => Value::Float(a - b),
        Mul => Value::Float(a * b),
        Div | Rem if b == 0.0 => return Err(RuntimeError::DivisionByZero),
        Div => Value::Float(a / b),
        Rem => Value::Float(a % b),
        Eq => Value::Bool(a == b),
        Ne => Value::Bool(a != b),
        Lt => Value::Bool(a < b),
        Le => Value::Bool(a <= b),
        Gt => Value::Bool(a > b),
        Ge => Value::Bool(a >= b),
        And | Or => return Err(mismatch("Bool", &Value::Float(a))),
    };
    Ok(value)
}
