use crate::runtime::value::Value;

pub(super) fn format_hint(signature: &str) -> String {
    format!("\n\nHint:\n  {}", signature)
}

pub(super) fn type_error(
    name: &str,
    label: &str,
    expected: &str,
    got: &str,
    signature: &str,
) -> String {
    format!(
        "{} expected {} to be {}, got {}{}",
        name,
        label,
        expected,
        got,
        format_hint(signature)
    )
}

pub(super) fn check_arity(
    args: &[Value],
    expected: usize,
    name: &str,
    signature: &str,
) -> Result<(), String> {
    if args.len() != expected {
        return Err(format!(
            "wrong number of arguments\n\n  function: {}/{}\n  expected: {}\n  got: {}{}",
            name,
            expected,
            expected,
            args.len(),
            format_hint(signature)
        ));
    }
    Ok(())
}

pub(super) fn arg_int(
    args: &[Value],
    index: usize,
    name: &str,
    label: &str,
    signature: &str,
) -> Result<i64, String> {
    match &args[index] {
        Value::Int(v) => Ok(*v),
        other => Err(type_error(name, label, "Int", other.type_name(), signature)),
    }
}

pub(super) fn arg_number(
    args: &[Value],
    index: usize,
    name: &str,
    label: &str,
    signature: &str,
) -> Result<f64, String> {
    match &args[index] {
        Value::Int(v) => Ok(*v as f64),
        Value::Float(v) => Ok(*v),
        other => Err(type_error(name, label, "Number", other.type_name(), signature)),
    }
}

/// Non-negative `Int` argument, e.g. a duration in milliseconds.
pub(super) fn arg_millis(
    args: &[Value],
    index: usize,
    name: &str,
    label: &str,
    signature: &str,
) -> Result<u64, String> {
    let value = arg_int(args, index, name, label, signature)?;
    u64::try_from(value).map_err(|_| {
        format!(
            "{} expected {} to be non-negative, got {}{}",
            name,
            label,
            value,
            format_hint(signature)
        )
    })
}
