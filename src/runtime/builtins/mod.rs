use std::fmt;

use crate::runtime::value::Value;

mod helpers;
mod numeric_ops;
mod timer_ops;

use numeric_ops::{builtin_abs, builtin_max, builtin_min};
use timer_ops::{builtin_poll_readable, builtin_timer_arm, builtin_timer_create, builtin_timer_read};

pub type BuiltinFn = fn(&[Value]) -> Result<Value, String>;

#[derive(Clone)]
pub struct BuiltinFunction {
    pub name: &'static str,
    pub func: BuiltinFn,
}

impl fmt::Debug for BuiltinFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BuiltinFunction({})", self.name)
    }
}

impl PartialEq for BuiltinFunction {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// Builtins callable from expressions, looked up by name.
pub static BUILTINS: &[BuiltinFunction] = &[
    BuiltinFunction {
        name: "abs",
        func: builtin_abs,
    },
    BuiltinFunction {
        name: "min",
        func: builtin_min,
    },
    BuiltinFunction {
        name: "max",
        func: builtin_max,
    },
    BuiltinFunction {
        name: "timer_create",
        func: builtin_timer_create,
    },
    BuiltinFunction {
        name: "timer_arm",
        func: builtin_timer_arm,
    },
    BuiltinFunction {
        name: "timer_read",
        func: builtin_timer_read,
    },
    BuiltinFunction {
        name: "poll_readable",
        func: builtin_poll_readable,
    },
];

pub fn get_builtin(name: &str) -> Option<&'static BuiltinFunction> {
    BUILTINS.iter().find(|b| b.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_is_found_by_name() {
        for builtin in BUILTINS {
            assert_eq!(get_builtin(builtin.name), Some(builtin));
        }
        assert!(get_builtin("print").is_none());
    }
}
