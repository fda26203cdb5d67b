use crate::runtime::{error::RuntimeError, instance::InstanceId, value::Value};

/// Locals of one action, reaction or deferred trigger body.
#[derive(Debug, Clone)]
pub struct Frame {
    pub instance: InstanceId,
    locals: Vec<Value>,
}

impl Frame {
    pub fn new(instance: InstanceId, size: usize) -> Self {
        Self {
            instance,
            locals: vec![Value::Null; size],
        }
    }

    /// A reaction frame: arguments fill the first slots.
    pub fn with_args(instance: InstanceId, mut args: Vec<Value>, size: usize) -> Self {
        if args.len() < size {
            args.resize(size, Value::Null);
        }
        Self {
            instance,
            locals: args,
        }
    }

    pub fn get(&self, slot: usize) -> Result<&Value, RuntimeError> {
        self.locals.get(slot).ok_or(RuntimeError::UnknownLocal(slot))
    }

    pub fn set(&mut self, slot: usize, value: Value) -> Result<(), RuntimeError> {
        let local = self
            .locals
            .get_mut(slot)
            .ok_or(RuntimeError::UnknownLocal(slot))?;
        *local = value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_fill_leading_slots() {
        let frame = Frame::with_args(0, vec![Value::Int(1)], 3);
        assert_eq!(frame.get(0).unwrap(), &Value::Int(1));
        assert_eq!(frame.get(2).unwrap(), &Value::Null);
        assert!(matches!(frame.get(3), Err(RuntimeError::UnknownLocal(3))));
    }
}
