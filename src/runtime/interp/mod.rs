//! Tree-walking interpreter for action and reaction bodies.
//!
//! An [`Interpreter`] lives for one firing. Port calls run the bound
//! reactions synchronously; bodies of trigger statements are queued with a
//! copy of their frame and run by [`Interpreter::run_deferred`] once the
//! firing body has finished.

pub mod frame;
pub mod ops;

use std::{collections::VecDeque, sync::Arc};

use tracing::trace;

use crate::{
    program::{Action, BinaryOp, Expr, Place, PortCall, Program, Stmt},
    runtime::{
        binding::{PortTable, PortTarget},
        builtins::get_builtin,
        error::{HeapError, RuntimeError},
        gc::{HeapLink, HeapRef, LinkTable, allocate_sub_heap, merge_heap, move_heap},
        instance::{InstanceId, InstanceTable},
        output::Output,
        value::Value,
    },
};

pub use frame::Frame;

/// Everything a firing reads but never owns.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub program: &'a Program,
    pub instances: &'a InstanceTable,
    pub ports: &'a PortTable,
    pub links: &'a LinkTable,
    pub output: &'a Output,
    pub trace: bool,
}

struct Deferred<'a> {
    frame: Frame,
    body: &'a [Stmt],
}

pub struct Interpreter<'a> {
    ctx: Context<'a>,
    /// Heaps of the open change scopes, innermost last.
    scopes: Vec<HeapRef>,
    deferred: VecDeque<Deferred<'a>>,
    changed: Vec<InstanceId>,
    mutable_phase: bool,
}

impl<'a> Interpreter<'a> {
    pub fn new(ctx: Context<'a>) -> Self {
        Self {
            ctx,
            scopes: Vec::new(),
            deferred: VecDeque::new(),
            changed: Vec::new(),
            mutable_phase: false,
        }
    }

    pub fn precondition(
        &mut self,
        instance: InstanceId,
        action: &'a Action,
    ) -> Result<bool, RuntimeError> {
        let mut frame = Frame::new(instance, action.locals);
        self.eval(&mut frame, &action.precondition)?.as_bool()
    }

    pub fn run_action(
        &mut self,
        instance: InstanceId,
        action: &'a Action,
    ) -> Result<(), RuntimeError> {
        self.ctx.instances.get(instance).record_firing();
        let mut frame = Frame::new(instance, action.locals);
        self.exec_block(&mut frame, &action.body)
    }

    /// Runs every queued trigger body, including the ones queued while
    /// draining, in the order they were recorded.
    pub fn run_deferred(&mut self) -> Result<(), RuntimeError> {
        self.mutable_phase = true;
        while let Some(Deferred { mut frame, body }) = self.deferred.pop_front() {
            self.exec_block(&mut frame, body)?;
        }
        self.mutable_phase = false;
        Ok(())
    }

    pub fn has_deferred(&self) -> bool {
        !self.deferred.is_empty()
    }

    /// Instances whose memory was written by a deferred body.
    pub fn take_changed(&mut self) -> Vec<InstanceId> {
        std::mem::take(&mut self.changed)
    }

    fn exec_block(&mut self, frame: &mut Frame, body: &'a [Stmt]) -> Result<(), RuntimeError> {
        for stmt in body {
            self.exec(frame, stmt)?;
        }
        Ok(())
    }

    fn exec(&mut self, frame: &mut Frame, stmt: &'a Stmt) -> Result<(), RuntimeError> {
        if self.ctx.trace {
            trace!(instance = frame.instance, stmt = stmt.kind(), "exec");
        }
        match stmt {
            Stmt::SetLocal { slot, value } => {
                let value = self.eval(frame, value)?;
                frame.set(*slot, value)
            }
            Stmt::Store { place, ty, value } => {
                let value = self.eval(frame, value)?;
                let word = value.to_word(*ty)?;
                let (heap, address) = self.place(frame, place)?;
                heap.lock().write_word(address, word)?;
                if self.mutable_phase && !self.changed.contains(&frame.instance) {
                    self.changed.push(frame.instance);
                }
                Ok(())
            }
            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                if self.eval(frame, cond)?.as_bool()? {
                    self.exec_block(frame, then)
                } else {
                    self.exec_block(frame, otherwise)
                }
            }
            Stmt::While { cond, body } => {
                while self.eval(frame, cond)?.as_bool()? {
                    self.exec_block(frame, body)?;
                }
                Ok(())
            }
            Stmt::Expr(expr) => self.eval(frame, expr).map(|_| ()),
            Stmt::Println(args) => {
                let mut parts = Vec::with_capacity(args.len());
                for arg in args {
                    parts.push(self.eval(frame, arg)?.to_string());
                }
                self.ctx
                    .output
                    .println(&parts.join(" "))
                    .map_err(RuntimeError::Output)
            }
            Stmt::Call(call) => self.call_port(frame, call),
            Stmt::Trigger { calls, body } => {
                for call in calls {
                    self.call_port(frame, call)?;
                }
                self.deferred.push_back(Deferred {
                    frame: frame.clone(),
                    body,
                });
                Ok(())
            }
            Stmt::Change { link, root, body } => {
                let link = self.link(frame, link)?.ok_or(RuntimeError::NullLink)?;
                let guard = link.change().ok_or(RuntimeError::NullLink)?;
                frame.set(*root, guard.root().map_or(Value::Null, Value::Pointer))?;

                self.scopes.push(guard.heap().clone());
                let result = self.exec_block(frame, body);
                self.scopes.pop();
                drop(guard);
                result
            }
        }
    }

    fn call_port(&mut self, frame: &mut Frame, call: &'a PortCall) -> Result<(), RuntimeError> {
        let Context {
            program,
            instances,
            ports,
            ..
        } = self.ctx;
        let ty = &program.types[instances.get(frame.instance).type_id];
        let port = ty
            .field_id(&call.port)
            .expect("Interpreter::call_port: port calls are validated with the program");

        let mut args = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            args.push(self.eval(frame, arg)?);
        }
        for target in ports.targets(frame.instance, port) {
            self.call_reaction(*target, args.clone())?;
        }
        Ok(())
    }

    fn call_reaction(&mut self, target: PortTarget, args: Vec<Value>) -> Result<(), RuntimeError> {
        let Context {
            program, instances, ..
        } = self.ctx;
        let record = instances.get(target.instance);
        let reaction = &program.types[record.type_id].reactions[target.reaction];
        for (arg, ty) in args.iter().zip(&reaction.params) {
            if !arg.matches(*ty) {
                return Err(RuntimeError::TypeMismatch {
                    expected: ty.name(),
                    found: arg.type_name(),
                });
            }
        }
        record.record_firing();

        let locals = reaction.locals.max(reaction.params.len());
        let mut frame = Frame::with_args(target.instance, args, locals);
        // A reaction works on its own instance, outside the caller's scopes.
        let scopes = std::mem::take(&mut self.scopes);
        let result = self.exec_block(&mut frame, &reaction.body);
        self.scopes = scopes;
        result
    }

    fn eval(&mut self, frame: &mut Frame, expr: &'a Expr) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Int(v) => Ok(Value::Int(*v)),
            Expr::Float(v) => Ok(Value::Float(*v)),
            Expr::Bool(v) => Ok(Value::Bool(*v)),
            Expr::Str(s) => Ok(Value::Str(s.as_str().into())),
            Expr::Null => Ok(Value::Null),
            Expr::Local(slot) => frame.get(*slot).cloned(),
            Expr::Load { place, ty } => {
                let (heap, address) = self.place(frame, place)?;
                let word = heap.lock().read_word(address)?;
                Ok(Value::from_word(word, *ty))
            }
            Expr::Unary { op, operand } => {
                let value = self.eval(frame, operand)?;
                ops::unary(*op, value)
            }
            Expr::Binary { op, lhs, rhs } => match op {
                BinaryOp::And => {
                    let lhs = self.eval(frame, lhs)?.as_bool()?;
                    Ok(Value::Bool(lhs && self.eval(frame, rhs)?.as_bool()?))
                }
                BinaryOp::Or => {
                    let lhs = self.eval(frame, lhs)?.as_bool()?;
                    Ok(Value::Bool(lhs || self.eval(frame, rhs)?.as_bool()?))
                }
                _ => {
                    let lhs = self.eval(frame, lhs)?;
                    let rhs = self.eval(frame, rhs)?;
                    ops::binary(*op, lhs, rhs)
                }
            },
            Expr::New { size } => {
                let heap = self.active_heap(frame);
                let address = heap.lock().allocate(*size);
                Ok(Value::Pointer(address))
            }
            Expr::NewHeap { size } => {
                let parent = self.active_heap(frame);
                let link = allocate_sub_heap(&parent, *size);
                Ok(Value::Link(self.ctx.links.register(&link)))
            }
            Expr::Move(link) => {
                let Some(link) = self.link(frame, link)? else {
                    return Ok(Value::Null);
                };
                let target = self.active_heap(frame);
                Ok(match move_heap(&link, &target) {
                    Some(moved) => Value::Link(self.ctx.links.register(&moved)),
                    None => Value::Null,
                })
            }
            Expr::Merge(link) => {
                let Some(link) = self.link(frame, link)? else {
                    return Ok(Value::Null);
                };
                let target = self.active_heap(frame);
                Ok(merge_heap(&link, &target).map_or(Value::Null, Value::Pointer))
            }
            Expr::Builtin { name, args } => {
                let builtin = get_builtin(name)
                    .expect("Interpreter::eval: builtin names are validated with the program");
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(frame, arg)?);
                }
                (builtin.func)(&values).map_err(|message| RuntimeError::Builtin {
                    name: name.clone(),
                    message,
                })
            }
        }
    }

    /// Evaluates a link expression; `None` for null or unknown links.
    fn link(
        &mut self,
        frame: &mut Frame,
        expr: &'a Expr,
    ) -> Result<Option<Arc<HeapLink>>, RuntimeError> {
        match self.eval(frame, expr)? {
            Value::Link(word) => Ok(self.ctx.links.resolve(word)),
            Value::Null => Ok(None),
            other => Err(RuntimeError::TypeMismatch {
                expected: "Link",
                found: other.type_name(),
            }),
        }
    }

    fn active_heap(&self, frame: &Frame) -> HeapRef {
        match self.scopes.last() {
            Some(heap) => heap.clone(),
            None => self.ctx.instances.get(frame.instance).heap().clone(),
        }
    }

    /// Resolves a place to the heap holding it and its address.
    fn place(
        &mut self,
        frame: &mut Frame,
        place: &'a Place,
    ) -> Result<(HeapRef, u64), RuntimeError> {
        let address = match place {
            Place::SelfField { offset } => {
                let record = self.ctx.instances.get(frame.instance);
                return Ok((record.heap().clone(), record.base + offset));
            }
            Place::Deref { pointer, offset } => {
                let base = self.pointer(frame, pointer)?;
                base.wrapping_add(*offset)
            }
            Place::Index {
                pointer,
                index,
                len,
                stride,
                offset,
            } => {
                let base = self.pointer(frame, pointer)?;
                let index = self.eval(frame, index)?.as_int()?;
                if index < 0 || index as u64 >= *len {
                    return Err(RuntimeError::IndexOutOfRange { index, len: *len });
                }
                base.wrapping_add(index as u64 * stride)
                    .wrapping_add(*offset)
            }
        };

        let own = self.ctx.instances.get(frame.instance).heap();
        for heap in self.scopes.iter().rev().chain(std::iter::once(own)) {
            if heap.lock().contains(address) {
                return Ok((heap.clone(), address));
            }
        }
        Err(HeapError::InvalidAddress(address).into())
    }

    fn pointer(&mut self, frame: &mut Frame, expr: &'a Expr) -> Result<u64, RuntimeError> {
        match self.eval(frame, expr)? {
            Value::Null => Err(HeapError::InvalidAddress(0).into()),
            value => value.as_pointer(),
        }
    }
}
