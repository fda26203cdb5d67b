//! The runtime: instance allocation, binding, composition analysis and the
//! scheduler, tied together by [`Runtime`].
//!
//! A driver calls the start-up steps in a fixed order:
//!
//! 1. [`Runtime::allocate_instances`]
//! 2. [`Runtime::create_bindings`]
//! 3. [`Runtime::analyze_composition`]
//! 4. [`Runtime::run`]
//!
//! [`Runtime::execute`] performs all four.

pub mod binding;
pub mod builtins;
pub mod composition;
pub mod config;
pub mod error;
pub mod gc;
pub mod instance;
pub mod interp;
pub mod output;
pub mod scheduler;
pub mod value;

use tracing::info;

use crate::{
    program::{FieldKind, Program},
    runtime::{
        binding::PortTable,
        composition::LockPlans,
        error::{ProgramError, WeftError},
        gc::{GcStats, LinkTable},
        instance::{InstanceRecord, InstanceTable},
        interp::Context,
    },
};

pub use config::{DEFAULT_STACK_SIZE, DEFAULT_WORKERS, RuntimeConfig};
pub use output::Output;
pub use value::Value;

pub struct Runtime {
    program: Program,
    config: RuntimeConfig,
    instances: Option<InstanceTable>,
    ports: Option<PortTable>,
    plans: Option<LockPlans>,
    links: LinkTable,
    output: Output,
}

impl Runtime {
    pub fn new(program: Program, config: RuntimeConfig) -> Self {
        Self {
            program,
            config,
            instances: None,
            ports: None,
            plans: None,
            links: LinkTable::new(),
            output: Output::stdout(),
        }
    }

    pub fn with_output(mut self, output: Output) -> Self {
        self.output = output;
        self
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn output(&self) -> &Output {
        &self.output
    }

    /// Creates every instance record and its heap.
    pub fn allocate_instances(&mut self) -> Result<(), ProgramError> {
        let instances = InstanceTable::allocate(&self.program)?;
        info!(instances = instances.len(), "instances allocated");
        self.instances = Some(instances);
        Ok(())
    }

    /// Resolves all bindings into runtime port lists.
    pub fn create_bindings(&mut self) -> Result<(), ProgramError> {
        let instances = self.instances.as_ref().ok_or(ProgramError::OutOfOrder {
            called: "create_bindings",
            required: "allocate_instances",
        })?;
        self.ports = Some(PortTable::create(&self.program, instances)?);
        Ok(())
    }

    /// Proves the bound network deterministic and computes lock plans.
    pub fn analyze_composition(&mut self) -> Result<(), WeftError> {
        let (instances, ports) = match (&self.instances, &self.ports) {
            (Some(instances), Some(ports)) => (instances, ports),
            _ => {
                return Err(ProgramError::OutOfOrder {
                    called: "analyze_composition",
                    required: "create_bindings",
                }
                .into());
            }
        };
        let plans = composition::analyze(&self.program, instances, ports)?;
        info!(plans = plans.len(), "composition accepted");
        self.plans = Some(plans);
        Ok(())
    }

    /// Runs the scheduler until no instance is queued and no worker is busy.
    pub fn run(&self, stack_size: usize) -> Result<(), WeftError> {
        let (instances, ports, plans) = match (&self.instances, &self.ports, &self.plans) {
            (Some(instances), Some(ports), Some(plans)) => (instances, ports, plans),
            _ => {
                return Err(ProgramError::OutOfOrder {
                    called: "run",
                    required: "analyze_composition",
                }
                .into());
            }
        };
        let ctx = Context {
            program: &self.program,
            instances,
            ports,
            links: &self.links,
            output: &self.output,
            trace: self.config.trace,
        };
        scheduler::run(ctx, plans, &self.config, stack_size)?;
        Ok(())
    }

    /// Every start-up step followed by a run with the configured stack size.
    pub fn execute(&mut self) -> Result<(), WeftError> {
        self.allocate_instances()?;
        self.create_bindings()?;
        self.analyze_composition()?;
        self.run(self.config.stack_size)
    }

    pub fn instances(&self) -> Option<&InstanceTable> {
        self.instances.as_ref()
    }

    pub fn lock_plans(&self) -> Option<&LockPlans> {
        self.plans.as_ref()
    }

    /// Dotted paths of all instances, in creation order.
    pub fn instance_names(&self) -> Vec<&str> {
        self.instances
            .iter()
            .flat_map(|instances| instances.iter())
            .map(|record| record.name.as_str())
            .collect()
    }

    fn record(&self, path: &str) -> Result<&InstanceRecord, ProgramError> {
        self.instances
            .as_ref()
            .and_then(|instances| instances.find(path))
            .map(|record| &**record)
            .ok_or_else(|| ProgramError::UnknownInstance(path.to_string()))
    }

    /// Reads a scalar field of the instance at `path`.
    pub fn read_field(&self, path: &str, field: &str) -> Result<Value, WeftError> {
        let record = self.record(path)?;
        let ty = &self.program.types[record.type_id];
        let (_, field) = ty.field_named(field)?;
        let FieldKind::Scalar(scalar) = &field.kind else {
            return Err(ProgramError::Unresolved {
                ty: ty.name.clone(),
                what: "scalar field",
                name: field.name.clone(),
            }
            .into());
        };
        let word = record
            .heap()
            .lock()
            .read_word(record.base + field.offset)
            .map_err(error::RuntimeError::from)?;
        Ok(Value::from_word(word, *scalar))
    }

    /// Collection counters of the heap backing the instance at `path`.
    pub fn heap_stats(&self, path: &str) -> Option<GcStats> {
        let record = self.record(path).ok()?;
        let stats = record.heap().lock().stats();
        Some(stats)
    }

    /// Number of action and reaction bodies run for the instance at `path`.
    pub fn firings(&self, path: &str) -> Option<u64> {
        self.record(path).ok().map(InstanceRecord::firings)
    }
}
