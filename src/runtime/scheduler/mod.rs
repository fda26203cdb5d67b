//! Worker pool driving instance firings to a fixed point.

pub mod firing;
pub mod queue;

use std::thread;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::runtime::{
    composition::LockPlans, config::RuntimeConfig, error::RuntimeError, interp::Context,
};

pub use queue::WorkQueue;

fn worker(
    ctx: Context<'_>,
    plans: &LockPlans,
    queue: &WorkQueue,
    gc_enabled: bool,
) -> Result<usize, RuntimeError> {
    let mut fired = 0;
    while let Some(record) = queue.pop() {
        let result = firing::fire(ctx, plans, queue, &record, gc_enabled);
        queue.done();
        if let Err(err) = result {
            queue.abort();
            return Err(err);
        }
        fired += 1;
    }
    Ok(fired)
}

/// Queues every instance, starts `config.workers` threads with `stack_size`
/// bytes of stack each and blocks until the queue drains.
///
/// The first error stops the pool and is returned once every worker exits.
pub fn run(
    ctx: Context<'_>,
    plans: &LockPlans,
    config: &RuntimeConfig,
    stack_size: usize,
) -> Result<(), RuntimeError> {
    let queue = WorkQueue::new();
    for record in ctx.instances.iter() {
        queue.push(record);
    }

    let workers = config.workers.max(1);
    let first_error: Mutex<Option<RuntimeError>> = Mutex::new(None);
    let fail = |err: RuntimeError| {
        first_error.lock().get_or_insert(err);
    };
    info!(workers, instances = ctx.instances.len(), "scheduler started");

    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(workers);
        for index in 0..workers {
            let spawned = thread::Builder::new()
                .name(format!("weft-worker-{}", index))
                .stack_size(stack_size)
                .spawn_scoped(scope, || worker(ctx, plans, &queue, config.gc_enabled));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    queue.abort();
                    fail(RuntimeError::Spawn(err));
                    break;
                }
            }
        }

        for handle in handles {
            match handle.join() {
                Ok(Ok(fired)) => debug!(fired, "worker finished"),
                Ok(Err(err)) => fail(err),
                Err(_) => {
                    queue.abort();
                    fail(RuntimeError::WorkerPanicked);
                }
            }
        }
    });

    match first_error.into_inner() {
        Some(err) => Err(err),
        None => {
            info!("scheduler finished");
            Ok(())
        }
    }
}
