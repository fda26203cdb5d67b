use std::sync::Arc;

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, trace};

use crate::{
    program::{AccessMode, Action},
    runtime::{
        composition::{LockPlan, LockPlans},
        error::RuntimeError,
        instance::{InstanceHeap, InstanceRecord, InstanceTable},
        interp::{Context, Interpreter},
        scheduler::queue::WorkQueue,
    },
};

/// Locks of one action, held for its whole firing including the deferred
/// trigger bodies.
struct HeldLocks<'r> {
    _reads: Vec<RwLockReadGuard<'r, ()>>,
    _writes: Vec<RwLockWriteGuard<'r, ()>>,
}

/// Acquires the plan's locks one after another in plan order.
fn acquire<'r>(instances: &'r InstanceTable, plan: &LockPlan) -> HeldLocks<'r> {
    let mut reads = Vec::new();
    let mut writes = Vec::new();
    for entry in plan.entries() {
        let record = instances.get(entry.instance);
        trace!(instance = %record.name, mode = ?entry.mode, "lock");
        match entry.mode {
            AccessMode::Read => reads.push(record.lock().read()),
            AccessMode::Write => writes.push(record.lock().write()),
        }
    }
    HeldLocks {
        _reads: reads,
        _writes: writes,
    }
}

/// Heaps touched by a plan, each listed once.
fn plan_heaps(instances: &InstanceTable, plan: &LockPlan) -> Vec<Arc<InstanceHeap>> {
    let mut heaps: Vec<Arc<InstanceHeap>> = Vec::new();
    for entry in plan.entries() {
        let heap = instances.get(entry.instance).shared_heap();
        if !heaps.iter().any(|known| Arc::ptr_eq(known, heap)) {
            heaps.push(heap.clone());
        }
    }
    heaps
}

/// Runs one action if its precondition holds, then its deferred trigger
/// bodies. Returns whether the action fired.
fn run_action<'a>(
    interp: &mut Interpreter<'a>,
    record: &InstanceRecord,
    action: &'a Action,
) -> Result<bool, RuntimeError> {
    if !interp.precondition(record.id, action)? {
        return Ok(false);
    }
    interp.run_action(record.id, action)?;
    interp.run_deferred()?;
    Ok(true)
}

/// Tries every action of `record` in declaration order, then collects the
/// record's heap. Heaps of other records touched by an action are collected
/// as soon as no firing uses them.
pub fn fire(
    ctx: Context<'_>,
    plans: &LockPlans,
    queue: &WorkQueue,
    record: &InstanceRecord,
    gc_enabled: bool,
) -> Result<(), RuntimeError> {
    let own_heap = record.shared_heap();
    own_heap.enter();
    let result = fire_actions(ctx, plans, queue, record, gc_enabled);
    own_heap.leave(gc_enabled);
    result
}

fn fire_actions(
    ctx: Context<'_>,
    plans: &LockPlans,
    queue: &WorkQueue,
    record: &InstanceRecord,
    gc_enabled: bool,
) -> Result<(), RuntimeError> {
    let ty = &ctx.program.types[record.type_id];

    for (action_id, action) in ty.actions.iter().enumerate() {
        let plan = plans.plan(record.id, action_id);
        let heaps = plan_heaps(ctx.instances, plan);
        for heap in &heaps {
            heap.enter();
        }

        let mut interp = Interpreter::new(ctx);
        let locks = acquire(ctx.instances, plan);
        let result = run_action(&mut interp, record, action);
        drop(locks);

        for heap in &heaps {
            heap.leave(gc_enabled);
        }

        if result? {
            debug!(instance = %record.name, action = %action.name, "fired");
            for changed in interp.take_changed() {
                queue.push(ctx.instances.get(changed));
            }
        }
    }
    Ok(())
}
