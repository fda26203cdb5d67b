use std::{collections::VecDeque, sync::Arc};

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::runtime::instance::InstanceRecord;

#[derive(Default)]
struct QueueState {
    records: VecDeque<Arc<InstanceRecord>>,
    /// Workers currently firing a popped record.
    pending: usize,
    aborted: bool,
}

/// FIFO of records waiting to fire, shared by all workers.
///
/// A record is in the queue at most once. The run is complete when the
/// queue is empty and no worker is pending, since only a pending worker can
/// push again.
#[derive(Default)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `record` unless it is already queued.
    pub fn push(&self, record: &Arc<InstanceRecord>) {
        if !record.try_enqueue() {
            return;
        }
        let mut state = self.state.lock();
        state.records.push_back(record.clone());
        trace!(instance = %record.name, queued = state.records.len(), "push");
        self.ready.notify_one();
    }

    /// Takes the next record, blocking while other workers may still push.
    /// Returns `None` on global completion or after [`Self::abort`].
    pub fn pop(&self) -> Option<Arc<InstanceRecord>> {
        let mut state = self.state.lock();
        loop {
            if state.aborted {
                return None;
            }
            if let Some(record) = state.records.pop_front() {
                record.dequeue();
                state.pending += 1;
                return Some(record);
            }
            if state.pending == 0 {
                self.ready.notify_all();
                return None;
            }
            self.ready.wait(&mut state);
        }
    }

    /// Marks the firing of a popped record as finished.
    pub fn done(&self) {
        let mut state = self.state.lock();
        state.pending -= 1;
        if state.pending == 0 {
            self.ready.notify_all();
        }
    }

    /// Stops every worker at its next pop.
    pub fn abort(&self) {
        self.state.lock().aborted = true;
        self.ready.notify_all();
    }

    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
