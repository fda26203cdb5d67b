/// Worker threads started by [`crate::runtime::Runtime::run`] unless configured.
pub const DEFAULT_WORKERS: usize = 4;

/// Stack size of each worker thread.
pub const DEFAULT_STACK_SIZE: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub workers: usize,
    pub stack_size: usize,
    /// Collect the firing instance's heap after every firing.
    pub gc_enabled: bool,
    /// Emit one trace event per executed statement.
    pub trace: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            stack_size: DEFAULT_STACK_SIZE,
            gc_enabled: true,
            trace: false,
        }
    }
}

impl RuntimeConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }

    pub fn with_gc(mut self, enabled: bool) -> Self {
        self.gc_enabled = enabled;
        self
    }

    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }
}
