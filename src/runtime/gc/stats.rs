/// Cumulative allocation and collection counters of one heap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    pub allocations: usize,
    pub blocks_grown: usize,
    pub collections: usize,
    pub freed_objects: usize,
    pub freed_slots: usize,
    pub blocks_released: usize,
    pub heaps_freed: usize,
    pub heaps_merged: usize,
}

impl GcStats {
    /// Folds another heap's counters into this one, used when a heap is
    /// merged into its new owner.
    pub fn absorb(&mut self, other: &GcStats) {
        self.allocations += other.allocations;
        self.blocks_grown += other.blocks_grown;
        self.collections += other.collections;
        self.freed_objects += other.freed_objects;
        self.freed_slots += other.freed_slots;
        self.blocks_released += other.blocks_released;
        self.heaps_freed += other.heaps_freed;
    }
}
