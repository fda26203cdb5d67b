use std::{
    collections::BTreeMap,
    sync::{
        Arc, Weak,
        atomic::{AtomicU64, Ordering},
    },
};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::runtime::{
    error::HeapError,
    gc::{
        address::{SLOT_SIZE, is_address, word_link},
        block::Block,
        chunk::{Chunk, FreeList},
        heap_link::HeapLink,
        stats::GcStats,
    },
};

/// Shared handle to a heap. The mutex is the heap's own lock; every
/// allocation, access and collection goes through it.
pub type HeapRef = Arc<Mutex<Heap>>;

/// Growth size, in slots, of the first block of a heap created without a root.
pub const INITIAL_GROWTH_SLOTS: usize = 64;

static NEXT_HEAP_ID: AtomicU64 = AtomicU64::new(1);

/// Rounds a byte size up to whole slots; zero-sized requests take one slot.
pub fn slots_for(size: u64) -> usize {
    (size.div_ceil(SLOT_SIZE) as usize).max(1)
}

struct ChildHeap {
    link: Arc<HeapLink>,
    root: Option<u64>,
    reachable: bool,
    /// Words of this heap pointing into the child, kept as extra roots of
    /// the child's next collection.
    pinned: Vec<u64>,
}

/// Everything a heap owns, detached from it so another heap can absorb it.
pub struct HeapContents {
    blocks: BTreeMap<u64, Block>,
    free: FreeList,
    children: BTreeMap<u64, ChildHeap>,
    root: Option<u64>,
    stats: GcStats,
}

impl HeapContents {
    pub fn root(&self) -> Option<u64> {
        self.root
    }
}

/// Mark-sweep heap of fixed-size slots.
pub struct Heap {
    id: u64,
    blocks: BTreeMap<u64, Block>,
    free: FreeList,
    root: Option<u64>,
    dirty: bool,
    next_growth: usize,
    children: BTreeMap<u64, ChildHeap>,
    parent: Option<Weak<Mutex<Heap>>>,
    stats: GcStats,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    /// Creates an empty heap without a root. Nothing it holds survives a
    /// collection unless a root is installed with [`Self::set_root`].
    pub fn new() -> Self {
        Self::with_growth(INITIAL_GROWTH_SLOTS)
    }

    /// Creates an empty heap whose first block will hold `slots` slots.
    pub fn with_growth(slots: usize) -> Self {
        Self {
            id: NEXT_HEAP_ID.fetch_add(1, Ordering::Relaxed),
            blocks: BTreeMap::new(),
            free: FreeList::new(),
            root: None,
            dirty: false,
            next_growth: slots.max(1),
            children: BTreeMap::new(),
            parent: None,
            stats: GcStats::default(),
        }
    }

    /// Creates a heap sized to hold exactly one root object of `size` bytes
    /// and allocates that object.
    pub fn with_root(size: u64) -> Self {
        let mut heap = Self::with_growth(slots_for(size));
        let root = heap.allocate(size);
        heap.root = Some(root);
        heap
    }

    pub fn into_ref(self) -> HeapRef {
        Arc::new(Mutex::new(self))
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn root(&self) -> Option<u64> {
        self.root
    }

    pub fn set_root(&mut self, root: Option<u64>) {
        self.root = root;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn stats(&self) -> GcStats {
        self.stats
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn capacity_slots(&self) -> usize {
        self.blocks.values().map(Block::len).sum()
    }

    pub fn free_slots(&self) -> usize {
        self.free.free_slots()
    }

    pub fn live_objects(&self) -> usize {
        self.blocks.values().map(Block::object_count).sum()
    }

    pub fn allocated_slots(&self) -> usize {
        self.blocks.values().map(Block::allocated_slots).sum()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Links of the direct children, in link id order.
    pub fn child_links(&self) -> Vec<Arc<HeapLink>> {
        self.children.values().map(|child| child.link.clone()).collect()
    }

    pub fn parent(&self) -> Option<HeapRef> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn set_parent(&mut self, parent: Option<Weak<Mutex<Heap>>>) {
        self.parent = parent;
    }

    pub(crate) fn add_child(&mut self, link: Arc<HeapLink>, root: Option<u64>) {
        self.children.insert(
            link.id(),
            ChildHeap {
                link,
                root,
                reachable: false,
                pinned: Vec::new(),
            },
        );
        self.dirty = true;
    }

    pub(crate) fn remove_child(&mut self, link_id: u64) -> Option<Arc<HeapLink>> {
        self.children.remove(&link_id).map(|child| child.link)
    }

    pub fn has_child(&self, link_id: u64) -> bool {
        self.children.contains_key(&link_id)
    }

    /// Allocates a zeroed object of at least `size` bytes and returns its
    /// address.
    ///
    /// The free list is searched first-fit. When nothing fits the heap grows
    /// by one block of the larger of the request and the running growth size,
    /// which doubles after every growth.
    pub fn allocate(&mut self, size: u64) -> u64 {
        let slots = slots_for(size);
        let (base, start) = self
            .free
            .take_first_fit(slots)
            .unwrap_or_else(|| self.grow(slots));

        let block = self
            .blocks
            .get_mut(&base)
            .expect("Heap::allocate: free list refers to a released block");
        block.claim(start, slots);
        let address = block.address_of(start);

        self.dirty = true;
        self.stats.allocations += 1;
        address
    }

    fn grow(&mut self, slots: usize) -> (u64, usize) {
        let len = slots.max(self.next_growth);
        self.next_growth = self.next_growth.saturating_mul(2);

        let block = Block::new(len);
        let base = block.base();
        trace!(heap = self.id, base, slots = len, "heap grows");
        self.free.push(Chunk::new(base, slots, len - slots));
        self.blocks.insert(base, block);
        self.stats.blocks_grown += 1;
        (base, 0)
    }

    fn locate(&self, address: u64) -> Result<(u64, usize), HeapError> {
        if address % SLOT_SIZE != 0 {
            return Err(HeapError::Misaligned(address));
        }
        let (&base, block) = self
            .blocks
            .range(..=address)
            .next_back()
            .filter(|(_, block)| block.contains(address))
            .ok_or(HeapError::InvalidAddress(address))?;
        let slot = block.slot_of(address);
        if !block.is_allocated(slot) {
            return Err(HeapError::InvalidAddress(address));
        }
        Ok((base, slot))
    }

    /// Returns `true` when `address` lies inside a live object of this heap.
    pub fn contains(&self, address: u64) -> bool {
        self.locate(address).is_ok()
    }

    /// Start address and slot length of the live object covering `address`.
    pub fn object_span(&self, address: u64) -> Option<(u64, usize)> {
        let (base, slot) = self.locate(address).ok()?;
        let block = &self.blocks[&base];
        let (start, len) = block.object_at(slot)?;
        Some((block.address_of(start), len))
    }

    pub fn read_word(&self, address: u64) -> Result<u64, HeapError> {
        let (base, slot) = self.locate(address)?;
        Ok(self.blocks[&base].read(slot))
    }

    pub fn write_word(&mut self, address: u64, word: u64) -> Result<(), HeapError> {
        let (base, slot) = self.locate(address)?;
        if let Some(block) = self.blocks.get_mut(&base) {
            block.write(slot, word);
        }
        Ok(())
    }

    /// Reclaims every object not reachable from the root.
    ///
    /// Marking starts at the root object and follows words through a work
    /// list of blocks, so deep structures never recurse. Words carrying a
    /// link tag, or equal to a child's root address, flag that child as
    /// reachable instead, and words pointing into a child's objects are
    /// passed down as extra roots of that child. Unreachable children are
    /// freed, reachable ones are collected in turn. A heap that has not
    /// allocated since its last collection, and whose children have not
    /// either, skips its own mark and sweep but still visits its children.
    pub fn collect(&mut self) {
        self.collect_from(&[]);
    }

    fn collect_from(&mut self, pinned: &[u64]) {
        if self.dirty || self.has_dirty_child() {
            let live_before = self.live_objects();
            self.mark(pinned);
            self.sweep();
            self.free_unreachable_children();
            self.dirty = false;
            self.stats.collections += 1;
            debug!(
                heap = self.id,
                live_before,
                live_after = self.live_objects(),
                blocks = self.blocks.len(),
                children = self.children.len(),
                "heap collected"
            );
        }

        for child in self.children.values() {
            // Left alone while a change scope is open on it.
            if child.link.is_changing() {
                continue;
            }
            if let Some(heap) = child.link.heap() {
                heap.lock().collect_from(&child.pinned);
            }
        }
    }

    fn has_dirty_child(&self) -> bool {
        self.children.values().any(|child| {
            !child.link.is_changing()
                && child.link.heap().is_some_and(|heap| heap.lock().is_dirty())
        })
    }

    fn mark(&mut self, pinned: &[u64]) {
        for child in self.children.values_mut() {
            child.reachable = false;
            child.pinned.clear();
        }

        let mut worklist: Vec<u64> = Vec::with_capacity(16);
        if let Some(root) = self.root {
            self.mark_word(root, &mut worklist);
        }
        for &word in pinned {
            self.mark_word(word, &mut worklist);
        }

        while let Some(base) = worklist.pop() {
            let words = match self.blocks.get_mut(&base) {
                Some(block) => {
                    block.marked = false;
                    block.take_unscanned()
                }
                None => continue,
            };
            let mut i = 0;
            let len = words.len();
            while i < len {
                self.mark_word(words[i], &mut worklist);
                i += 1;
            }
        }
    }

    fn mark_word(&mut self, word: u64, worklist: &mut Vec<u64>) {
        if let Some(link_id) = word_link(word) {
            if let Some(child) = self.children.get_mut(&link_id) {
                child.reachable = true;
            }
            return;
        }
        if !is_address(word) {
            return;
        }

        let hit = self
            .blocks
            .range_mut(..=word)
            .next_back()
            .filter(|(_, block)| block.contains(word));
        let Some((&base, block)) = hit else {
            self.mark_child_word(word);
            return;
        };

        let slot = block.slot_of(word);
        let Some((start, len)) = block.object_at(slot) else {
            return;
        };
        // Queue the block once per round; take_unscanned picks up every
        // object marked in it since it was last scanned.
        if block.mark_object(start, len) && !block.marked {
            block.marked = true;
            worklist.push(base);
        }
    }

    fn mark_child_word(&mut self, word: u64) {
        for child in self.children.values_mut() {
            if child.root == Some(word) {
                child.reachable = true;
                return;
            }
            let inside = child
                .link
                .heap()
                .is_some_and(|heap| heap.lock().contains(word));
            if inside {
                child.reachable = true;
                child.pinned.push(word);
                return;
            }
        }
    }

    fn sweep(&mut self) {
        let mut released = Vec::new();
        for (&base, block) in self.blocks.iter_mut() {
            // A block that held nothing for a whole cycle goes back; one that
            // only just emptied stays around for reuse.
            let idle = block.is_empty();
            let outcome = block.sweep();
            self.stats.freed_objects += outcome.freed_objects;
            self.stats.freed_slots += outcome.freed_slots;
            if idle {
                released.push(base);
            }
        }

        for base in released {
            self.blocks.remove(&base);
            self.stats.blocks_released += 1;
        }

        self.rebuild_free_list();
    }

    fn rebuild_free_list(&mut self) {
        self.free.clear();
        for (&base, block) in &self.blocks {
            for (start, len) in block.free_runs() {
                self.free.push(Chunk::new(base, start, len));
            }
        }
    }

    fn free_unreachable_children(&mut self) {
        let doomed: Vec<u64> = self
            .children
            .iter()
            .filter(|(_, child)| {
                !child.link.is_attached() || (!child.reachable && !child.link.is_changing())
            })
            .map(|(&id, _)| id)
            .collect();

        for id in doomed {
            if let Some(child) = self.children.remove(&id) {
                if child.link.detach().is_some() {
                    self.stats.heaps_freed += 1;
                    trace!(heap = self.id, link = id, "child heap freed");
                }
            }
        }
    }

    /// Detaches everything this heap owns. The heap is left empty and rootless.
    pub(crate) fn take_contents(&mut self) -> HeapContents {
        HeapContents {
            blocks: std::mem::take(&mut self.blocks),
            free: std::mem::take(&mut self.free),
            children: std::mem::take(&mut self.children),
            root: self.root.take(),
            stats: std::mem::take(&mut self.stats),
        }
    }

    /// Folds `contents` into `target`: its blocks, free chunks and children
    /// become `target`'s own and `target` is marked dirty.
    pub(crate) fn absorb(target: &HeapRef, contents: HeapContents) {
        let HeapContents {
            blocks,
            free,
            children,
            stats,
            ..
        } = contents;

        let owner = Arc::downgrade(target);
        for child in children.values() {
            if let Some(heap) = child.link.heap() {
                heap.lock().set_parent(Some(owner.clone()));
            }
        }

        let mut heap = target.lock();
        heap.blocks.extend(blocks);
        heap.free.extend(free);
        heap.children.extend(children);
        heap.stats.absorb(&stats);
        heap.stats.heaps_merged += 1;
        heap.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_rounds_up_to_slots_and_zeroes() {
        let mut heap = Heap::new();
        let a = heap.allocate(12);
        assert_eq!(heap.object_span(a), Some((a, 2)));
        assert_eq!(heap.read_word(a + 8), Ok(0));
        assert!(heap.is_dirty());
    }

    #[test]
    fn zero_sized_allocation_takes_one_slot() {
        let mut heap = Heap::new();
        let a = heap.allocate(0);
        assert_eq!(heap.object_span(a), Some((a, 1)));
    }

    #[test]
    fn growth_size_doubles() {
        let mut heap = Heap::with_growth(4);
        heap.allocate(32);
        assert_eq!(heap.capacity_slots(), 4);
        heap.allocate(8);
        assert_eq!(heap.capacity_slots(), 4 + 8);
        heap.allocate(8 * 20);
        assert_eq!(heap.capacity_slots(), 4 + 8 + 20);
        assert_eq!(heap.stats().blocks_grown, 3);
    }

    #[test]
    fn unaligned_and_foreign_addresses_fault() {
        let mut heap = Heap::new();
        let a = heap.allocate(8);
        assert_eq!(heap.read_word(a + 3), Err(HeapError::Misaligned(a + 3)));
        assert_eq!(heap.read_word(8), Err(HeapError::InvalidAddress(8)));
        // Free slot inside a block.
        assert_eq!(heap.read_word(a + 8), Err(HeapError::InvalidAddress(a + 8)));
    }

    #[test]
    fn collect_without_root_frees_everything() {
        let mut heap = Heap::new();
        for _ in 0..10 {
            heap.allocate(16);
        }
        heap.collect();
        assert_eq!(heap.live_objects(), 0);
        assert_eq!(heap.stats().freed_objects, 10);
        assert!(!heap.is_dirty());
    }

    #[test]
    fn collect_keeps_objects_chained_from_root() {
        let mut heap = Heap::with_root(16);
        let root = heap.root().unwrap();
        let first = heap.allocate(16);
        let second = heap.allocate(8);
        let garbage = heap.allocate(8);
        heap.write_word(root, first).unwrap();
        heap.write_word(first + 8, second).unwrap();
        heap.write_word(second, 77).unwrap();

        heap.collect();

        assert!(heap.contains(first));
        assert!(heap.contains(second));
        assert!(!heap.contains(garbage));
        assert_eq!(heap.read_word(second), Ok(77));
    }

    #[test]
    fn interior_pointers_keep_whole_object() {
        let mut heap = Heap::with_root(8);
        let root = heap.root().unwrap();
        let array = heap.allocate(8 * 4);
        heap.write_word(root, array + 16).unwrap();

        heap.collect();

        assert_eq!(heap.object_span(array + 24), Some((array, 4)));
    }

    #[test]
    fn clean_heap_skips_collection() {
        let mut heap = Heap::with_root(8);
        heap.collect();
        let collections = heap.stats().collections;
        heap.collect();
        assert_eq!(heap.stats().collections, collections);
    }

    #[test]
    fn freed_space_is_reused_before_growing() {
        let mut heap = Heap::with_root(8);
        for _ in 0..8 {
            heap.allocate(24);
        }
        let capacity = heap.capacity_slots();
        heap.collect();

        for _ in 0..8 {
            heap.allocate(24);
        }
        assert_eq!(heap.capacity_slots(), capacity);
    }

    #[test]
    fn idle_blocks_are_released_on_the_following_cycle() {
        let mut heap = Heap::with_root(8);
        heap.allocate(8 * 100);
        assert_eq!(heap.block_count(), 2);

        heap.collect();
        assert_eq!(heap.block_count(), 2);

        heap.mark_dirty();
        heap.collect();
        assert_eq!(heap.block_count(), 1);
        assert_eq!(heap.stats().blocks_released, 1);
    }
}
