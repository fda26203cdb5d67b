use std::collections::BTreeMap;

use bitflags::bitflags;

use crate::runtime::gc::address::{SLOT_SIZE, reserve_block_range};

bitflags! {
    /// Per-slot status bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SlotStatus: u8 {
        /// First slot of an object.
        const OBJECT = 0b0001;
        /// Slot belongs to a live allocation.
        const ALLOCATED = 0b0010;
        /// Slot belongs to an object reached during marking.
        const MARK = 0b0100;
        /// Slot contents were already scanned for pointers.
        const SCANNED = 0b1000;
    }
}

/// Result of sweeping one block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    pub freed_objects: usize,
    pub freed_slots: usize,
}

/// Contiguous extent of slots owned by one heap.
///
/// Besides the status bitmap the block keeps a side table from object start
/// slot to object length, so interior pointers resolve to their object with a
/// single ordered lookup.
#[derive(Debug)]
pub struct Block {
    base: u64,
    words: Vec<u64>,
    status: Vec<SlotStatus>,
    objects: BTreeMap<usize, usize>,
    /// Set while the block sits on the collector's work list.
    pub(crate) marked: bool,
}

impl Block {
    /// Creates a zeroed block of `slots` slots at a fresh address.
    pub fn new(slots: usize) -> Self {
        let slots = slots.max(1);
        Self {
            base: reserve_block_range(slots),
            words: vec![0; slots],
            status: vec![SlotStatus::empty(); slots],
            objects: BTreeMap::new(),
            marked: false,
        }
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// One past the last byte address of this block.
    pub fn end(&self) -> u64 {
        self.base + self.words.len() as u64 * SLOT_SIZE
    }

    pub fn contains(&self, address: u64) -> bool {
        address >= self.base && address < self.end()
    }

    /// Slot index holding `address`. The address must lie inside the block.
    pub fn slot_of(&self, address: u64) -> usize {
        ((address - self.base) / SLOT_SIZE) as usize
    }

    pub fn address_of(&self, slot: usize) -> u64 {
        self.base + slot as u64 * SLOT_SIZE
    }

    pub fn status(&self, slot: usize) -> SlotStatus {
        self.status[slot]
    }

    pub fn read(&self, slot: usize) -> u64 {
        self.words[slot]
    }

    pub fn write(&mut self, slot: usize, word: u64) {
        self.words[slot] = word;
    }

    pub fn is_allocated(&self, slot: usize) -> bool {
        self.status[slot].contains(SlotStatus::ALLOCATED)
    }

    /// Records a new object over `start..start + len` and zeroes its memory.
    pub fn claim(&mut self, start: usize, len: usize) {
        let end = start + len;
        let mut slot = start;
        while slot < end {
            self.status[slot] = SlotStatus::ALLOCATED;
            self.words[slot] = 0;
            slot += 1;
        }
        self.status[start] |= SlotStatus::OBJECT;
        self.objects.insert(start, len);
    }

    /// Start slot and length of the object covering `slot`, if any.
    pub fn object_at(&self, slot: usize) -> Option<(usize, usize)> {
        let (&start, &len) = self.objects.range(..=slot).next_back()?;
        if slot < start + len {
            Some((start, len))
        } else {
            None
        }
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn allocated_slots(&self) -> usize {
        self.objects.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Sets the mark bit over the whole object. Returns `false` when the
    /// object was already marked.
    pub fn mark_object(&mut self, start: usize, len: usize) -> bool {
        if self.status[start].contains(SlotStatus::MARK) {
            return false;
        }
        let mut slot = start;
        while slot < start + len {
            self.status[slot] |= SlotStatus::MARK;
            slot += 1;
        }
        true
    }

    pub fn is_marked(&self, slot: usize) -> bool {
        self.status[slot].contains(SlotStatus::MARK)
    }

    /// Collects the words of every marked slot not yet scanned and flags
    /// those slots as scanned.
    pub fn take_unscanned(&mut self) -> Vec<u64> {
        let mut words = Vec::new();
        let mut slot = 0;
        let len = self.status.len();
        while slot < len {
            let status = self.status[slot];
            if status.contains(SlotStatus::MARK) && !status.contains(SlotStatus::SCANNED) {
                self.status[slot] |= SlotStatus::SCANNED;
                words.push(self.words[slot]);
            }
            slot += 1;
        }
        words
    }

    /// Frees every unmarked object and clears the collection bits of the
    /// survivors.
    pub fn sweep(&mut self) -> SweepOutcome {
        let mut outcome = SweepOutcome::default();
        let mut dead = Vec::new();

        for (&start, &len) in &self.objects {
            if self.status[start].contains(SlotStatus::MARK) {
                let mut slot = start;
                while slot < start + len {
                    self.status[slot].remove(SlotStatus::MARK | SlotStatus::SCANNED);
                    slot += 1;
                }
            } else {
                dead.push((start, len));
            }
        }

        for (start, len) in dead {
            let mut slot = start;
            while slot < start + len {
                self.status[slot] = SlotStatus::empty();
                slot += 1;
            }
            self.objects.remove(&start);
            outcome.freed_objects += 1;
            outcome.freed_slots += len;
        }

        self.marked = false;
        outcome
    }

    /// Maximal runs of unallocated slots as `(start, len)` pairs.
    pub fn free_runs(&self) -> Vec<(usize, usize)> {
        let mut runs = Vec::new();
        let mut slot = 0;
        let len = self.status.len();
        while slot < len {
            if self.is_allocated(slot) {
                slot += 1;
                continue;
            }
            let start = slot;
            while slot < len && !self.is_allocated(slot) {
                slot += 1;
            }
            runs.push((start, slot - start));
        }
        runs
    }
}
