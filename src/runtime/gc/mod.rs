//! Per-instance garbage-collected heaps.
//!
//! A heap is a set of blocks of fixed-size slots keyed by their base address,
//! a first-fit free list and a single root object. Heaps form a forest: a
//! heap owns child heaps through [`HeapLink`]s, each child collected on its
//! own, and a child can be re-parented ([`move_heap`]) or absorbed
//! ([`merge_heap`]) as a unit.
//!
//! Memory is addressed with plain 64-bit words. Block base addresses come
//! from one process-wide range so they stay valid when blocks change owner.
//! The collector is a conservative mark-sweep: every word inside a marked
//! object that resolves into one of the heap's blocks keeps its target alive.

pub mod address;
pub mod block;
pub mod chunk;
pub mod heap;
pub mod heap_link;
pub mod stats;

pub use address::{SLOT_SIZE, is_address, link_word, word_link};
pub use heap::{Heap, HeapRef};
pub use heap_link::{ChangeGuard, HeapLink, LinkTable, allocate_sub_heap, merge_heap, move_heap};
pub use stats::GcStats;
