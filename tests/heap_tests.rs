use std::{
    sync::{Arc, Barrier},
    thread,
};

use proptest::prelude::*;
use weft::runtime::gc::{Heap, HeapRef, allocate_sub_heap, merge_heap, move_heap};

const NEXT: u64 = 8;

fn rooted_heap() -> (HeapRef, u64) {
    let mut heap = Heap::new();
    let root = heap.allocate(16);
    heap.set_root(Some(root));
    (heap.into_ref(), root)
}

proptest! {
    #[test]
    fn collection_keeps_exactly_the_reachable_objects(
        objects in prop::collection::vec((16u64..80, any::<bool>(), any::<u32>()), 1..64)
    ) {
        let (heap, root) = rooted_heap();
        let mut heap = heap.lock();

        let mut placed = Vec::with_capacity(objects.len());
        let mut tail = root;
        for &(size, keep, payload) in &objects {
            let address = heap.allocate(size);
            heap.write_word(address, payload as u64).unwrap();
            if keep {
                let slot = if tail == root { root } else { tail + NEXT };
                heap.write_word(slot, address).unwrap();
                tail = address;
            }
            placed.push((address, size, keep, payload));
        }

        heap.collect();

        for &(address, _, keep, payload) in &placed {
            if keep {
                prop_assert_eq!(heap.read_word(address).unwrap(), payload as u64);
            } else {
                prop_assert!(!heap.contains(address));
            }
        }

        let grown = heap.stats().blocks_grown;
        let mut dropped: Vec<_> = placed.iter().filter(|object| !object.2).collect();
        dropped.sort_by_key(|object| object.0);
        for &&(_, size, _, _) in &dropped {
            heap.allocate(size);
        }
        prop_assert_eq!(heap.stats().blocks_grown, grown);
    }
}

#[test]
fn moved_heap_survives_under_its_new_parent() {
    let (source, _) = rooted_heap();
    let (target, target_root) = rooted_heap();

    let link = allocate_sub_heap(&source, 16);
    let sub_root = link.heap().unwrap().lock().root().unwrap();
    link.heap().unwrap().lock().write_word(sub_root, 7).unwrap();

    let moved = move_heap(&link, &target).expect("move refused");
    assert!(!link.is_attached());
    assert!(!source.lock().has_child(link.id()));
    assert!(target.lock().has_child(moved.id()));

    target.lock().write_word(target_root, moved.word()).unwrap();
    target.lock().collect();
    source.lock().collect();

    let heap = moved.heap().expect("moved heap was freed");
    assert_eq!(heap.lock().read_word(sub_root).unwrap(), 7);
    assert!(Arc::ptr_eq(&heap.lock().parent().unwrap(), &target));
}

#[test]
fn pointer_into_child_keeps_it_and_its_target_alive() {
    let (parent, root) = rooted_heap();
    let link = allocate_sub_heap(&parent, 16);
    let inner = {
        let heap = link.heap().unwrap();
        let mut heap = heap.lock();
        let inner = heap.allocate(24);
        heap.write_word(inner + 8, 5).unwrap();
        inner
    };
    parent.lock().write_word(root, inner + 8).unwrap();

    parent.lock().collect();

    assert!(link.is_attached());
    let heap = link.heap().unwrap();
    assert!(heap.lock().contains(inner));
    assert_eq!(heap.lock().read_word(inner + 8).unwrap(), 5);

    // Once the pointer is gone the child goes with it.
    parent.lock().write_word(root, 0).unwrap();
    parent.lock().mark_dirty();
    parent.lock().collect();
    assert!(!link.is_attached());
}

#[test]
fn unreferenced_child_heap_is_freed() {
    let (parent, _) = rooted_heap();
    let link = allocate_sub_heap(&parent, 16);

    parent.lock().collect();

    assert!(!link.is_attached());
    assert_eq!(parent.lock().child_count(), 0);
    assert_eq!(parent.lock().stats().heaps_freed, 1);
}

#[test]
fn merged_heap_becomes_part_of_its_target() {
    let (target, target_root) = rooted_heap();
    let link = allocate_sub_heap(&target, 16);
    let sub_root = {
        let heap = link.heap().unwrap();
        let mut heap = heap.lock();
        let root = heap.root().unwrap();
        let node = heap.allocate(16);
        heap.write_word(node, 99).unwrap();
        heap.write_word(root, node).unwrap();
        root
    };

    let merged_root = merge_heap(&link, &target).expect("merge refused");
    assert_eq!(merged_root, sub_root);
    assert!(!link.is_attached());

    let mut heap = target.lock();
    assert_eq!(heap.child_count(), 0);
    heap.write_word(target_root, merged_root).unwrap();
    heap.collect();

    let node = heap.read_word(merged_root).unwrap();
    assert_eq!(heap.read_word(node).unwrap(), 99);
    assert_eq!(heap.stats().heaps_merged, 1);
}

#[test]
fn heap_cannot_move_into_itself() {
    let (parent, _) = rooted_heap();
    let link = allocate_sub_heap(&parent, 16);
    let inner = allocate_sub_heap(&link.heap().unwrap(), 16);

    assert!(move_heap(&link, &inner.heap().unwrap()).is_none());
    assert!(merge_heap(&link, &link.heap().unwrap()).is_none());
    assert!(link.is_attached());
}

#[test]
fn change_scope_blocks_move_and_merge() {
    let (source, _) = rooted_heap();
    let (target, _) = rooted_heap();
    let link = allocate_sub_heap(&source, 16);

    let guard = link.change().unwrap();
    assert!(link.is_changing());
    assert!(move_heap(&link, &target).is_none());
    assert!(merge_heap(&link, &target).is_none());

    // Collection leaves a changing child alone even when unreferenced.
    source.lock().collect();
    assert!(link.is_attached());

    drop(guard);
    assert!(!link.is_changing());
    assert!(move_heap(&link, &target).is_some());
}

#[test]
fn concurrent_moves_succeed_exactly_once() {
    const THREADS: usize = 8;

    for _ in 0..20 {
        let (source, _) = rooted_heap();
        let link = allocate_sub_heap(&source, 16);
        let targets: Vec<HeapRef> = (0..THREADS).map(|_| rooted_heap().0).collect();
        let barrier = Barrier::new(THREADS);

        let successes = thread::scope(|scope| {
            let handles: Vec<_> = targets
                .iter()
                .map(|target| {
                    let link = &link;
                    let barrier = &barrier;
                    scope.spawn(move || {
                        barrier.wait();
                        move_heap(link, target).is_some()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .filter(|&moved| moved)
                .count()
        });

        assert_eq!(successes, 1);
        let owners = targets
            .iter()
            .filter(|target| target.lock().child_count() == 1)
            .count();
        assert_eq!(owners, 1);
        assert_eq!(source.lock().child_count(), 0);
    }
}
