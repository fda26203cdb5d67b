use std::{
    collections::HashMap,
    sync::{
        Arc, Weak,
        atomic::{AtomicU64, Ordering},
    },
};

use parking_lot::Mutex;
use tracing::trace;

use crate::runtime::gc::{
    address::{link_word, word_link},
    heap::{Heap, HeapRef},
};

static NEXT_LINK_ID: AtomicU64 = AtomicU64::new(1);

enum LinkState {
    Attached { heap: HeapRef, changes: usize },
    Detached,
}

/// Ownership-transferable handle to a sub-heap.
///
/// A link is either attached to its heap or detached, once the heap was
/// moved, merged or freed. While a [`ChangeGuard`] is alive the heap can be
/// read and written through the guard but can be neither moved nor merged.
pub struct HeapLink {
    id: u64,
    state: Mutex<LinkState>,
}

impl HeapLink {
    pub fn attached(heap: HeapRef) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_LINK_ID.fetch_add(1, Ordering::Relaxed),
            state: Mutex::new(LinkState::Attached { heap, changes: 0 }),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// The memory word that refers to this link.
    pub fn word(&self) -> u64 {
        link_word(self.id)
    }

    pub fn is_attached(&self) -> bool {
        matches!(*self.state.lock(), LinkState::Attached { .. })
    }

    pub fn change_count(&self) -> usize {
        match &*self.state.lock() {
            LinkState::Attached { changes, .. } => *changes,
            LinkState::Detached => 0,
        }
    }

    pub fn is_changing(&self) -> bool {
        self.change_count() > 0
    }

    pub fn heap(&self) -> Option<HeapRef> {
        match &*self.state.lock() {
            LinkState::Attached { heap, .. } => Some(heap.clone()),
            LinkState::Detached => None,
        }
    }

    /// Opens a change scope. Returns `None` on a detached link.
    pub fn change(self: &Arc<Self>) -> Option<ChangeGuard> {
        let mut state = self.state.lock();
        match &mut *state {
            LinkState::Attached { heap, changes } => {
                *changes += 1;
                Some(ChangeGuard {
                    link: self.clone(),
                    heap: heap.clone(),
                })
            }
            LinkState::Detached => None,
        }
    }

    /// Detaches the heap for a move or merge. Refused while detached or
    /// while any change scope is open.
    fn take_for_transfer(&self) -> Option<HeapRef> {
        let mut state = self.state.lock();
        match &*state {
            LinkState::Attached { changes: 0, .. } => {}
            _ => return None,
        }
        match std::mem::replace(&mut *state, LinkState::Detached) {
            LinkState::Attached { heap, .. } => Some(heap),
            LinkState::Detached => None,
        }
    }

    pub(crate) fn detach(&self) -> Option<HeapRef> {
        match std::mem::replace(&mut *self.state.lock(), LinkState::Detached) {
            LinkState::Attached { heap, .. } => Some(heap),
            LinkState::Detached => None,
        }
    }
}

/// Open change scope on a link. Dropping the guard closes the scope.
pub struct ChangeGuard {
    link: Arc<HeapLink>,
    heap: HeapRef,
}

impl ChangeGuard {
    pub fn heap(&self) -> &HeapRef {
        &self.heap
    }

    pub fn link(&self) -> &Arc<HeapLink> {
        &self.link
    }

    pub fn root(&self) -> Option<u64> {
        self.heap.lock().root()
    }
}

impl Drop for ChangeGuard {
    fn drop(&mut self) {
        if let LinkState::Attached { changes, .. } = &mut *self.link.state.lock() {
            *changes = changes.saturating_sub(1);
        }
    }
}

/// Creates a heap holding one root object of `root_size` bytes as a child of
/// `parent`, returning the link that owns it.
pub fn allocate_sub_heap(parent: &HeapRef, root_size: u64) -> Arc<HeapLink> {
    let mut heap = Heap::with_root(root_size);
    heap.set_parent(Some(Arc::downgrade(parent)));
    let root = heap.root();
    let link = HeapLink::attached(heap.into_ref());

    let mut parent = parent.lock();
    parent.add_child(link.clone(), root);
    trace!(parent = parent.id(), link = link.id(), "sub-heap allocated");
    link
}

/// Returns `true` when `ancestor` is `heap` itself or one of its parents.
fn is_ancestor_or_self(ancestor: &HeapRef, heap: &HeapRef) -> bool {
    let mut current = Some(heap.clone());
    while let Some(candidate) = current {
        if Arc::ptr_eq(&candidate, ancestor) {
            return true;
        }
        current = candidate.lock().parent();
    }
    false
}

/// Re-parents the heap behind `link` under `target`.
///
/// On success the source link is detached and a fresh link owning the heap
/// is returned. Returns `None` when the source is already detached, has an
/// open change scope, or `target` lives inside the heap being moved.
pub fn move_heap(link: &HeapLink, target: &HeapRef) -> Option<Arc<HeapLink>> {
    let candidate = link.heap()?;
    if is_ancestor_or_self(&candidate, target) {
        return None;
    }
    let heap = link.take_for_transfer()?;

    let (old_parent, root) = {
        let mut moved = heap.lock();
        let old_parent = moved.parent();
        moved.set_parent(Some(Arc::downgrade(target)));
        (old_parent, moved.root())
    };
    if let Some(old_parent) = old_parent {
        old_parent.lock().remove_child(link.id());
    }

    let moved = HeapLink::attached(heap);
    target.lock().add_child(moved.clone(), root);
    trace!(from = link.id(), to = moved.id(), "heap moved");
    Some(moved)
}

/// Absorbs the heap behind `link` into `target` and returns its former root.
///
/// The sub-heap boundary disappears: blocks, free chunks and children now
/// belong to `target`. Refused under the same conditions as [`move_heap`].
pub fn merge_heap(link: &HeapLink, target: &HeapRef) -> Option<u64> {
    let candidate = link.heap()?;
    if is_ancestor_or_self(&candidate, target) {
        return None;
    }
    let heap = link.take_for_transfer()?;

    let (old_parent, contents) = {
        let mut merged = heap.lock();
        (merged.parent(), merged.take_contents())
    };
    if let Some(old_parent) = old_parent {
        old_parent.lock().remove_child(link.id());
    }

    let root = contents.root();
    Heap::absorb(target, contents);
    trace!(link = link.id(), "heap merged");
    root
}

/// Resolves link words found in memory back to their links.
///
/// Entries are weak: a link lives as long as the heap that owns it keeps it
/// as a child, or as long as some caller holds it.
#[derive(Default)]
pub struct LinkTable {
    links: Mutex<HashMap<u64, Weak<HeapLink>>>,
}

impl LinkTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `link` and returns the word that refers to it.
    pub fn register(&self, link: &Arc<HeapLink>) -> u64 {
        self.links.lock().insert(link.id(), Arc::downgrade(link));
        link.word()
    }

    pub fn resolve(&self, word: u64) -> Option<Arc<HeapLink>> {
        let id = word_link(word)?;
        let mut links = self.links.lock();
        match links.get(&id).map(Weak::upgrade) {
            Some(Some(link)) => Some(link),
            Some(None) => {
                links.remove(&id);
                None
            }
            None => None,
        }
    }

    /// Number of links still alive, dropping dead entries on the way.
    pub fn live_count(&self) -> usize {
        let mut links = self.links.lock();
        links.retain(|_, link| link.strong_count() > 0);
        links.len()
    }
}
