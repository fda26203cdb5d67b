use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
};

use parking_lot::RwLock;
use tracing::debug;

use crate::{
    program::{FieldId, FieldKind, Program, TypeId},
    runtime::{
        error::ProgramError,
        gc::{Heap, HeapRef},
    },
};

pub type InstanceId = usize;

/// Heap shared by a top-level instance and all its embedded sub-instances.
///
/// `users` counts firings currently holding locks on any record backed by
/// this heap. Collection only runs when it drops to zero.
pub struct InstanceHeap {
    heap: HeapRef,
    users: AtomicUsize,
}

impl InstanceHeap {
    fn new(heap: HeapRef) -> Self {
        Self {
            heap,
            users: AtomicUsize::new(0),
        }
    }

    pub fn heap(&self) -> &HeapRef {
        &self.heap
    }

    pub fn enter(&self) {
        self.users.fetch_add(1, Ordering::SeqCst);
    }

    /// Leaves a firing and collects when no other firing uses the heap.
    /// Returns `true` when a collection ran.
    pub fn leave(&self, collect: bool) -> bool {
        self.users.fetch_sub(1, Ordering::SeqCst);
        if !collect {
            return false;
        }
        let mut heap = self.heap.lock();
        if self.users.load(Ordering::SeqCst) != 0 {
            return false;
        }
        heap.collect();
        true
    }
}

/// Scheduling, locking and memory wrapper around one instance.
pub struct InstanceRecord {
    pub id: InstanceId,
    /// Dotted path from the top-level instance, e.g. `main.counter`.
    pub name: String,
    pub type_id: TypeId,
    /// Address of the instance's first byte inside its heap.
    pub base: u64,
    pub parent: Option<InstanceId>,
    /// Embedded sub-instances by the field that holds them.
    pub children: Vec<(FieldId, InstanceId)>,
    heap: Arc<InstanceHeap>,
    lock: RwLock<()>,
    queued: AtomicBool,
    firings: AtomicU64,
}

impl InstanceRecord {
    pub fn heap(&self) -> &HeapRef {
        self.heap.heap()
    }

    pub fn shared_heap(&self) -> &Arc<InstanceHeap> {
        &self.heap
    }

    pub fn lock(&self) -> &RwLock<()> {
        &self.lock
    }

    pub fn child(&self, field: FieldId) -> Option<InstanceId> {
        self.children
            .iter()
            .find(|(id, _)| *id == field)
            .map(|(_, child)| *child)
    }

    /// Moves the record into the queued state. Returns `false` when it was
    /// already queued.
    pub(crate) fn try_enqueue(&self) -> bool {
        !self.queued.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn dequeue(&self) {
        self.queued.store(false, Ordering::Release);
    }

    pub fn is_queued(&self) -> bool {
        self.queued.load(Ordering::Acquire)
    }

    pub(crate) fn record_firing(&self) {
        self.firings.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of actions of this instance whose body ran.
    pub fn firings(&self) -> u64 {
        self.firings.load(Ordering::Relaxed)
    }
}

struct TableBuilder<'p> {
    program: &'p Program,
    records: Vec<InstanceRecord>,
}

impl TableBuilder<'_> {
    fn add(
        &mut self,
        name: String,
        type_id: TypeId,
        base: u64,
        parent: Option<InstanceId>,
        heap: &Arc<InstanceHeap>,
    ) -> Result<InstanceId, ProgramError> {
        let id = self.records.len();
        self.records.push(InstanceRecord {
            id,
            name: name.clone(),
            type_id,
            base,
            parent,
            children: Vec::new(),
            heap: heap.clone(),
            lock: RwLock::new(()),
            queued: AtomicBool::new(false),
            firings: AtomicU64::new(0),
        });

        let program = self.program;
        let mut children = Vec::new();
        for (field_id, field) in program.types[type_id].fields.iter().enumerate() {
            if let FieldKind::Component(type_name) = &field.kind {
                let (child_type, _) = program.type_named(type_name)?;
                let child = self.add(
                    format!("{}.{}", name, field.name),
                    child_type,
                    base + field.offset,
                    Some(id),
                    heap,
                )?;
                children.push((field_id, child));
            }
        }
        self.records[id].children = children;
        Ok(id)
    }
}

/// Every instance of the program, top-level and embedded, in creation order.
pub struct InstanceTable {
    records: Vec<Arc<InstanceRecord>>,
    top_level: Vec<InstanceId>,
    by_name: HashMap<String, InstanceId>,
}

impl InstanceTable {
    /// Creates one heap per top-level instance, sized to hold the instance
    /// itself as its root object, and one record per instance reachable
    /// through component-typed fields.
    pub fn allocate(program: &Program) -> Result<Self, ProgramError> {
        let mut builder = TableBuilder {
            program,
            records: Vec::new(),
        };
        let mut top_level = Vec::with_capacity(program.instances.len());

        for decl in &program.instances {
            let (type_id, ty) = program.type_named(&decl.type_name)?;
            let heap = Heap::with_root(ty.size);
            let base = heap
                .root()
                .expect("InstanceTable::allocate: heap created without a root");
            let heap = Arc::new(InstanceHeap::new(heap.into_ref()));

            top_level.push(builder.add(decl.name.clone(), type_id, base, None, &heap)?);
            debug!(instance = %decl.name, ty = %decl.type_name, base, "instance allocated");
        }

        let records: Vec<_> = builder.records.into_iter().map(Arc::new).collect();
        let by_name = records
            .iter()
            .map(|record| (record.name.clone(), record.id))
            .collect();
        Ok(Self {
            records,
            top_level,
            by_name,
        })
    }

    pub fn get(&self, id: InstanceId) -> &Arc<InstanceRecord> {
        &self.records[id]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<InstanceRecord>> {
        self.records.iter()
    }

    pub fn top_level(&self) -> &[InstanceId] {
        &self.top_level
    }

    pub fn find(&self, name: &str) -> Option<&Arc<InstanceRecord>> {
        self.by_name.get(name).map(|id| &self.records[*id])
    }

    /// Follows component-typed fields from `start` along `path`.
    pub fn descend(
        &self,
        program: &Program,
        start: InstanceId,
        path: &[String],
    ) -> Result<InstanceId, ProgramError> {
        let mut current = start;
        for step in path {
            let record = &self.records[current];
            let ty = &program.types[record.type_id];
            let (field, _) = ty.field_named(step)?;
            current = record.child(field).ok_or_else(|| ProgramError::Unresolved {
                ty: ty.name.clone(),
                what: "component field",
                name: step.clone(),
            })?;
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{ComponentType, Field, InstanceDecl, ScalarType};

    fn nested_program() -> Program {
        let inner = ComponentType {
            name: "Inner".into(),
            size: 8,
            fields: vec![Field {
                name: "x".into(),
                offset: 0,
                kind: FieldKind::Scalar(ScalarType::Int),
            }],
            actions: vec![],
            reactions: vec![],
            bindings: vec![],
        };
        let outer = ComponentType {
            name: "Outer".into(),
            size: 24,
            fields: vec![
                Field {
                    name: "left".into(),
                    offset: 0,
                    kind: FieldKind::Component("Inner".into()),
                },
                Field {
                    name: "count".into(),
                    offset: 8,
                    kind: FieldKind::Scalar(ScalarType::Int),
                },
                Field {
                    name: "right".into(),
                    offset: 16,
                    kind: FieldKind::Component("Inner".into()),
                },
            ],
            actions: vec![],
            reactions: vec![],
            bindings: vec![],
        };
        Program {
            types: vec![inner, outer],
            instances: vec![InstanceDecl {
                name: "main".into(),
                type_name: "Outer".into(),
            }],
            bindings: vec![],
        }
    }

    #[test]
    fn nested_instances_share_the_parent_heap() {
        let program = nested_program();
        let table = InstanceTable::allocate(&program).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.top_level(), &[0]);
        let main = table.find("main").unwrap();
        let right = table.find("main.right").unwrap();
        assert_eq!(right.base, main.base + 16);
        assert_eq!(right.parent, Some(main.id));
        assert!(Arc::ptr_eq(main.heap(), right.heap()));
        assert_eq!(main.child(2), Some(right.id));
    }

    #[test]
    fn descend_follows_component_fields() {
        let program = nested_program();
        let table = InstanceTable::allocate(&program).unwrap();
        let left = table.descend(&program, 0, &["left".to_string()]).unwrap();
        assert_eq!(table.get(left).name, "main.left");
        assert!(table.descend(&program, 0, &["count".to_string()]).is_err());
    }

    #[test]
    fn enqueue_is_idempotent() {
        let program = nested_program();
        let table = InstanceTable::allocate(&program).unwrap();
        let record = table.get(0);
        assert!(record.try_enqueue());
        assert!(!record.try_enqueue());
        record.dequeue();
        assert!(record.try_enqueue());
    }

    #[test]
    fn collection_waits_for_the_last_user() {
        let program = nested_program();
        let table = InstanceTable::allocate(&program).unwrap();
        let shared = table.get(0).shared_heap();
        shared.enter();
        shared.enter();
        assert!(!shared.leave(true));
        assert!(shared.leave(true));
    }
}
