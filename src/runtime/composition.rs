//! Start-up proof that a bound network fires deterministically.
//!
//! For every instance and every action of its type the analyzer walks the
//! transitive closure of the action's triggers: output ports named by a
//! trigger are followed through the port table into the bound reactions and
//! their own triggers. The walk fails on
//!
//! * a port reached again while it is already on the current path,
//! * an instance written again further down the current path by a member
//!   other than the one that wrote it first,
//! * a data field written by two different trigger declarations reached
//!   from the actions of one instance,
//! * a reaction bound to more than one port.
//!
//! As a by-product it records the lock plan of every action: the records it
//! touches in first-visit order with the strongest mode required. Plans are
//! checked against each other so that no two of them order a pair of records
//! oppositely.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, hash_map::Entry};

use rayon::prelude::*;
use tracing::debug;

use crate::{
    program::{AccessMode, ActionId, FieldId, Program, ReactionId, TriggerGroup},
    runtime::{
        binding::PortTable,
        error::CompositionError,
        instance::{InstanceId, InstanceTable},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockEntry {
    pub instance: InstanceId,
    pub mode: AccessMode,
}

/// Records an action locks, in acquisition order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockPlan {
    entries: Vec<LockEntry>,
}

impl LockPlan {
    pub fn entries(&self) -> &[LockEntry] {
        &self.entries
    }

    fn lock(&mut self, instance: InstanceId, mode: AccessMode) {
        match self.entries.iter_mut().find(|entry| entry.instance == instance) {
            Some(entry) => entry.mode = entry.mode.max(mode),
            None => self.entries.push(LockEntry { instance, mode }),
        }
    }

    pub fn mode_of(&self, instance: InstanceId) -> Option<AccessMode> {
        self.entries
            .iter()
            .find(|entry| entry.instance == instance)
            .map(|entry| entry.mode)
    }
}

/// Lock plans of every action of every instance.
#[derive(Debug, Default)]
pub struct LockPlans {
    plans: Vec<Vec<LockPlan>>,
}

impl LockPlans {
    pub fn plan(&self, instance: InstanceId, action: ActionId) -> &LockPlan {
        &self.plans[instance][action]
    }

    pub fn len(&self) -> usize {
        self.plans.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn iter(&self) -> impl Iterator<Item = &LockPlan> {
        self.plans.iter().flatten()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Member {
    Action(ActionId),
    Reaction(ReactionId),
}

/// One trigger group of one member of one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Declaration {
    instance: InstanceId,
    member: Member,
    group: usize,
}

#[derive(Clone, Copy)]
struct Network<'a> {
    program: &'a Program,
    instances: &'a InstanceTable,
    ports: &'a PortTable,
}

impl Network<'_> {
    fn name(&self, instance: InstanceId) -> String {
        self.instances.get(instance).name.clone()
    }

    fn field_name(&self, instance: InstanceId, field: FieldId) -> String {
        let ty = &self.program.types[self.instances.get(instance).type_id];
        ty.fields[field].name.clone()
    }
}

/// Depth-first walk over the triggers reachable from one action.
struct Walk<'a, 'w> {
    network: Network<'a>,
    path: Vec<(InstanceId, FieldId)>,
    /// Instances written on the current path and the member that wrote them.
    path_writes: Vec<(InstanceId, InstanceId, Member)>,
    writes: &'w mut HashMap<(InstanceId, FieldId), Declaration>,
    plan: LockPlan,
}

impl Walk<'_, '_> {
    fn member(
        &mut self,
        instance: InstanceId,
        member: Member,
        groups: &[TriggerGroup],
    ) -> Result<(), CompositionError> {
        let Network {
            program,
            instances,
            ports,
        } = self.network;
        let depth = self.path_writes.len();

        for (group_index, group) in groups.iter().enumerate() {
            let declaration = Declaration {
                instance,
                member,
                group: group_index,
            };
            let mut called = Vec::new();

            for trigger in &group.triggers {
                let target = instances
                    .descend(program, instance, &trigger.path)
                    .expect("Walk::member: trigger paths are validated with the program");
                self.plan.lock(target, trigger.mode);

                let ty = &program.types[instances.get(target).type_id];
                let mut written = None;
                for name in &trigger.fields {
                    let field = ty
                        .field_id(name)
                        .expect("Walk::member: trigger fields are validated with the program");
                    if ty.is_output(field) {
                        called.push((target, field));
                    } else if trigger.mode == AccessMode::Write {
                        self.record_write(target, field, declaration)?;
                        written.get_or_insert(field);
                    }
                }
                if let Some(field) = written {
                    self.record_path_write(target, field, instance, member)?;
                }
            }

            for (target, port) in called {
                if self.path.contains(&(target, port)) {
                    return Err(CompositionError::FiringCycle {
                        instance: self.network.name(target),
                        port: self.network.field_name(target, port),
                    });
                }
                self.path.push((target, port));
                for bound in ports.targets(target, port) {
                    self.plan.lock(bound.instance, AccessMode::Read);
                    let ty = &program.types[instances.get(bound.instance).type_id];
                    let reaction = &ty.reactions[bound.reaction];
                    self.member(
                        bound.instance,
                        Member::Reaction(bound.reaction),
                        &reaction.triggers,
                    )?;
                }
                self.path.pop();
            }
        }
        self.path_writes.truncate(depth);
        Ok(())
    }

    fn record_path_write(
        &mut self,
        target: InstanceId,
        field: FieldId,
        instance: InstanceId,
        member: Member,
    ) -> Result<(), CompositionError> {
        let clash = self
            .path_writes
            .iter()
            .any(|&(written, by, with)| written == target && (by, with) != (instance, member));
        if clash {
            return Err(CompositionError::WriteConflict {
                instance: self.network.name(target),
                field: self.network.field_name(target, field),
            });
        }
        self.path_writes.push((target, instance, member));
        Ok(())
    }

    fn record_write(
        &mut self,
        instance: InstanceId,
        field: FieldId,
        declaration: Declaration,
    ) -> Result<(), CompositionError> {
        match self.writes.entry((instance, field)) {
            Entry::Occupied(previous) if *previous.get() != declaration => {
                Err(CompositionError::WriteConflict {
                    instance: self.network.name(instance),
                    field: self.network.field_name(instance, field),
                })
            }
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(slot) => {
                slot.insert(declaration);
                Ok(())
            }
        }
    }
}

fn analyze_instance(
    network: Network<'_>,
    instance: InstanceId,
) -> Result<Vec<LockPlan>, CompositionError> {
    let ty = &network.program.types[network.instances.get(instance).type_id];
    let mut writes = HashMap::new();
    let mut plans = Vec::with_capacity(ty.actions.len());

    for (action_id, action) in ty.actions.iter().enumerate() {
        let mut walk = Walk {
            network,
            path: Vec::new(),
            path_writes: Vec::new(),
            writes: &mut writes,
            plan: LockPlan::default(),
        };
        walk.member(instance, Member::Action(action_id), &action.triggers)?;
        // No two firings of one instance may overlap.
        walk.plan.lock(instance, AccessMode::Write);
        plans.push(walk.plan);
    }
    Ok(plans)
}

fn check_single_binding(network: Network<'_>) -> Result<(), CompositionError> {
    let mut seen = HashSet::new();
    for binding in network.ports.bindings() {
        if !seen.insert(binding.target) {
            let target = binding.target;
            let ty = &network.program.types[network.instances.get(target.instance).type_id];
            return Err(CompositionError::ReactionBoundTwice {
                instance: network.name(target.instance),
                reaction: ty.reactions[target.reaction].name.clone(),
            });
        }
    }
    Ok(())
}

/// Rejects plans that acquire the same records in opposite orders, directly
/// or through a chain of plans.
fn check_lock_order(network: Network<'_>, plans: &LockPlans) -> Result<(), CompositionError> {
    let mut edges: BTreeMap<InstanceId, BTreeSet<InstanceId>> = BTreeMap::new();
    for plan in plans.iter() {
        for pair in plan.entries().windows(2) {
            edges
                .entry(pair[0].instance)
                .or_default()
                .insert(pair[1].instance);
        }
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Visit {
        Fresh,
        Active,
        Done,
    }

    let mut state = vec![Visit::Fresh; network.instances.len()];
    for &start in edges.keys() {
        if state[start] != Visit::Fresh {
            continue;
        }
        // Iterative DFS: (node, successors still to visit).
        let mut stack = vec![(start, edges[&start].iter().copied().collect::<Vec<_>>())];
        state[start] = Visit::Active;
        while let Some((node, pending)) = stack.last_mut() {
            let node = *node;
            match pending.pop() {
                Some(next) if state[next] == Visit::Active => {
                    return Err(CompositionError::LockOrderInversion {
                        first: network.name(next),
                        second: network.name(node),
                    });
                }
                Some(next) if state[next] == Visit::Fresh => {
                    state[next] = Visit::Active;
                    let successors = edges
                        .get(&next)
                        .map(|set| set.iter().copied().collect())
                        .unwrap_or_default();
                    stack.push((next, successors));
                }
                Some(_) => {}
                None => {
                    state[node] = Visit::Done;
                    stack.pop();
                }
            }
        }
    }
    Ok(())
}

/// Runs every check and returns the lock plans on success.
pub fn analyze(
    program: &Program,
    instances: &InstanceTable,
    ports: &PortTable,
) -> Result<LockPlans, CompositionError> {
    let network = Network {
        program,
        instances,
        ports,
    };
    check_single_binding(network)?;

    let results: Vec<_> = (0..instances.len())
        .into_par_iter()
        .map(|instance| analyze_instance(network, instance))
        .collect();
    let plans = LockPlans {
        plans: results.into_iter().collect::<Result<_, _>>()?,
    };

    check_lock_order(network, &plans)?;
    debug!(
        instances = instances.len(),
        plans = plans.len(),
        "composition analyzed"
    );
    Ok(plans)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_keeps_first_position_and_strongest_mode() {
        let mut plan = LockPlan::default();
        plan.lock(2, AccessMode::Read);
        plan.lock(0, AccessMode::Write);
        plan.lock(2, AccessMode::Write);
        plan.lock(0, AccessMode::Read);

        assert_eq!(
            plan.entries(),
            &[
                LockEntry {
                    instance: 2,
                    mode: AccessMode::Write
                },
                LockEntry {
                    instance: 0,
                    mode: AccessMode::Write
                },
            ]
        );
        assert_eq!(plan.mode_of(1), None);
    }
}
