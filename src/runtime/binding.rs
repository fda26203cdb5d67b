use std::collections::HashMap;

use tracing::debug;

use crate::{
    program::{Binding, FieldId, FieldKind, Program, ReactionId},
    runtime::{
        error::ProgramError,
        instance::{InstanceId, InstanceTable},
    },
};

/// Resolved endpoint of a binding: a reaction of a concrete instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortTarget {
    pub instance: InstanceId,
    pub reaction: ReactionId,
}

/// A binding resolved against the instance tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcreteBinding {
    pub instance: InstanceId,
    pub port: FieldId,
    pub target: PortTarget,
}

/// Runtime port lists: for every (instance, output port), the reactions it
/// triggers, in binding declaration order.
#[derive(Debug, Default)]
pub struct PortTable {
    ports: HashMap<(InstanceId, FieldId), Vec<PortTarget>>,
    bindings: Vec<ConcreteBinding>,
}

impl PortTable {
    /// Resolves type-level bindings for every instance, in creation order,
    /// then the program-level bindings between top-level instances.
    pub fn create(program: &Program, instances: &InstanceTable) -> Result<Self, ProgramError> {
        let mut table = Self::default();

        for record in instances.iter() {
            let ty = &program.types[record.type_id];
            for binding in &ty.bindings {
                table.bind(program, instances, record.id, binding)?;
            }
        }

        for binding in &program.bindings {
            let (instance, output) = split_top_level(instances, &binding.output)?;
            let (input_instance, input) = split_top_level(instances, &binding.input)?;
            let resolved =
                Self::resolve(program, instances, instance, output, input_instance, input)?;
            table.insert(resolved);
        }

        debug!(bindings = table.bindings.len(), "bindings created");
        Ok(table)
    }

    fn bind(
        &mut self,
        program: &Program,
        instances: &InstanceTable,
        owner: InstanceId,
        binding: &Binding,
    ) -> Result<(), ProgramError> {
        let resolved = Self::resolve(
            program,
            instances,
            owner,
            &binding.output,
            owner,
            &binding.input,
        )?;
        self.insert(resolved);
        Ok(())
    }

    fn resolve(
        program: &Program,
        instances: &InstanceTable,
        output_root: InstanceId,
        output: &[String],
        input_root: InstanceId,
        input: &[String],
    ) -> Result<ConcreteBinding, ProgramError> {
        let (port_name, port_path) = output.split_last().ok_or(ProgramError::EmptyPath)?;
        let (reaction_name, reaction_path) = input.split_last().ok_or(ProgramError::EmptyPath)?;

        let instance = instances.descend(program, output_root, port_path)?;
        let port_type = &program.types[instances.get(instance).type_id];
        let (port, field) = port_type.field_named(port_name)?;
        let FieldKind::Output(signature) = &field.kind else {
            return Err(ProgramError::Unresolved {
                ty: port_type.name.clone(),
                what: "output port",
                name: port_name.clone(),
            });
        };

        let target_instance = instances.descend(program, input_root, reaction_path)?;
        let target_type = &program.types[instances.get(target_instance).type_id];
        let reaction = target_type
            .reaction_id(reaction_name)
            .ok_or_else(|| ProgramError::Unresolved {
                ty: target_type.name.clone(),
                what: "reaction",
                name: reaction_name.clone(),
            })?;

        if target_type.reactions[reaction].params != *signature {
            return Err(ProgramError::SignatureMismatch {
                port: format!("{}.{}", instances.get(instance).name, port_name),
                reaction: format!("{}.{}", instances.get(target_instance).name, reaction_name),
            });
        }

        Ok(ConcreteBinding {
            instance,
            port,
            target: PortTarget {
                instance: target_instance,
                reaction,
            },
        })
    }

    fn insert(&mut self, binding: ConcreteBinding) {
        self.ports
            .entry((binding.instance, binding.port))
            .or_default()
            .push(binding.target);
        self.bindings.push(binding);
    }

    /// Reactions triggered by calling `port` of `instance`, in call order.
    pub fn targets(&self, instance: InstanceId, port: FieldId) -> &[PortTarget] {
        self.ports
            .get(&(instance, port))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn bindings(&self) -> &[ConcreteBinding] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

fn split_top_level<'b>(
    instances: &InstanceTable,
    path: &'b [String],
) -> Result<(InstanceId, &'b [String]), ProgramError> {
    let (first, rest) = path.split_first().ok_or(ProgramError::EmptyPath)?;
    let record = instances
        .find(first)
        .filter(|record| record.parent.is_none())
        .ok_or_else(|| ProgramError::UnknownInstance(first.clone()))?;
    Ok((record.id, rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{ComponentType, Field, InstanceDecl, Reaction, ScalarType};

    fn path(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|part| part.to_string()).collect()
    }

    fn sink(params: Vec<ScalarType>) -> ComponentType {
        ComponentType {
            name: "Sink".into(),
            size: 8,
            fields: vec![],
            actions: vec![],
            reactions: vec![Reaction {
                name: "take".into(),
                params,
                body: vec![],
                triggers: vec![],
                locals: 0,
            }],
            bindings: vec![],
        }
    }

    fn source() -> ComponentType {
        ComponentType {
            name: "Source".into(),
            size: 16,
            fields: vec![
                Field {
                    name: "out".into(),
                    offset: 0,
                    kind: FieldKind::Output(vec![ScalarType::Int]),
                },
                Field {
                    name: "inner".into(),
                    offset: 8,
                    kind: FieldKind::Component("Sink".into()),
                },
            ],
            actions: vec![],
            reactions: vec![],
            bindings: vec![Binding {
                output: path(&["out"]),
                input: path(&["inner", "take"]),
            }],
        }
    }

    fn program(sink_params: Vec<ScalarType>) -> Program {
        Program {
            types: vec![sink(sink_params), source()],
            instances: vec![
                InstanceDecl {
                    name: "src".into(),
                    type_name: "Source".into(),
                },
                InstanceDecl {
                    name: "dst".into(),
                    type_name: "Sink".into(),
                },
            ],
            bindings: vec![Binding {
                output: path(&["src", "out"]),
                input: path(&["dst", "take"]),
            }],
        }
    }

    #[test]
    fn type_and_program_bindings_keep_declaration_order() {
        let program = program(vec![ScalarType::Int]);
        let instances = InstanceTable::allocate(&program).unwrap();
        let ports = PortTable::create(&program, &instances).unwrap();

        let src = instances.find("src").unwrap().id;
        let inner = instances.find("src.inner").unwrap().id;
        let dst = instances.find("dst").unwrap().id;
        let targets: Vec<_> = ports.targets(src, 0).iter().map(|t| t.instance).collect();
        assert_eq!(targets, vec![inner, dst]);
        assert!(ports.targets(dst, 0).is_empty());
    }

    #[test]
    fn signature_mismatch_is_rejected() {
        let program = program(vec![ScalarType::Bool]);
        let instances = InstanceTable::allocate(&program).unwrap();
        let err = PortTable::create(&program, &instances).unwrap_err();
        assert!(matches!(err, ProgramError::SignatureMismatch { .. }));
    }

    #[test]
    fn unknown_top_level_instance_is_rejected() {
        let mut program = program(vec![ScalarType::Int]);
        program.bindings[0].input = path(&["nowhere", "take"]);
        let instances = InstanceTable::allocate(&program).unwrap();
        let err = PortTable::create(&program, &instances).unwrap_err();
        assert!(matches!(err, ProgramError::UnknownInstance(name) if name == "nowhere"));
    }
}
