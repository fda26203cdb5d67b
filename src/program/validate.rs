use std::collections::HashSet;

use crate::{
    program::{ComponentType, FieldKind, Program, Stmt, TriggerGroup, TypeId, WORD_SIZE},
    runtime::{builtins::get_builtin, error::ProgramError},
};

impl Program {
    /// Checks that the description is self-consistent: names are unique,
    /// layouts fit, component types are not recursive and every trigger,
    /// port call and builtin resolves.
    pub fn validate(&self) -> Result<(), ProgramError> {
        check_unique(self.types.iter().map(|ty| ty.name.as_str()))?;
        check_unique(self.instances.iter().map(|decl| decl.name.as_str()))?;

        for ty in &self.types {
            check_layout(self, ty)?;
        }
        check_recursion(self)?;

        for ty in &self.types {
            check_members(self, ty)?;
        }
        for decl in &self.instances {
            self.type_named(&decl.type_name)?;
        }
        Ok(())
    }

    /// Size in bytes a field of this kind occupies inside its owner.
    pub fn field_size(&self, kind: &FieldKind) -> Result<u64, ProgramError> {
        match kind {
            FieldKind::Scalar(_) | FieldKind::Output(_) => Ok(WORD_SIZE),
            FieldKind::Component(name) => Ok(self.type_named(name)?.1.size),
        }
    }
}

fn check_unique<'a>(names: impl Iterator<Item = &'a str>) -> Result<(), ProgramError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(ProgramError::Duplicate(name.to_string()));
        }
    }
    Ok(())
}

fn check_layout(program: &Program, ty: &ComponentType) -> Result<(), ProgramError> {
    check_unique(ty.fields.iter().map(|field| field.name.as_str()))?;
    check_unique(ty.actions.iter().map(|action| action.name.as_str()))?;
    check_unique(ty.reactions.iter().map(|reaction| reaction.name.as_str()))?;

    let mut spans = Vec::with_capacity(ty.fields.len());
    for field in &ty.fields {
        let bad = |problem| ProgramError::BadLayout {
            ty: ty.name.clone(),
            field: field.name.clone(),
            offset: field.offset,
            problem,
        };
        if field.offset % WORD_SIZE != 0 {
            return Err(bad("is not word aligned"));
        }
        let size = program.field_size(&field.kind)?;
        let end = field.offset.checked_add(size).ok_or_else(|| bad("overflows"))?;
        if end > ty.size {
            return Err(bad("does not fit in the component"));
        }
        spans.push((field.offset, end, field));
    }

    spans.sort_by_key(|(start, _, _)| *start);
    for pair in spans.windows(2) {
        let (_, prev_end, _) = pair[0];
        let (start, _, field) = pair[1];
        if start < prev_end {
            return Err(ProgramError::BadLayout {
                ty: ty.name.clone(),
                field: field.name.clone(),
                offset: start,
                problem: "overlaps another field",
            });
        }
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq)]
enum Visit {
    Fresh,
    Active,
    Done,
}

fn check_recursion(program: &Program) -> Result<(), ProgramError> {
    let mut state = vec![Visit::Fresh; program.types.len()];
    for id in 0..program.types.len() {
        visit_type(program, id, &mut state)?;
    }
    Ok(())
}

fn visit_type(program: &Program, id: TypeId, state: &mut [Visit]) -> Result<(), ProgramError> {
    match state[id] {
        Visit::Done => return Ok(()),
        Visit::Active => {
            return Err(ProgramError::RecursiveComponent(
                program.types[id].name.clone(),
            ));
        }
        Visit::Fresh => {}
    }
    state[id] = Visit::Active;
    for field in &program.types[id].fields {
        if let FieldKind::Component(name) = &field.kind {
            let (child, _) = program.type_named(name)?;
            visit_type(program, child, state)?;
        }
    }
    state[id] = Visit::Done;
    Ok(())
}

fn check_members(program: &Program, ty: &ComponentType) -> Result<(), ProgramError> {
    for action in &ty.actions {
        check_triggers(program, ty, &action.triggers)?;
        let mut builtins = Vec::new();
        action.precondition.visit_builtins(&mut |name| builtins.push(name));
        check_body(ty, &action.body, &action.triggers, builtins)?;
    }
    for reaction in &ty.reactions {
        check_triggers(program, ty, &reaction.triggers)?;
        check_body(ty, &reaction.body, &reaction.triggers, Vec::new())?;
    }
    Ok(())
}

fn check_triggers(
    program: &Program,
    owner: &ComponentType,
    groups: &[TriggerGroup],
) -> Result<(), ProgramError> {
    for group in groups {
        for trigger in &group.triggers {
            let target = resolve_path(program, owner, &trigger.path)?;
            for field in &trigger.fields {
                target.field_named(field)?;
            }
        }
    }
    Ok(())
}

/// Follows a chain of component-typed fields starting at `owner`.
pub fn resolve_path<'p>(
    program: &'p Program,
    owner: &'p ComponentType,
    path: &[String],
) -> Result<&'p ComponentType, ProgramError> {
    let mut current = owner;
    for step in path {
        let (_, field) = current.field_named(step)?;
        current = match &field.kind {
            FieldKind::Component(name) => program.type_named(name)?.1,
            _ => {
                return Err(ProgramError::Unresolved {
                    ty: current.name.clone(),
                    what: "component field",
                    name: step.clone(),
                });
            }
        };
    }
    Ok(current)
}

/// Checks builtins and port calls of a body. A port may only be called when
/// one of the member's own triggers names it.
fn check_body<'a>(
    ty: &ComponentType,
    body: &'a [Stmt],
    groups: &[TriggerGroup],
    mut builtins: Vec<&'a str>,
) -> Result<(), ProgramError> {
    let mut ports = Vec::new();
    Stmt::walk(
        body,
        &mut |expr| expr.visit_builtins(&mut |name| builtins.push(name)),
        &mut |call| ports.push(call.port.as_str()),
    );

    for name in builtins {
        if get_builtin(name).is_none() {
            return Err(ProgramError::UnknownBuiltin(name.to_string()));
        }
    }
    for port in ports {
        let is_port = ty.field_id(port).is_some_and(|id| ty.is_output(id));
        if !is_port {
            return Err(ProgramError::Unresolved {
                ty: ty.name.clone(),
                what: "output port",
                name: port.to_string(),
            });
        }
        let declared = groups
            .iter()
            .flat_map(|group| &group.triggers)
            .any(|trigger| trigger.path.is_empty() && trigger.fields.iter().any(|f| f == port));
        if !declared {
            return Err(ProgramError::Unresolved {
                ty: ty.name.clone(),
                what: "trigger for port",
                name: port.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{Field, ScalarType};

    fn component(name: &str, size: u64, fields: Vec<Field>) -> ComponentType {
        ComponentType {
            name: name.to_string(),
            size,
            fields,
            actions: Vec::new(),
            reactions: Vec::new(),
            bindings: Vec::new(),
        }
    }

    fn field(name: &str, offset: u64, kind: FieldKind) -> Field {
        Field {
            name: name.to_string(),
            offset,
            kind,
        }
    }

    fn program(types: Vec<ComponentType>) -> Program {
        Program {
            types,
            instances: Vec::new(),
            bindings: Vec::new(),
        }
    }

    #[test]
    fn accepts_nested_layout() {
        let inner = component(
            "Inner",
            8,
            vec![field("x", 0, FieldKind::Scalar(ScalarType::Int))],
        );
        let outer = component(
            "Outer",
            24,
            vec![
                field("a", 0, FieldKind::Scalar(ScalarType::Int)),
                field("inner", 8, FieldKind::Component("Inner".into())),
                field("out", 16, FieldKind::Output(vec![ScalarType::Int])),
            ],
        );
        assert!(program(vec![inner, outer]).validate().is_ok());
    }

    #[test]
    fn rejects_misaligned_and_overlapping_fields() {
        let misaligned = component(
            "A",
            16,
            vec![field("x", 4, FieldKind::Scalar(ScalarType::Int))],
        );
        let err = program(vec![misaligned]).validate().unwrap_err();
        assert!(matches!(err, ProgramError::BadLayout { problem: "is not word aligned", .. }));

        let overlapping = component(
            "B",
            16,
            vec![
                field("x", 8, FieldKind::Scalar(ScalarType::Int)),
                field("y", 8, FieldKind::Scalar(ScalarType::Int)),
            ],
        );
        let err = program(vec![overlapping]).validate().unwrap_err();
        assert!(matches!(err, ProgramError::BadLayout { problem: "overlaps another field", .. }));
    }

    #[test]
    fn rejects_recursive_components() {
        let a = component(
            "A",
            8,
            vec![field("b", 0, FieldKind::Component("B".into()))],
        );
        let b = component(
            "B",
            8,
            vec![field("a", 0, FieldKind::Component("A".into()))],
        );
        let err = program(vec![a, b]).validate().unwrap_err();
        assert!(matches!(err, ProgramError::RecursiveComponent(_)));
    }

    #[test]
    fn rejects_duplicate_type_names() {
        let err = program(vec![component("A", 0, vec![]), component("A", 0, vec![])])
            .validate()
            .unwrap_err();
        assert!(matches!(err, ProgramError::Duplicate(name) if name == "A"));
    }
}
