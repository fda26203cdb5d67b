//! Program description consumed from the front end.
//!
//! Everything here is already resolved: component layouts carry byte sizes
//! and field offsets, bodies are offset-annotated syntax trees and every
//! action and reaction lists the fields it may touch.

pub mod syntax;
pub mod validate;

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::runtime::error::ProgramError;

pub use syntax::{BinaryOp, Expr, Place, PortCall, Stmt, UnaryOp};

pub type TypeId = usize;
pub type FieldId = usize;
pub type ActionId = usize;
pub type ReactionId = usize;

/// Size in bytes of every scalar and output port field.
pub const WORD_SIZE: u64 = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub types: Vec<ComponentType>,
    pub instances: Vec<InstanceDecl>,
    /// Bindings between top-level instances. Paths start with an instance name.
    #[serde(default)]
    pub bindings: Vec<Binding>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentType {
    pub name: String,
    pub size: u64,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
    /// Bindings between this type's own ports, reactions and sub-instances.
    #[serde(default)]
    pub bindings: Vec<Binding>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub offset: u64,
    pub kind: FieldKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Scalar(ScalarType),
    /// Embedded sub-instance of the named component type.
    Component(String),
    /// Output port with the given parameter list.
    Output(Vec<ScalarType>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    Int,
    Float,
    Bool,
    Pointer,
    Link,
}

impl ScalarType {
    pub fn name(self) -> &'static str {
        match self {
            ScalarType::Int => "Int",
            ScalarType::Float => "Float",
            ScalarType::Bool => "Bool",
            ScalarType::Pointer => "Pointer",
            ScalarType::Link => "Link",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    Read,
    Write,
}

/// Fields of one instance touched with one access mode.
///
/// `path` selects the instance: empty for the owner, otherwise a chain of
/// component-typed fields leading to an embedded sub-instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    #[serde(default)]
    pub path: Vec<String>,
    pub fields: Vec<String>,
    pub mode: AccessMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerGroup {
    pub triggers: Vec<Trigger>,
}

fn always() -> Expr {
    Expr::Bool(true)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub name: String,
    #[serde(default = "always")]
    pub precondition: Expr,
    #[serde(default)]
    pub body: Vec<Stmt>,
    #[serde(default)]
    pub triggers: Vec<TriggerGroup>,
    #[serde(default)]
    pub locals: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    pub name: String,
    #[serde(default)]
    pub params: Vec<ScalarType>,
    #[serde(default)]
    pub body: Vec<Stmt>,
    #[serde(default)]
    pub triggers: Vec<TriggerGroup>,
    #[serde(default)]
    pub locals: usize,
}

/// Static path from an output port to an input reaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub output: Vec<String>,
    pub input: Vec<String>,
}

impl Program {
    pub fn from_json(source: &str) -> Result<Self, ProgramError> {
        let program: Program = serde_json::from_str(source)?;
        program.validate()?;
        Ok(program)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProgramError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| ProgramError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&source)
    }

    pub fn type_id(&self, name: &str) -> Option<TypeId> {
        self.types.iter().position(|ty| ty.name == name)
    }

    pub fn type_named(&self, name: &str) -> Result<(TypeId, &ComponentType), ProgramError> {
        let id = self
            .type_id(name)
            .ok_or_else(|| ProgramError::UnknownType(name.to_string()))?;
        Ok((id, &self.types[id]))
    }
}

impl ComponentType {
    pub fn field_id(&self, name: &str) -> Option<FieldId> {
        self.fields.iter().position(|field| field.name == name)
    }

    pub fn field_named(&self, name: &str) -> Result<(FieldId, &Field), ProgramError> {
        let id = self.field_id(name).ok_or_else(|| ProgramError::Unresolved {
            ty: self.name.clone(),
            what: "field",
            name: name.to_string(),
        })?;
        Ok((id, &self.fields[id]))
    }

    pub fn reaction_id(&self, name: &str) -> Option<ReactionId> {
        self.reactions.iter().position(|reaction| reaction.name == name)
    }

    pub fn is_output(&self, field: FieldId) -> bool {
        matches!(self.fields[field].kind, FieldKind::Output(_))
    }
}
