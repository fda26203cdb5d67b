use std::io;

use thiserror::Error;

use crate::diagnostics::{self, Diagnostic, ErrorCode};

/// Faults raised by a heap when a word does not resolve into its memory.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HeapError {
    #[error("address {0:#x} does not belong to any live object")]
    InvalidAddress(u64),

    #[error("address {0:#x} is not slot aligned")]
    Misaligned(u64),
}

/// Problems in the program description handed over by the front end.
#[derive(Debug, Error)]
pub enum ProgramError {
    #[error("malformed program description: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not read `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("unknown component type `{0}`")]
    UnknownType(String),

    #[error("`{0}` is declared more than once")]
    Duplicate(String),

    #[error("field `{field}` of `{ty}` at offset {offset} {problem}")]
    BadLayout {
        ty: String,
        field: String,
        offset: u64,
        problem: &'static str,
    },

    #[error("component type `{0}` contains itself")]
    RecursiveComponent(String),

    #[error("`{ty}` has no {what} named `{name}`")]
    Unresolved {
        ty: String,
        what: &'static str,
        name: String,
    },

    #[error("no top-level instance named `{0}`")]
    UnknownInstance(String),

    #[error("empty binding path")]
    EmptyPath,

    #[error("port `{port}` cannot be bound to reaction `{reaction}`")]
    SignatureMismatch { port: String, reaction: String },

    #[error("unknown builtin `{0}`")]
    UnknownBuiltin(String),

    #[error("`{called}` was called before `{required}`")]
    OutOfOrder {
        called: &'static str,
        required: &'static str,
    },
}

/// Reasons the composition analyzer refuses a bound network.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompositionError {
    #[error("port `{port}` of `{instance}` is reached again while it is firing")]
    FiringCycle { instance: String, port: String },

    #[error("field `{field}` of `{instance}` is written by two different triggers")]
    WriteConflict { instance: String, field: String },

    #[error("reaction `{reaction}` of `{instance}` is bound more than once")]
    ReactionBoundTwice { instance: String, reaction: String },

    #[error("`{first}` and `{second}` are locked in opposite orders")]
    LockOrderInversion { first: String, second: String },
}

/// Faults raised while interpreting action and reaction bodies.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Heap(#[from] HeapError),

    #[error("division by zero")]
    DivisionByZero,

    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: i64, len: u64 },

    #[error("expected {expected}, got {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("local slot {0} is not defined in this frame")]
    UnknownLocal(usize),

    #[error("change scope opened on a null heap link")]
    NullLink,

    #[error("{name}: {message}")]
    Builtin { name: String, message: String },

    #[error("could not write program output: {0}")]
    Output(#[source] io::Error),

    #[error("could not start worker thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("a worker thread panicked")]
    WorkerPanicked,
}

/// Umbrella error for the start-up sequence and the run.
#[derive(Debug, Error)]
pub enum WeftError {
    #[error(transparent)]
    Program(#[from] ProgramError),

    #[error(transparent)]
    Composition(#[from] CompositionError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl ProgramError {
    pub fn code(&self) -> &'static ErrorCode {
        match self {
            ProgramError::Json(_) | ProgramError::Io { .. } => &diagnostics::MALFORMED_PROGRAM,
            ProgramError::UnknownType(_) => &diagnostics::UNKNOWN_TYPE,
            ProgramError::Duplicate(_) => &diagnostics::DUPLICATE_NAME,
            ProgramError::BadLayout { .. } => &diagnostics::BAD_LAYOUT,
            ProgramError::RecursiveComponent(_) => &diagnostics::RECURSIVE_COMPONENT,
            ProgramError::Unresolved { .. }
            | ProgramError::UnknownInstance(_)
            | ProgramError::EmptyPath => &diagnostics::UNRESOLVED_PATH,
            ProgramError::SignatureMismatch { .. } => &diagnostics::SIGNATURE_MISMATCH,
            ProgramError::UnknownBuiltin(_) => &diagnostics::UNKNOWN_BUILTIN,
            ProgramError::OutOfOrder { .. } => &diagnostics::OUT_OF_ORDER,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let code = self.code();
        match self {
            ProgramError::Json(err) => Diagnostic::make_error(code, &[err.to_string().as_str()]),
            ProgramError::Io { .. } => Diagnostic::make_error(code, &[self.to_string().as_str()]),
            ProgramError::UnknownType(name)
            | ProgramError::Duplicate(name)
            | ProgramError::RecursiveComponent(name)
            | ProgramError::UnknownBuiltin(name) => Diagnostic::make_error(code, &[name.as_str()]),
            ProgramError::SignatureMismatch { port, reaction } => {
                Diagnostic::make_error(code, &[port.as_str(), reaction.as_str()])
            }
            ProgramError::OutOfOrder { called, required } => {
                Diagnostic::make_error(code, &[*called, *required])
            }
            ProgramError::BadLayout { .. }
            | ProgramError::Unresolved { .. }
            | ProgramError::UnknownInstance(_)
            | ProgramError::EmptyPath => Diagnostic::make_error(code, &[self.to_string().as_str()]),
        }
    }
}

impl CompositionError {
    pub fn code(&self) -> &'static ErrorCode {
        match self {
            CompositionError::FiringCycle { .. } => &diagnostics::FIRING_CYCLE,
            CompositionError::WriteConflict { .. } => &diagnostics::WRITE_CONFLICT,
            CompositionError::ReactionBoundTwice { .. } => &diagnostics::REACTION_BOUND_TWICE,
            CompositionError::LockOrderInversion { .. } => &diagnostics::LOCK_ORDER_INVERSION,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let code = self.code();
        match self {
            CompositionError::FiringCycle { instance, port } => {
                Diagnostic::make_error(code, &[port.as_str(), instance.as_str()])
            }
            CompositionError::WriteConflict { instance, field } => {
                Diagnostic::make_error(code, &[field.as_str(), instance.as_str()])
            }
            CompositionError::ReactionBoundTwice { instance, reaction } => {
                Diagnostic::make_error(code, &[reaction.as_str(), instance.as_str()])
            }
            CompositionError::LockOrderInversion { first, second } => {
                Diagnostic::make_error(code, &[first.as_str(), second.as_str()])
            }
        }
    }
}

impl RuntimeError {
    pub fn code(&self) -> &'static ErrorCode {
        match self {
            RuntimeError::Heap(_) => &diagnostics::INVALID_MEMORY_ACCESS,
            RuntimeError::DivisionByZero => &diagnostics::DIVISION_BY_ZERO,
            RuntimeError::IndexOutOfRange { .. } => &diagnostics::INDEX_OUT_OF_RANGE,
            RuntimeError::TypeMismatch { .. } | RuntimeError::UnknownLocal(_) => {
                &diagnostics::RUNTIME_TYPE_ERROR
            }
            RuntimeError::NullLink => &diagnostics::NULL_LINK,
            RuntimeError::Builtin { .. } | RuntimeError::Output(_) => &diagnostics::BUILTIN_ERROR,
            RuntimeError::Spawn(_) | RuntimeError::WorkerPanicked => &diagnostics::WORKER_FAILURE,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let code = self.code();
        match self {
            RuntimeError::DivisionByZero | RuntimeError::NullLink => {
                Diagnostic::make_error(code, &[])
            }
            _ => Diagnostic::make_error(code, &[self.to_string().as_str()]),
        }
    }
}

impl WeftError {
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            WeftError::Program(err) => err.to_diagnostic(),
            WeftError::Composition(err) => err.to_diagnostic(),
            WeftError::Runtime(err) => err.to_diagnostic(),
        }
    }
}
