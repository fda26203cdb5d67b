use super::types::{ErrorCode, ErrorType};

pub const MALFORMED_PROGRAM: ErrorCode = ErrorCode {
    code: "E1000",
    title: "MALFORMED PROGRAM",
    error_type: ErrorType::Program,
    message: "The program description could not be read: {}",
    hint: Some("The runtime expects the JSON emitted by the front end."),
};

pub const UNKNOWN_TYPE: ErrorCode = ErrorCode {
    code: "E1001",
    title: "UNKNOWN COMPONENT TYPE",
    error_type: ErrorType::Program,
    message: "I can't find a component type named `{}`.",
    hint: None,
};

pub const DUPLICATE_NAME: ErrorCode = ErrorCode {
    code: "E1002",
    title: "DUPLICATE NAME",
    error_type: ErrorType::Program,
    message: "`{}` is declared more than once.",
    hint: None,
};

pub const BAD_LAYOUT: ErrorCode = ErrorCode {
    code: "E1003",
    title: "BAD LAYOUT",
    error_type: ErrorType::Program,
    message: "{}",
    hint: Some("Fields must be 8-byte aligned and fit inside the component size."),
};

pub const RECURSIVE_COMPONENT: ErrorCode = ErrorCode {
    code: "E1004",
    title: "RECURSIVE COMPONENT",
    error_type: ErrorType::Program,
    message: "Component type `{}` contains itself.",
    hint: Some("Embedded components must form a tree."),
};

pub const UNRESOLVED_PATH: ErrorCode = ErrorCode {
    code: "E1005",
    title: "UNRESOLVED PATH",
    error_type: ErrorType::Program,
    message: "{}",
    hint: None,
};

pub const SIGNATURE_MISMATCH: ErrorCode = ErrorCode {
    code: "E1006",
    title: "SIGNATURE MISMATCH",
    error_type: ErrorType::Program,
    message: "Port `{}` cannot be bound to reaction `{}`: parameter lists differ.",
    hint: None,
};

pub const UNKNOWN_BUILTIN: ErrorCode = ErrorCode {
    code: "E1007",
    title: "UNKNOWN BUILTIN",
    error_type: ErrorType::Program,
    message: "There is no builtin named `{}`.",
    hint: None,
};

pub const OUT_OF_ORDER: ErrorCode = ErrorCode {
    code: "E1008",
    title: "OUT OF ORDER",
    error_type: ErrorType::Program,
    message: "`{}` was called before `{}`.",
    hint: Some("Call allocate_instances, create_bindings, analyze_composition, then run."),
};

pub const FIRING_CYCLE: ErrorCode = ErrorCode {
    code: "E2001",
    title: "FIRING CYCLE",
    error_type: ErrorType::Composition,
    message: "Port `{}` of `{}` is triggered again while it is already firing.",
    hint: Some("A firing may not reach the same port twice through its bindings."),
};

pub const WRITE_CONFLICT: ErrorCode = ErrorCode {
    code: "E2002",
    title: "WRITE CONFLICT",
    error_type: ErrorType::Composition,
    message: "Field `{}` of `{}` is written by two different triggers.",
    hint: Some("Only one trigger may declare write access to a field."),
};

pub const REACTION_BOUND_TWICE: ErrorCode = ErrorCode {
    code: "E2003",
    title: "REACTION BOUND TWICE",
    error_type: ErrorType::Composition,
    message: "Reaction `{}` of `{}` is the target of more than one binding.",
    hint: None,
};

pub const LOCK_ORDER_INVERSION: ErrorCode = ErrorCode {
    code: "E2004",
    title: "LOCK ORDER INVERSION",
    error_type: ErrorType::Composition,
    message: "`{}` and `{}` are locked in opposite orders by different actions.",
    hint: Some("Two firings that lock the same instances must agree on their order."),
};

pub const DIVISION_BY_ZERO: ErrorCode = ErrorCode {
    code: "E3001",
    title: "DIVISION BY ZERO",
    error_type: ErrorType::Runtime,
    message: "Cannot divide by zero.",
    hint: None,
};

pub const INDEX_OUT_OF_RANGE: ErrorCode = ErrorCode {
    code: "E3002",
    title: "INDEX OUT OF RANGE",
    error_type: ErrorType::Runtime,
    message: "{}",
    hint: None,
};

pub const INVALID_MEMORY_ACCESS: ErrorCode = ErrorCode {
    code: "E3003",
    title: "INVALID MEMORY ACCESS",
    error_type: ErrorType::Runtime,
    message: "{}",
    hint: None,
};

pub const RUNTIME_TYPE_ERROR: ErrorCode = ErrorCode {
    code: "E3004",
    title: "TYPE ERROR",
    error_type: ErrorType::Runtime,
    message: "{}",
    hint: None,
};

pub const NULL_LINK: ErrorCode = ErrorCode {
    code: "E3005",
    title: "NULL HEAP LINK",
    error_type: ErrorType::Runtime,
    message: "A change scope was opened on a heap link that was moved or merged.",
    hint: None,
};

pub const BUILTIN_ERROR: ErrorCode = ErrorCode {
    code: "E3006",
    title: "BUILTIN FUNCTION ERROR",
    error_type: ErrorType::Runtime,
    message: "{}",
    hint: None,
};

pub const WORKER_FAILURE: ErrorCode = ErrorCode {
    code: "E3007",
    title: "WORKER FAILURE",
    error_type: ErrorType::Runtime,
    message: "{}",
    hint: None,
};
