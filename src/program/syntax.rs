use serde::{Deserialize, Serialize};

use crate::program::ScalarType;

/// Expression tree with every field access already lowered to an offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Null,
    Local(usize),
    Load {
        place: Place,
        ty: ScalarType,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Allocates `size` zeroed bytes in the active heap.
    New {
        size: u64,
    },
    /// Allocates a new sub-heap whose root object holds `size` bytes.
    NewHeap {
        size: u64,
    },
    Move(Box<Expr>),
    Merge(Box<Expr>),
    Builtin {
        name: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
}

/// A memory location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Place {
    /// Field of the executing instance, relative to its base address.
    SelfField { offset: u64 },
    /// `offset` bytes past the address held by `pointer`.
    Deref { pointer: Box<Expr>, offset: u64 },
    /// Element `index` of a `len`-element array at `pointer`, each element
    /// `stride` bytes wide, then `offset` bytes into that element.
    Index {
        pointer: Box<Expr>,
        index: Box<Expr>,
        len: u64,
        stride: u64,
        #[serde(default)]
        offset: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortCall {
    pub port: String,
    #[serde(default)]
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stmt {
    SetLocal {
        slot: usize,
        value: Expr,
    },
    Store {
        place: Place,
        ty: ScalarType,
        value: Expr,
    },
    If {
        cond: Expr,
        then: Vec<Stmt>,
        #[serde(default)]
        otherwise: Vec<Stmt>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    Expr(Expr),
    Println(Vec<Expr>),
    Call(PortCall),
    /// Calls `calls` now and defers `body` to the mutable phase of the
    /// current firing.
    Trigger {
        #[serde(default)]
        calls: Vec<PortCall>,
        #[serde(default)]
        body: Vec<Stmt>,
    },
    /// Runs `body` with the link's heap as the active heap and its root
    /// address in local `root`.
    Change {
        link: Expr,
        root: usize,
        body: Vec<Stmt>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl Expr {
    pub fn int(value: i64) -> Self {
        Expr::Int(value)
    }

    pub fn local(slot: usize) -> Self {
        Expr::Local(slot)
    }

    pub fn field(offset: u64, ty: ScalarType) -> Self {
        Expr::Load {
            place: Place::SelfField { offset },
            ty,
        }
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Calls `f` on every builtin name used in this expression.
    pub fn visit_builtins<'a>(&'a self, f: &mut dyn FnMut(&'a str)) {
        match self {
            Expr::Load { place, .. } => place.visit_builtins(f),
            Expr::Unary { operand, .. } => operand.visit_builtins(f),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.visit_builtins(f);
                rhs.visit_builtins(f);
            }
            Expr::Move(inner) | Expr::Merge(inner) => inner.visit_builtins(f),
            Expr::Builtin { name, args } => {
                f(name);
                for arg in args {
                    arg.visit_builtins(f);
                }
            }
            Expr::Int(_)
            | Expr::Float(_)
            | Expr::Bool(_)
            | Expr::Str(_)
            | Expr::Null
            | Expr::Local(_)
            | Expr::New { .. }
            | Expr::NewHeap { .. } => {}
        }
    }
}

impl Place {
    fn visit_builtins<'a>(&'a self, f: &mut dyn FnMut(&'a str)) {
        match self {
            Place::SelfField { .. } => {}
            Place::Deref { pointer, .. } => pointer.visit_builtins(f),
            Place::Index { pointer, index, .. } => {
                pointer.visit_builtins(f);
                index.visit_builtins(f);
            }
        }
    }
}

impl Stmt {
    pub fn kind(&self) -> &'static str {
        match self {
            Stmt::SetLocal { .. } => "set_local",
            Stmt::Store { .. } => "store",
            Stmt::If { .. } => "if",
            Stmt::While { .. } => "while",
            Stmt::Expr(_) => "expr",
            Stmt::Println(_) => "println",
            Stmt::Call(_) => "call",
            Stmt::Trigger { .. } => "trigger",
            Stmt::Change { .. } => "change",
        }
    }

    pub fn store_field(offset: u64, ty: ScalarType, value: Expr) -> Self {
        Stmt::Store {
            place: Place::SelfField { offset },
            ty,
            value,
        }
    }

    /// Walks every expression and every port call of a statement list.
    pub fn walk<'a>(
        body: &'a [Stmt],
        on_expr: &mut dyn FnMut(&'a Expr),
        on_call: &mut dyn FnMut(&'a PortCall),
    ) {
        for stmt in body {
            match stmt {
                Stmt::SetLocal { value, .. } | Stmt::Expr(value) => on_expr(value),
                Stmt::Store { place, value, .. } => {
                    on_expr(value);
                    match place {
                        Place::SelfField { .. } => {}
                        Place::Deref { pointer, .. } => on_expr(pointer),
                        Place::Index { pointer, index, .. } => {
                            on_expr(pointer);
                            on_expr(index);
                        }
                    }
                }
                Stmt::If {
                    cond,
                    then,
                    otherwise,
                } => {
                    on_expr(cond);
                    Stmt::walk(then, on_expr, on_call);
                    Stmt::walk(otherwise, on_expr, on_call);
                }
                Stmt::While { cond, body } => {
                    on_expr(cond);
                    Stmt::walk(body, on_expr, on_call);
                }
                Stmt::Println(args) => {
                    for arg in args {
                        on_expr(arg);
                    }
                }
                Stmt::Call(call) => {
                    on_call(call);
                    for arg in &call.args {
                        on_expr(arg);
                    }
                }
                Stmt::Trigger { calls, body } => {
                    for call in calls {
                        on_call(call);
                        for arg in &call.args {
                            on_expr(arg);
                        }
                    }
                    Stmt::walk(body, on_expr, on_call);
                }
                Stmt::Change { link, body, .. } => {
                    on_expr(link);
                    Stmt::walk(body, on_expr, on_call);
                }
            }
        }
    }
}
