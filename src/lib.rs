pub mod diagnostics;
pub mod program;
pub mod runtime;
