//! Diagnostics module.
//!
//! Every fatal condition the runtime can report carries a stable error code.
//! Codes are grouped by phase: `E1xxx` program description, `E2xxx`
//! composition analysis, `E3xxx` execution.

pub mod codes;
pub mod diagnostic;
pub mod format;
pub mod types;

pub use codes::*;
pub use diagnostic::Diagnostic;
pub use format::format_message;
pub use types::{ErrorCode, ErrorType};
