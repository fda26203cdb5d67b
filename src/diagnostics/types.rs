//! Error code types for the diagnostics system

/// Phase in which an error was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    Program,
    Composition,
    Runtime,
}

impl ErrorType {
    /// Returns the prefix string used in error headers
    pub fn prefix(&self) -> &'static str {
        match self {
            ErrorType::Program => "Program error",
            ErrorType::Composition => "Composition error",
            ErrorType::Runtime => "Runtime error",
        }
    }
}

/// Error code with message template and optional hint
#[derive(Debug, Clone, Copy)]
pub struct ErrorCode {
    pub code: &'static str,
    pub title: &'static str,
    pub error_type: ErrorType,
    pub message: &'static str,
    pub hint: Option<&'static str>,
}
