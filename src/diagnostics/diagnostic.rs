use std::env;

use super::{ErrorCode, ErrorType, format_message};

/// A rendered-on-demand report for one fatal condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub title: String,
    pub code: String,
    pub error_type: ErrorType,
    pub message: String,
    pub hints: Vec<String>,
}

impl Diagnostic {
    /// Builds a diagnostic from an error code, filling `{}` placeholders in
    /// the message and hint templates with `values`.
    pub fn make_error(spec: &'static ErrorCode, values: &[&str]) -> Self {
        let mut hints = Vec::new();
        if let Some(hint) = spec.hint {
            hints.push(format_message(hint, values));
        }
        Self {
            title: spec.title.to_string(),
            code: spec.code.to_string(),
            error_type: spec.error_type,
            message: format_message(spec.message, values),
            hints,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }

    /// Renders with ANSI color unless `NO_COLOR` is set.
    pub fn render(&self) -> String {
        self.render_with(env::var_os("NO_COLOR").is_none())
    }

    pub fn render_plain(&self) -> String {
        self.render_with(false)
    }

    fn render_with(&self, use_color: bool) -> String {
        let yellow = "\u{1b}[33m";
        let reset = "\u{1b}[0m";
        let mut out = String::new();

        // Header: -- Composition error: firing cycle [E2001]
        if use_color {
            out.push_str(yellow);
        }
        out.push_str(&format!(
            "-- {}: {} [{}]",
            self.error_type.prefix(),
            self.title.to_lowercase(),
            self.code
        ));
        if use_color {
            out.push_str(reset);
        }
        out.push('\n');

        out.push('\n');
        out.push_str(&self.message);
        out.push('\n');

        if !self.hints.is_empty() {
            out.push_str("\nHint:\n");
            for hint in &self.hints {
                out.push_str("  ");
                out.push_str(hint);
                out.push('\n');
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{FIRING_CYCLE, INDEX_OUT_OF_RANGE};

    #[test]
    fn make_error_fills_placeholders() {
        let diag = Diagnostic::make_error(&FIRING_CYCLE, &["out", "a"]);
        assert_eq!(diag.code, "E2001");
        assert_eq!(
            diag.message,
            "Port `out` of `a` is triggered again while it is already firing."
        );
        assert_eq!(diag.hints.len(), 1);
    }

    #[test]
    fn plain_render_has_header_message_and_no_hint_section_without_hints() {
        let diag =
            Diagnostic::make_error(&INDEX_OUT_OF_RANGE, &["index 4 out of range for length 4"]);
        assert_eq!(
            diag.render_plain(),
            "-- Runtime error: index out of range [E3002]\n\nindex 4 out of range for length 4\n"
        );
    }
}
