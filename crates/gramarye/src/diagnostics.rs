//! Collected, severity-tagged findings with source spans.

use std::fmt;

use gramarye_core::syntax::line_col;
use rowan::TextRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub range: TextRange,
}

#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    messages: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, message: impl Into<String>, range: TextRange) {
        self.messages.push(Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            range,
        });
    }

    pub fn warning(&mut self, message: impl Into<String>, range: TextRange) {
        self.messages.push(Diagnostic {
            severity: Severity::Warning,
            message: message.into(),
            range,
        });
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.messages.extend(other.messages);
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn error_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.messages.iter()
    }

    /// Renders every message as `severity(line:col): text`, one per line.
    pub fn render(&self, source: &str) -> String {
        let mut out = String::new();
        for message in &self.messages {
            let (line, col) = line_col(source, message.range.start());
            let severity = match message.severity {
                Severity::Error => "error",
                Severity::Warning => "warning",
            };
            out.push_str(&format!(
                "{severity}({}:{}): {}\n",
                line + 1,
                col + 1,
                message.message
            ));
        }
        out
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}
