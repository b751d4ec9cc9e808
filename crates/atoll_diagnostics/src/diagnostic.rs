//! Structured diagnostic messages with severity, codes, and notes.

use crate::code::DiagnosticCode;
use crate::severity::Severity;
use serde::{Deserialize, Serialize};

/// A structured diagnostic message.
///
/// Diagnostics are the only reporting mechanism of the placer. Each carries
/// a severity, a unique code, the primary message, and optional footnotes.
/// The placer has no source text, so diagnostics name design and device
/// entities (cells, macros, sites) directly in the message.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity level of this diagnostic.
    pub severity: Severity,
    /// The unique code identifying the type of diagnostic.
    pub code: DiagnosticCode,
    /// The main diagnostic message.
    pub message: String,
    /// Explanatory footnotes (e.g., per-cell detail lines).
    pub notes: Vec<String>,
}

impl Diagnostic {
    /// Creates a new error diagnostic with the given code and message.
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
            notes: Vec::new(),
        }
    }

    /// Creates a new warning diagnostic with the given code and message.
    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
            notes: Vec::new(),
        }
    }

    /// Creates a new status-line note with the given code and message.
    pub fn note(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Note,
            code,
            message: message.into(),
            notes: Vec::new(),
        }
    }

    /// Adds a footnote to this diagnostic.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::Stage;

    #[test]
    fn create_error() {
        let code = DiagnosticCode::new(Stage::Timing, 101);
        let diag = Diagnostic::error(code, "combinational loop detected");
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.message, "combinational loop detected");
        assert_eq!(format!("{}", diag.code), "timing-101");
    }

    #[test]
    fn create_warning() {
        let code = DiagnosticCode::new(Stage::GlobalPlacement, 20);
        let diag = Diagnostic::warning(code, "macro never legalized");
        assert_eq!(diag.severity, Severity::Warning);
        assert_eq!(diag.message, "macro never legalized");
    }

    #[test]
    fn create_note() {
        let code = DiagnosticCode::new(Stage::GlobalPlacement, 1);
        let diag = Diagnostic::note(code, "current total HPWL = 1234.5");
        assert_eq!(diag.severity, Severity::Note);
    }

    #[test]
    fn builder_notes() {
        let code = DiagnosticCode::new(Stage::Timing, 102);
        let diag = Diagnostic::error(code, "loop")
            .with_note("cell_a")
            .with_note("cell_b");
        assert_eq!(diag.notes.len(), 2);
        assert_eq!(diag.notes[0], "cell_a");
    }

    #[test]
    fn serde_roundtrip() {
        let code = DiagnosticCode::new(Stage::Packing, 7);
        let diag = Diagnostic::warning(code, "unpackable unit").with_note("pu 42");
        let json = serde_json::to_string(&diag).unwrap();
        let restored: Diagnostic = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.message, "unpackable unit");
        assert_eq!(restored.notes.len(), 1);
    }
}
