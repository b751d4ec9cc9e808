//! Severity levels for placer diagnostics.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How serious a diagnostic is.
///
/// Most placement problems degrade instead of aborting, so the flow
/// keeps going past warnings and treats only design-level
/// contradictions as errors. The derived ordering ranks
/// `Note < Warning < Error`, which lets the worst level seen be folded
/// over an entire run with [`worst`](Severity::worst).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum Severity {
    /// A status line: phase banners, HPWL milestones, statistics.
    Note,
    /// A condition the flow recovers from but the user should review.
    Warning,
    /// A definite problem for the affected entity; placement may still
    /// continue for the rest of the design.
    Error,
}

impl Severity {
    /// Returns `true` for [`Error`](Severity::Error).
    pub fn is_error(self) -> bool {
        matches!(self, Severity::Error)
    }

    /// Folds two levels into the more severe one.
    pub fn worst(self, other: Severity) -> Severity {
        self.max(other)
    }

    /// The label prefixed to rendered status lines.
    pub fn label(self) -> &'static str {
        match self {
            Severity::Note => "note",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
