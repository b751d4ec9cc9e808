//! Diagnostic codes tied to the placement pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The pipeline stage a diagnostic originates from.
///
/// Codes are grouped by emitting stage rather than by severity: every
/// stage produces notes, warnings, and errors alike, and the stage tag
/// is what a user greps for in a long placement log.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Stage {
    /// Placement model construction and consistency checks.
    Model,
    /// Global placement: seeding, solving, spreading, macro legalization.
    GlobalPlacement,
    /// Timing graph, analysis, and optimization.
    Timing,
    /// Final site packing.
    Packing,
    /// Checkpoints and dump sinks.
    Dump,
}

impl Stage {
    /// The log tag of this stage.
    pub fn tag(self) -> &'static str {
        match self {
            Stage::Model => "model",
            Stage::GlobalPlacement => "place",
            Stage::Timing => "timing",
            Stage::Packing => "pack",
            Stage::Dump => "dump",
        }
    }
}

/// A diagnostic code: the emitting stage plus an index unique within it.
///
/// Rendered as `<tag>-<index>`, e.g. `place-05` or `timing-12`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct DiagnosticCode {
    /// The stage that emitted the diagnostic.
    pub stage: Stage,
    /// Index of the diagnostic within its stage.
    pub index: u16,
}

impl DiagnosticCode {
    /// Creates a code for `stage` with the given index.
    pub const fn new(stage: Stage, index: u16) -> Self {
        Self { stage, index }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.stage.tag(), self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STAGES: [Stage; 5] = [
        Stage::Model,
        Stage::GlobalPlacement,
        Stage::Timing,
        Stage::Packing,
        Stage::Dump,
    ];

    #[test]
    fn tags_are_grep_friendly() {
        let mut seen = std::collections::HashSet::new();
        for stage in ALL_STAGES {
            let tag = stage.tag();
            assert!(!tag.is_empty());
            assert!(tag.chars().all(|c| c.is_ascii_lowercase()));
            assert!(seen.insert(tag), "duplicate tag {tag}");
        }
    }

    #[test]
    fn rendered_code_combines_tag_and_index() {
        assert_eq!(
            format!("{}", DiagnosticCode::new(Stage::GlobalPlacement, 5)),
            "place-05"
        );
        assert_eq!(format!("{}", DiagnosticCode::new(Stage::Timing, 12)), "timing-12");
        assert_eq!(format!("{}", DiagnosticCode::new(Stage::Dump, 101)), "dump-101");
    }

    #[test]
    fn codes_distinguish_stage_and_index() {
        let a = DiagnosticCode::new(Stage::Packing, 3);
        assert_eq!(a, DiagnosticCode::new(Stage::Packing, 3));
        assert_ne!(a, DiagnosticCode::new(Stage::Packing, 4));
        assert_ne!(a, DiagnosticCode::new(Stage::Model, 3));
    }

    #[test]
    fn code_survives_serialization() {
        let code = DiagnosticCode::new(Stage::Model, 42);
        let json = serde_json::to_string(&code).unwrap();
        let restored: DiagnosticCode = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, code);
        assert_eq!(format!("{restored}"), "model-42");
    }
}
