//! Shared diagnostic collection for the placement flow.

use crate::diagnostic::Diagnostic;
use crate::severity::Severity;
use std::sync::Mutex;

/// Collects every diagnostic of one placement run.
///
/// A single sink is shared across the whole flow, including the
/// data-parallel phases, so workers emit into it directly. Alongside the
/// diagnostics themselves it folds a running summary (worst level seen,
/// per-level counts). The summary survives [`drain`](Self::drain), so
/// the end of the flow can still decide an exit status after logs have
/// been flushed incrementally.
pub struct DiagnosticSink {
    state: Mutex<SinkState>,
}

#[derive(Default)]
struct SinkState {
    entries: Vec<Diagnostic>,
    worst: Option<Severity>,
    notes: usize,
    warnings: usize,
    errors: usize,
}

impl DiagnosticSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SinkState::default()),
        }
    }

    /// Records a diagnostic and folds it into the running summary.
    pub fn emit(&self, diag: Diagnostic) {
        let mut state = self.state.lock().unwrap();
        state.worst = Some(match state.worst {
            Some(worst) => worst.worst(diag.severity),
            None => diag.severity,
        });
        match diag.severity {
            Severity::Note => state.notes += 1,
            Severity::Warning => state.warnings += 1,
            Severity::Error => state.errors += 1,
        }
        state.entries.push(diag);
    }

    /// The most severe level emitted so far, `None` on a fresh sink.
    pub fn worst(&self) -> Option<Severity> {
        self.state.lock().unwrap().worst
    }

    /// Returns `true` once any error-severity diagnostic was emitted.
    pub fn has_errors(&self) -> bool {
        self.worst() == Some(Severity::Error)
    }

    /// How many diagnostics of `severity` were emitted, drained or not.
    pub fn count(&self, severity: Severity) -> usize {
        let state = self.state.lock().unwrap();
        match severity {
            Severity::Note => state.notes,
            Severity::Warning => state.warnings,
            Severity::Error => state.errors,
        }
    }

    /// Snapshot of the diagnostics currently held.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.state.lock().unwrap().entries.clone()
    }

    /// Removes and returns the held diagnostics.
    ///
    /// The running summary keeps counting what was already seen.
    pub fn drain(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.state.lock().unwrap().entries)
    }
}

impl Default for DiagnosticSink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{DiagnosticCode, Stage};

    fn note() -> Diagnostic {
        Diagnostic::note(DiagnosticCode::new(Stage::GlobalPlacement, 1), "HPWL = 10.0")
    }

    fn warning() -> Diagnostic {
        Diagnostic::warning(
            DiagnosticCode::new(Stage::Packing, 2),
            "no feasible site for unit 3",
        )
    }

    fn error() -> Diagnostic {
        Diagnostic::error(DiagnosticCode::new(Stage::Timing, 3), "combinational loop")
    }

    #[test]
    fn fresh_sink_has_no_worst() {
        let sink = DiagnosticSink::new();
        assert_eq!(sink.worst(), None);
        assert!(!sink.has_errors());
        assert!(sink.diagnostics().is_empty());
    }

    #[test]
    fn summary_counts_per_level() {
        let sink = DiagnosticSink::new();
        sink.emit(note());
        sink.emit(note());
        sink.emit(warning());
        assert_eq!(sink.count(Severity::Note), 2);
        assert_eq!(sink.count(Severity::Warning), 1);
        assert_eq!(sink.count(Severity::Error), 0);
        assert_eq!(sink.diagnostics().len(), 3);
    }

    #[test]
    fn worst_escalates_and_sticks() {
        let sink = DiagnosticSink::new();
        sink.emit(note());
        assert_eq!(sink.worst(), Some(Severity::Note));
        sink.emit(error());
        assert!(sink.has_errors());
        // later, milder diagnostics do not wash the error out
        sink.emit(warning());
        assert_eq!(sink.worst(), Some(Severity::Error));
    }

    #[test]
    fn drain_keeps_the_summary() {
        let sink = DiagnosticSink::new();
        sink.emit(warning());
        sink.emit(error());

        let flushed = sink.drain();
        assert_eq!(flushed.len(), 2);
        assert!(sink.diagnostics().is_empty());
        assert!(sink.drain().is_empty());

        // the exit-status decision still works after flushing
        assert!(sink.has_errors());
        assert_eq!(sink.count(Severity::Warning), 1);
    }

    #[test]
    fn workers_share_one_sink() {
        let sink = DiagnosticSink::new();
        std::thread::scope(|scope| {
            for worker in 0..4 {
                let sink = &sink;
                scope.spawn(move || {
                    for _ in 0..3 {
                        sink.emit(note());
                    }
                    sink.emit(warning());
                    if worker == 0 {
                        sink.emit(error());
                    }
                });
            }
        });
        assert_eq!(sink.count(Severity::Note), 12);
        assert_eq!(sink.count(Severity::Warning), 4);
        assert_eq!(sink.count(Severity::Error), 1);
        assert_eq!(sink.diagnostics().len(), 17);
        assert_eq!(sink.worst(), Some(Severity::Error));
    }
}
