//! Result plumbing for the placement flow.
//!
//! Almost nothing in the placer is allowed to fail hard. Recoverable
//! conditions (an unlegalized macro, an unpackable unit, a failed dump)
//! are reported through the diagnostic sink and the operation still
//! returns `Ok`. The run only aborts on design-level contradictions and
//! setup failures: a combinational loop, a design whose demand exceeds
//! the device, a worker pool that cannot start. Those surface as an
//! [`AbortError`] naming the stage that gave up.

/// The result type of operations that may abort the placement run.
pub type AtollResult<T> = Result<T, AbortError>;

/// A hard failure that ends the placement run.
///
/// Carries the pipeline stage that gave up alongside the reason, so a
/// caller embedding the placer can report where a run died without
/// parsing the message.
#[derive(Debug, thiserror::Error)]
#[error("placement aborted during {stage}: {reason}")]
pub struct AbortError {
    /// The pipeline stage that gave up.
    pub stage: &'static str,
    /// What made continuing impossible.
    pub reason: String,
}

impl AbortError {
    /// Creates an abort raised by `stage`.
    pub fn in_stage(stage: &'static str, reason: impl Into<String>) -> Self {
        Self {
            stage,
            reason: reason.into(),
        }
    }
}
