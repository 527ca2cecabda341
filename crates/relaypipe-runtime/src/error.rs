use thiserror::Error;

/// Raised when a [`crate::pipeline::Pipeline`] method is called out of turn.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SequenceError {
    #[error("pipeline has already been started")]
    AlreadyStarted,
    #[error("pipeline has not been started yet")]
    NotStarted,
}

/// The error type a stage transform returns on failure.
///
/// A failing transform takes its worker down with it — the original let the
/// exception go uncaught and kill the worker process, and this carries that
/// forward: no trailing flush, no teardown, just a logged error and an early
/// return from the worker's loop.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct TransformError(#[from] pub anyhow::Error);
