use thiserror::Error;

/// Failure taxonomy for the control loop and its collaborators.
///
/// Only `Configuration` and `Capture` are fatal: the first aborts the
/// process before the loop starts, the second stops the current run.
/// Everything else is recovered locally by the loop.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Screen capture failed: {0}")]
    Capture(String),

    #[error("Upstream rate limited (retry after {retry_after:?}s)")]
    UpstreamThrottled { retry_after: Option<f64> },

    #[error("Upstream model failure: {0}")]
    Upstream(String),

    #[error("Input synthesis failed: {0}")]
    InputSynthesis(String),

    #[error("No credential available: {0}")]
    NoCredential(String),
}
