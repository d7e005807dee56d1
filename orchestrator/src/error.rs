//! Error types for the end-to-end orchestrator.

use {std::time::Duration, thiserror::Error};

/// Errors that can abort an end-to-end suite.
///
/// None of these are recovered: every variant aborts the enclosing phase and
/// hands control to teardown.
#[derive(Error, Debug)]
pub enum E2eError {
    /// A container runtime operation (network, container) failed.
    #[error("container runtime failed to {op} {target}: {reason}")]
    Resource {
        /// Operation that failed, e.g. `run container`.
        op: &'static str,
        /// Name or id of the resource involved.
        target: String,
        /// Runtime-provided failure description.
        reason: String,
    },

    /// A bounded poll exhausted its deadline or attempt budget.
    #[error(
        "timed out waiting for {what} after {attempts} attempts ({elapsed:?}){}",
        last_error_suffix(.last_error)
    )]
    Timeout {
        /// Human description of the awaited condition.
        what: String,
        /// Number of queries issued.
        attempts: u32,
        /// Time spent polling.
        elapsed: Duration,
        /// Last transient query error, if any.
        last_error: Option<String>,
    },

    /// A validator kept producing blocks past the scheduled halt height.
    #[error(
        "chain {chain_id} did not halt: {container} reported height {observed}, expected halt at {expected}"
    )]
    HaltOvershoot {
        /// Chain the validator belongs to.
        chain_id: String,
        /// Container name of the offending validator.
        container: String,
        /// Height read from the node.
        observed: u64,
        /// Scheduled upgrade height.
        expected: u64,
    },

    /// Any other protocol or bookkeeping invariant was broken.
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// Mutually inconsistent or unparsable configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A command executed inside a container exited unsuccessfully.
    #[error("`{command}` in {container} exited with code {exit_code}: {stderr}")]
    Exec {
        /// Container the command ran in.
        container: String,
        /// The command line, space joined.
        command: String,
        /// Process exit code (-1 when unknown).
        exit_code: i64,
        /// Captured standard error.
        stderr: String,
    },

    /// No chain with this id has been configured.
    #[error("unknown chain: {0}")]
    UnknownChain(String),

    /// The registry has no live container at this position.
    #[error("no running container for validator {index} of chain {chain_id}")]
    MissingContainer {
        /// Chain id.
        chain_id: String,
        /// Validator index.
        index: usize,
    },

    /// Local filesystem error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to encode or decode JSON.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl E2eError {
    /// Shorthand for a [`E2eError::Resource`] built from any displayable cause.
    pub fn resource(op: &'static str, target: impl Into<String>, reason: impl ToString) -> Self {
        Self::Resource {
            op,
            target: target.into(),
            reason: reason.to_string(),
        }
    }
}

fn last_error_suffix(last_error: &Option<String>) -> String {
    last_error
        .as_ref()
        .map(|e| format!(", last error: {e}"))
        .unwrap_or_default()
}

/// Convenience result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, E2eError>;
