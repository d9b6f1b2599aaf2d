use crate::output::OutputId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Node '{node}' failed: {source}")]
    NodeExecution {
        node: String,
        #[source]
        source: NodeError,
    },

    #[error("Failed to resolve input '{input}': {source}")]
    Resolution {
        input: String,
        #[source]
        source: OutputError,
    },

    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure state of an output future.
///
/// Cloned out to every awaiter of the same output, so it carries no
/// non-clonable sources.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OutputError {
    #[error("Output {id} timed out waiting for resolution after {waited_ms}ms")]
    Timeout { id: OutputId, waited_ms: u64 },

    #[error("Output {id} was already resolved")]
    DoubleResolution { id: OutputId },

    #[error("Output {id} failed upstream: {message}")]
    Upstream { id: OutputId, message: String },
}

impl OutputError {
    pub fn id(&self) -> OutputId {
        match self {
            OutputError::Timeout { id, .. }
            | OutputError::DoubleResolution { id }
            | OutputError::Upstream { id, .. } => *id,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, OutputError::Timeout { .. })
    }
}

#[derive(Error, Debug, Clone)]
pub enum NodeError {
    #[error("Missing required input: {0}")]
    MissingInput(String),

    #[error("Invalid input type for '{field}': expected {expected}, got {actual}")]
    InvalidInputType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Execution context is already running a tree")]
    AlreadyRunning,

    #[error("Step tree exceeded the maximum depth of {limit}")]
    DepthExceeded { limit: usize },
}
