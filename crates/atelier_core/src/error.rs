//! Error types for the core module.

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur during workflow execution.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Graph integrity error: {0}")]
    GraphIntegrity(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Invalid execution state: {0}")]
    InvalidState(String),

    #[error("Step execution failed at node {node}: {message}")]
    StepExecutionFailed { node: String, message: String },

    #[error("Decision handler failed at node {node}: {message}")]
    DecisionFailed { node: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CoreError {
    /// Build a graph integrity error.
    pub fn integrity(message: impl Into<String>) -> Self {
        Self::GraphIntegrity(message.into())
    }
}
