//! Error types for graphlock

use thiserror::Error;

/// Main error type shared across graphlock crates
#[derive(Error, Debug)]
pub enum GraphlockError {
    #[error("Dependency graph error: {0}")]
    Graph(String),

    #[error("Circular dependency: {0}")]
    CircularDependency(String),

    #[error("Frozen graph mutated: {0}")]
    FrozenGraph(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Result type alias for graphlock operations
pub type GraphlockResult<T> = Result<T, GraphlockError>;
