use thiserror::Error;

/// Errors raised by the classification core.
///
/// All of them describe a caller contract violation; nothing is retried.
#[derive(Debug, Error)]
pub enum EvalError {
    /// An embedding's dimensionality disagrees with the gallery's.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// Accuracy was requested over zero batches.
    #[error("cannot compute accuracy over an empty dataset")]
    EmptyDataset,

    /// Two sequences that must be parallel have different lengths.
    #[error("{what}: length mismatch ({left} vs {right})")]
    LengthMismatch {
        what: &'static str,
        left: usize,
        right: usize,
    },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The embedding backend failed.
    #[error("embedding failed")]
    Embedding(#[source] anyhow::Error),
}

pub type Result<T, E = EvalError> = std::result::Result<T, E>;
