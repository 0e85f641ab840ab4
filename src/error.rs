use thiserror::Error;

/// Errors raised at the fallible boundaries of the crate: loading weights,
/// configs and datasets, and assembling a model from weight tensors.
///
/// Layer arithmetic itself is infallible; a mis-shaped output buffer handed
/// to a layer is a programming error and panics.
#[derive(Debug, Error)]
pub enum LenetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Config(#[from] serde_json::Error),

    #[error("shape mismatch for {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("invalid data: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, LenetError>;
