use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Cancellation-class errors end a run cleanly and are never retried.
    pub fn is_cancelled(&self) -> bool {
        match self {
            BridgeError::Cancelled => true,
            BridgeError::Io(err) => err.kind() == std::io::ErrorKind::Interrupted,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
