use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Source directory {path} ({id}) no longer exists")]
    SourceMissing { id: String, path: String },

    #[error("Destination directory {id} no longer exists")]
    DestinationMissing { id: String },

    #[error("No remote storage registered for source type {0}")]
    ProviderNotRegistered(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Listing {dir_id} failed after {attempts} attempts: {message}")]
    RetriesExhausted {
        dir_id: String,
        attempts: u32,
        message: String,
    },

    #[error("Sync cancelled")]
    Cancelled,

    #[error("Invalid job configuration: {0}")]
    InvalidJob(String),

    #[error("Catalog error: {0}")]
    Catalog(String),
}

impl SyncError {
    /// Cancellation ends a run cleanly; callers treat it as "not an error".
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncError::Cancelled)
    }
}

impl From<BridgeError> for SyncError {
    fn from(err: BridgeError) -> Self {
        if err.is_cancelled() {
            SyncError::Cancelled
        } else {
            SyncError::Provider(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
