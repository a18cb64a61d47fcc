use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    /// A positional argument is neither empty nor `#<number>`.
    #[error("Invalid target selector '{0}', expected #<number>")]
    InvalidSelector(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Sync error: {0}")]
    Sync(#[from] core_sync::SyncError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Task sequence {sequence_id} aborted: {message}")]
    SequenceAborted {
        sequence_id: String,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, ServiceError>;
