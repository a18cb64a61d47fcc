use thiserror::Error;

/// Failures while assembling the runtime. Scan and task failures have their
/// own error types in `core-sync` and `core-service`.
#[derive(Error, Debug)]
pub enum Error {
    /// A scan setting or task timing is out of range
    #[error("Invalid setting: {0}")]
    Config(String),

    /// The tracing subscriber could not be installed
    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("Missing bridge {capability}: {message}")]
    CapabilityMissing { capability: String, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
