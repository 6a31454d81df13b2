use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Source not found: {location}: {reason}")]
    SourceNotFound { location: String, reason: String },

    #[error("Failed to read source object {key}: {reason}")]
    SourceRead { key: String, reason: String },

    #[error("Fields to drop are missing from the header: {}", missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    #[error("Header of {key} does not match the header of {first_key}")]
    InconsistentHeader { key: String, first_key: String },

    #[error("Failed to write target object {key}: {reason}")]
    TargetWrite { key: String, reason: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Source-side failures, as opposed to target or configuration ones.
    pub fn is_source_error(&self) -> bool {
        matches!(
            self,
            Error::SourceNotFound { .. } | Error::SourceRead { .. } | Error::InconsistentHeader { .. }
        )
    }
}
