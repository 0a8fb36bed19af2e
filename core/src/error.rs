use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Required column '{column}' missing from {view}")]
    MissingColumn { view: String, column: String },

    #[error("Invalid value in column '{column}' for contract {contract_id}: {reason}")]
    InvalidValue {
        contract_id: String,
        column:      String,
        reason:      String,
    },

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Artifact unavailable at {path}: {reason}")]
    ArtifactUnavailable { path: String, reason: String },

    #[error("Insufficient minority samples: {minority} rows, need at least {required}")]
    InsufficientMinority { minority: usize, required: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
