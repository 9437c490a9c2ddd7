use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Batch not found: {0}")]
    BatchNotFound(String),
    #[error("Image not found: {0}")]
    ImageNotFound(String),
    #[error("Batch already exists: {0}")]
    DuplicateBatch(String),
    #[error("Image {0} is approved and locked")]
    ImageLocked(String),
    #[error("Image {0} has not been processed yet")]
    ImageNotProcessed(String),
    #[error("Image {0} was deleted")]
    ImageDeleted(String),
    #[error("DAM connection not found: {0}")]
    ConnectionNotFound(String),
    #[error("DAM connection {0} is inactive")]
    ConnectionInactive(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("Please add at least one image")]
    NoImages,
    #[error("Please provide instructions as text or a file")]
    NoInstructions,
    #[error("Review the processing summary before uploading")]
    SummaryNotShown,
    #[error("An upload is already in progress")]
    UploadInProgress,
    #[error("No upload is in progress")]
    NotUploading,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("{0} is already running")]
    AlreadyRunning(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DamError {
    #[error("Missing required field: {0}")]
    MissingField(String),
    #[error("Field {field} must be a number, got {value:?}")]
    InvalidNumber { field: String, value: String },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
