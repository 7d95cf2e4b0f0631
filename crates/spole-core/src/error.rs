use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SpoleError {
    #[error("document unreadable: {0}")]
    DocumentUnreadable(String),

    #[error("document has no text layer (scanned or empty PDF?)")]
    EmptyDocument,

    #[error("failed to load label rules from {path}: {reason}")]
    RulesetLoad { path: PathBuf, reason: String },

    #[error("invalid label rules: {0}")]
    RulesetInvalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
