use thiserror::Error;

/// Why an uploaded file was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    TooLarge,
    WrongType,
    TooManyFiles,
    Empty,
}

#[derive(Debug, Error)]
pub enum DynamikError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// A wizard step or a submission failed its predicate. `title` and
    /// `description` are shown to the user as-is.
    #[error("{title}: {description}")]
    Validation { title: String, description: String },

    #[error("Error uploading {file}: {reason}")]
    UploadRejected {
        file: String,
        reason: String,
        kind: RejectionKind,
    },

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DynamikError {
    pub fn validation(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::Validation {
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn rejected(file: impl Into<String>, kind: RejectionKind, reason: impl Into<String>) -> Self {
        Self::UploadRejected {
            file: file.into(),
            reason: reason.into(),
            kind,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, DynamikError>;
