//! Error types surfaced by the store, identity and validation layers.

use shared::error::ApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store responded with status {status}: {error}")]
    Api { status: u16, error: ApiError },
    #[error("store transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid store response: {0}")]
    Decode(String),
    #[error("invalid store url: {0}")]
    InvalidUrl(String),
}

impl From<url::ParseError> for StoreError {
    fn from(value: url::ParseError) -> Self {
        Self::InvalidUrl(value.to_string())
    }
}

impl StoreError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            error: ApiError::from_status(status, message),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            StoreError::Api { status, .. } => Some(*status),
            StoreError::Transport(err) => err.status().map(|status| status.as_u16()),
            StoreError::Decode(_) | StoreError::InvalidUrl(_) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("no user in local storage")]
    MissingUser,
    #[error("current user has no email")]
    MissingEmail,
    #[error("malformed user record: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no file selected")]
    MissingFile,
    #[error("unsupported file type '{mime_type}' for '{file_name}' (allowed: jpg, jpeg, png)")]
    UnsupportedFileType {
        file_name: String,
        mime_type: String,
    },
}
