use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VidqaError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Session expired, please log in again")]
    SessionExpired,

    #[error("Request failed with {status}: {message}")]
    Api { status: StatusCode, message: String },

    #[error("API request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected response body: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Could not find a video id in {url}")]
    VideoIdNotFound { url: String },

    #[error("Transcription of {video_id} failed on the server")]
    TranscriptionFailed { video_id: String },

    #[error("Gave up waiting for {video_id} after {attempts} status checks")]
    PollExhausted { video_id: String, attempts: u32 },

    #[error("Stopped waiting for {video_id}")]
    PollCancelled { video_id: String },

    #[error("No video selected")]
    NoActiveVideo,

    #[error("Not logged in")]
    NotAuthenticated,

    #[error("Invalid backend address {url}: {reason}")]
    BaseUrl { url: String, reason: String },

    #[error("Invalid configuration in {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("Session storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Session file is corrupt: {0}")]
    StorageFormat(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, VidqaError>;

/// How an error is surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Credentials were rejected at login.
    Authentication,
    /// A 401 tore the session down; the redirect is the only signal.
    SessionExpired,
    /// Network, server or decode failure. Not retried.
    Transient,
    /// Local problem with the user's input or environment.
    Usage,
}

const GENERIC_FAILURE: &str = "Something went wrong talking to the server. Please try again.";

impl VidqaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VidqaError::InvalidCredentials => ErrorKind::Authentication,
            VidqaError::SessionExpired => ErrorKind::SessionExpired,
            VidqaError::Api { .. } | VidqaError::Transport(_) | VidqaError::Decode(_) => {
                ErrorKind::Transient
            }
            VidqaError::VideoIdNotFound { .. }
            | VidqaError::TranscriptionFailed { .. }
            | VidqaError::PollExhausted { .. }
            | VidqaError::PollCancelled { .. }
            | VidqaError::NoActiveVideo
            | VidqaError::NotAuthenticated
            | VidqaError::BaseUrl { .. }
            | VidqaError::Config { .. }
            | VidqaError::Storage(_)
            | VidqaError::StorageFormat(_) => ErrorKind::Usage,
        }
    }

    /// Text a view should show for this error, or `None` when it stays silent.
    pub fn notification(&self) -> Option<String> {
        match self.kind() {
            ErrorKind::SessionExpired => None,
            ErrorKind::Transient => Some(GENERIC_FAILURE.to_string()),
            ErrorKind::Authentication | ErrorKind::Usage => Some(self.to_string()),
        }
    }
}
