//! vidqa Core Library
//!
//! Authenticated client for a video transcription and question-answering
//! backend: session handling, request/response transforms, transcription
//! polling and the in-memory query cache.

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod format;
pub mod query;
pub mod router;
pub mod session;
pub mod transcribe;
pub mod types;

// Re-export commonly used items at crate root
pub use cache::QueryCache;
pub use client::ApiClient;
pub use config::ClientConfig;
pub use error::{ErrorKind, Result, VidqaError};
pub use format::{format_history, format_timestamp, format_video_details, format_video_line};
pub use query::{QuestionFlow, video, video_library};
pub use router::{Navigator, Route, Router};
pub use session::{FileSessionStore, MemorySessionStore, Session, SessionState, SessionStore};
pub use transcribe::{
    PollPolicy, StatusSource, Submission, TranscriptionFlow, extract_video_id, poll_until_complete,
};
pub use types::{
    Account, Answer, QueryRecord, TokenResponse, TranscriptionAck, TranscriptionStatus, Video,
    VideoStatus,
};
