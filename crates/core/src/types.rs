use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    #[default]
    Unknown,
}

/// Case-insensitive; the backend reports failures as `error`. Null is `Unknown`.
impl<'de> Deserialize<'de> for VideoStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        Ok(match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => VideoStatus::Pending,
            "processing" => VideoStatus::Processing,
            "completed" => VideoStatus::Completed,
            "failed" | "error" => VideoStatus::Failed,
            _ => VideoStatus::Unknown,
        })
    }
}

impl VideoStatus {
    pub fn is_completed(self) -> bool {
        self == VideoStatus::Completed
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VideoStatus::Pending => "pending",
            VideoStatus::Processing => "processing",
            VideoStatus::Completed => "completed",
            VideoStatus::Failed => "failed",
            VideoStatus::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    #[serde(alias = "video_id")]
    pub id: String,
    #[serde(default, alias = "video_title")]
    pub title: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    /// Absent from library listings.
    #[serde(default)]
    pub status: VideoStatus,
    #[serde(default, deserialize_with = "timestamp::optional")]
    pub created_at: Option<DateTime<Utc>>,
    /// Most recent question asked about the video, set in library listings.
    #[serde(default, deserialize_with = "timestamp::optional")]
    pub last_interaction: Option<DateTime<Utc>>,
}

impl Video {
    /// Thumbnail URL, treating the empty string the backend sends as absent.
    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail_url.as_deref().filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionStatus {
    pub status: VideoStatus,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Body returned by the transcribe endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscriptionAck {
    #[serde(default)]
    pub status: Option<VideoStatus>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub video_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRecord {
    pub question: String,
    pub answer: String,
    #[serde(default, alias = "created_at", deserialize_with = "timestamp::optional")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Account {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Credentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct RegisterRequest<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct TranscribeRequest<'a> {
    pub video_url: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct AskRequest<'a> {
    pub video_id: &'a str,
    pub question: &'a str,
}

mod timestamp {
    use super::*;

    /// Accepts RFC 3339 as well as naive ISO-8601, which is read as UTC.
    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn optional<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(parse))
    }
}
