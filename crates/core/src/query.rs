//! Asking questions about a transcribed video and browsing past answers.

use crate::{
    client::ApiClient,
    error::Result,
    types::{Answer, QueryRecord, Video},
};

/// The question/history view's state for one selected video.
pub struct QuestionFlow {
    client: ApiClient,
    video_id: String,
}

impl QuestionFlow {
    pub fn new(client: ApiClient, video_id: impl Into<String>) -> Self {
        Self {
            client,
            video_id: video_id.into(),
        }
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    /// Ask a question and refresh the cached history with the new entry.
    pub async fn ask(&self, question: &str) -> Result<(Answer, Vec<QueryRecord>)> {
        let answer = self.client.ask_question(&self.video_id, question.trim()).await?;
        let history = self.refresh_history().await?;
        Ok((answer, history))
    }

    /// History from the cache, fetching it on first use.
    pub async fn history(&self) -> Result<Vec<QueryRecord>> {
        match self.client.cache().history(&self.video_id) {
            Some(history) => Ok(history),
            None => self.refresh_history().await,
        }
    }

    pub async fn refresh_history(&self) -> Result<Vec<QueryRecord>> {
        let fetched = self.client.query_history(&self.video_id).await?;
        Ok(self.client.cache().store_history(&self.video_id, fetched))
    }
}

/// Previously submitted videos, newest as the server orders them.
pub async fn video_library(client: &ApiClient, refresh: bool) -> Result<Vec<Video>> {
    if !refresh {
        if let Some(videos) = client.cache().videos() {
            return Ok(videos);
        }
    }
    let videos = client.video_history().await?;
    client.cache().store_videos(videos.clone());
    Ok(videos)
}

pub async fn video(client: &ApiClient, video_id: &str, refresh: bool) -> Result<Video> {
    if !refresh {
        if let Some(video) = client.cache().video(video_id) {
            return Ok(video);
        }
    }
    let video = client.video_details(video_id).await?;
    client.cache().store_video(video.clone());
    Ok(video)
}
