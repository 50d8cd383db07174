use std::{collections::HashMap, sync::Mutex};

use crate::types::{QueryRecord, Video};

#[derive(Default)]
struct Entries {
    histories: HashMap<String, Vec<QueryRecord>>,
    videos: Option<Vec<Video>>,
    details: HashMap<String, Video>,
}

/// In-memory cache of records fetched this session. No eviction; it is
/// cleared wholesale when the session ends.
#[derive(Default)]
pub struct QueryCache {
    entries: Mutex<Entries>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self, video_id: &str) -> Option<Vec<QueryRecord>> {
        self.lock().histories.get(video_id).cloned()
    }

    /// Replace the cached history with what the server returned. The server
    /// list is authoritative and ordered newest first.
    pub fn store_history(&self, video_id: &str, fetched: Vec<QueryRecord>) -> Vec<QueryRecord> {
        self.lock()
            .histories
            .insert(video_id.to_string(), fetched.clone());
        fetched
    }

    pub fn videos(&self) -> Option<Vec<Video>> {
        self.lock().videos.clone()
    }

    pub fn store_videos(&self, videos: Vec<Video>) {
        self.lock().videos = Some(videos);
    }

    pub fn video(&self, video_id: &str) -> Option<Video> {
        self.lock().details.get(video_id).cloned()
    }

    pub fn store_video(&self, video: Video) {
        self.lock().details.insert(video.id.clone(), video);
    }

    pub fn is_empty(&self) -> bool {
        let entries = self.lock();
        entries.histories.is_empty() && entries.videos.is_none() && entries.details.is_empty()
    }

    pub fn clear(&self) {
        *self.lock() = Entries::default();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Entries> {
        self.entries.lock().expect("QueryCache poisoned")
    }
}
