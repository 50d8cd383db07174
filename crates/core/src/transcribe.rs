//! Transcription submission and status polling.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    client::ApiClient,
    config::ClientConfig,
    error::{Result, VidqaError},
    types::{TranscriptionAck, TranscriptionStatus, VideoStatus},
};

/// Query parameter that carries the video id in watch URLs.
const VIDEO_ID_PARAM: &str = "v";

/// Read the video id from the `v` query parameter of a watch URL.
///
/// Short links, embed URLs and anything without a non-empty `v` parameter
/// are rejected rather than guessed at.
pub fn extract_video_id(video_url: &str) -> Result<String> {
    let not_found = || VidqaError::VideoIdNotFound {
        url: video_url.to_string(),
    };
    let url = Url::parse(video_url.trim()).map_err(|_| not_found())?;

    url.query_pairs()
        .find(|(key, _)| key == VIDEO_ID_PARAM)
        .map(|(_, value)| value.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(not_found)
}

#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn status(&self, video_id: &str) -> Result<TranscriptionStatus>;
}

#[async_trait]
impl StatusSource for ApiClient {
    async fn status(&self, video_id: &str) -> Result<TranscriptionStatus> {
        self.transcription_status(video_id).await
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 360,
        }
    }
}

impl From<&ClientConfig> for PollPolicy {
    fn from(config: &ClientConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            max_attempts: config.max_poll_attempts.max(1),
        }
    }
}

/// Poll until the video is `completed`.
///
/// The first request goes out immediately, then one per `interval`. Stops on
/// completion, on a `failed` status, on any request error, after
/// `max_attempts` requests, or when `cancel` fires. `on_status` sees every
/// status received.
pub async fn poll_until_complete<S>(
    source: &S,
    video_id: &str,
    policy: PollPolicy,
    cancel: &CancellationToken,
    mut on_status: impl FnMut(&TranscriptionStatus),
) -> Result<TranscriptionStatus>
where
    S: StatusSource + ?Sized,
{
    let cancelled = || VidqaError::PollCancelled {
        video_id: video_id.to_string(),
    };

    for attempt in 1..=policy.max_attempts {
        let status = tokio::select! {
            _ = cancel.cancelled() => return Err(cancelled()),
            status = source.status(video_id) => status?,
        };
        debug!(video_id, attempt, status = status.status.as_str(), "status polled");
        on_status(&status);

        match status.status {
            VideoStatus::Completed => return Ok(status),
            VideoStatus::Failed => {
                return Err(VidqaError::TranscriptionFailed {
                    video_id: video_id.to_string(),
                });
            }
            _ => {}
        }

        if attempt == policy.max_attempts {
            break;
        }
        tokio::select! {
            _ = cancel.cancelled() => return Err(cancelled()),
            _ = tokio::time::sleep(policy.interval) => {}
        }
    }

    Err(VidqaError::PollExhausted {
        video_id: video_id.to_string(),
        attempts: policy.max_attempts,
    })
}

/// A submitted transcription, ready to be polled.
#[derive(Debug, Clone)]
pub struct Submission {
    pub video_id: String,
    pub ack: TranscriptionAck,
}

/// The transcriber view's state: the active video and how to wait for it.
pub struct TranscriptionFlow {
    client: ApiClient,
    policy: PollPolicy,
    active_video: Option<String>,
}

impl TranscriptionFlow {
    pub fn new(client: ApiClient, policy: PollPolicy) -> Self {
        Self {
            client,
            policy,
            active_video: None,
        }
    }

    pub fn active_video(&self) -> Option<&str> {
        self.active_video.as_deref()
    }

    /// Submit `video_url` and make its id the active video.
    ///
    /// The id is derived before anything is sent, so a URL that cannot be
    /// polled is never submitted.
    pub async fn submit(&mut self, video_url: &str) -> Result<Submission> {
        let video_id = extract_video_id(video_url)?;
        let ack = self.client.start_transcription(video_url.trim()).await?;
        self.active_video = Some(video_id.clone());
        Ok(Submission { video_id, ack })
    }

    /// Wait for the active video to finish.
    pub async fn wait(
        &self,
        cancel: &CancellationToken,
        on_status: impl FnMut(&TranscriptionStatus),
    ) -> Result<TranscriptionStatus> {
        let video_id = self
            .active_video
            .as_deref()
            .ok_or(VidqaError::NoActiveVideo)?;
        poll_until_complete(&self.client, video_id, self.policy, cancel, on_status).await
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{
            Arc, Mutex,
            atomic::{AtomicU32, Ordering},
        },
    };

    use tokio::time::Instant;

    use super::*;

    #[test]
    fn id_comes_from_the_v_parameter() {
        assert_eq!(extract_video_id("https://youtube.com/watch?v=ABC123").unwrap(), "ABC123");
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?list=PL1&v=XYZ&t=42s").unwrap(),
            "XYZ"
        );
    }

    #[test]
    fn urls_without_an_id_are_rejected() {
        for url in [
            "https://youtu.be/ABC123",
            "https://youtube.com/watch?v=",
            "not a url",
            "",
        ] {
            assert!(
                matches!(extract_video_id(url), Err(VidqaError::VideoIdNotFound { .. })),
                "{url}"
            );
        }
    }

    struct Scripted {
        statuses: Mutex<VecDeque<VideoStatus>>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(statuses: &[VideoStatus]) -> Arc<Self> {
            Arc::new(Self {
                statuses: Mutex::new(statuses.iter().copied().collect()),
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StatusSource for Scripted {
        async fn status(&self, _video_id: &str) -> Result<TranscriptionStatus> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let status = self
                .statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(VideoStatus::Processing);
            Ok(TranscriptionStatus {
                status,
                extra: Default::default(),
            })
        }
    }

    fn policy(max_attempts: u32) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(5),
            max_attempts,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn repolls_every_five_seconds_until_completed() {
        let source = Scripted::new(&[
            VideoStatus::Pending,
            VideoStatus::Processing,
            VideoStatus::Completed,
        ]);
        let started = Instant::now();
        let mut seen = Vec::new();

        let done = poll_until_complete(
            source.as_ref(),
            "ABC123",
            policy(10),
            &CancellationToken::new(),
            |s| seen.push(s.status),
        )
        .await
        .unwrap();

        assert!(done.status.is_completed());
        assert_eq!(source.calls(), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(10));
        assert_eq!(seen.last(), Some(&VideoStatus::Completed));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let source = Scripted::new(&[]);

        let err = poll_until_complete(
            source.as_ref(),
            "ABC123",
            policy(4),
            &CancellationToken::new(),
            |_| {},
        )
        .await
        .unwrap_err();

        assert!(matches!(err, VidqaError::PollExhausted { attempts: 4, .. }));
        assert_eq!(source.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_status_stops_polling() {
        let source = Scripted::new(&[VideoStatus::Processing, VideoStatus::Failed]);

        let err = poll_until_complete(
            source.as_ref(),
            "ABC123",
            policy(10),
            &CancellationToken::new(),
            |_| {},
        )
        .await
        .unwrap_err();

        assert!(matches!(err, VidqaError::TranscriptionFailed { .. }));
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_between_polls() {
        let source = Scripted::new(&[]);
        let cancel = CancellationToken::new();

        let poller = {
            let source = Arc::clone(&source);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                poll_until_complete(source.as_ref(), "ABC123", policy(100), &cancel, |_| {}).await
            })
        };

        tokio::time::sleep(Duration::from_secs(7)).await;
        cancel.cancel();
        let err = poller.await.unwrap().unwrap_err();

        assert!(matches!(err, VidqaError::PollCancelled { .. }));
        assert_eq!(source.calls(), 2);
    }
}
