//! HTTP client for the vidqa backend.
//!
//! Every request goes through [`ApiClient::execute`], which attaches the
//! session's bearer token on the way out and classifies the response on the
//! way back. A 401 from any guarded endpoint ends the session, drops the
//! query cache and forces the router back to login.

use std::sync::Arc;

use reqwest::{
    RequestBuilder, Response, StatusCode, Url,
    header::{ACCEPT, HeaderMap, HeaderValue},
};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::{
    cache::QueryCache,
    config::ClientConfig,
    error::{Result, VidqaError},
    router::Navigator,
    session::Session,
    types::{
        Account, Answer, AskRequest, Credentials, QueryRecord, RegisterRequest, TokenResponse,
        TranscribeRequest, TranscriptionAck, TranscriptionStatus, Video,
    },
};

/// What a 401 means for a given endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnUnauthorized {
    /// The stored token was rejected: tear the session down.
    ExpireSession,
    /// The submitted credentials were rejected: leave the session alone.
    RejectCredentials,
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    session: Arc<Session>,
    navigator: Arc<dyn Navigator>,
    cache: Arc<QueryCache>,
}

impl ApiClient {
    pub fn new(
        config: &ClientConfig,
        session: Arc<Session>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self> {
        let base_url = parse_base_url(config.base_url())?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            http,
            base_url,
            session,
            navigator,
            cache: Arc::new(QueryCache::new()),
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Exchange credentials for a token and store it in the session.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenResponse> {
        let req = self
            .http
            .post(self.endpoint(&["auth", "login"])?)
            .form(&Credentials { username, password });
        let resp = self.execute(req, OnUnauthorized::RejectCredentials).await?;
        let token: TokenResponse = decode(resp).await?;

        self.session.sign_in(&token.access_token)?;
        info!(username, "logged in");
        Ok(token)
    }

    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<Account> {
        let req = self
            .http
            .post(self.endpoint(&["auth", "register"])?)
            .json(&RegisterRequest {
                username,
                email,
                password,
            });
        let resp = self.execute(req, OnUnauthorized::ExpireSession).await?;
        decode(resp).await
    }

    /// Best-effort server logout. The local session and cache are cleared
    /// whatever the server says; a 401 also redirects to login like any
    /// other guarded endpoint.
    pub async fn logout(&self) -> Result<()> {
        let server_side = match self.endpoint(&["auth", "logout"]) {
            Ok(url) => {
                self.execute(self.http.post(url), OnUnauthorized::ExpireSession)
                    .await
                    .map(drop)
            }
            Err(e) => Err(e),
        };
        if let Err(e) = server_side {
            warn!(error = %e, "server-side logout failed, clearing local session anyway");
        }

        self.cache.clear();
        self.session.sign_out()?;
        info!("logged out");
        Ok(())
    }

    pub async fn start_transcription(&self, video_url: &str) -> Result<TranscriptionAck> {
        let req = self
            .http
            .post(self.endpoint(&["transcript", "transcribe"])?)
            .json(&TranscribeRequest { video_url });
        let resp = self.execute(req, OnUnauthorized::ExpireSession).await?;

        // The acknowledgment is loosely shaped; a bare string is a message.
        let body: serde_json::Value = decode(resp).await?;
        Ok(match body {
            serde_json::Value::String(message) => TranscriptionAck {
                message: Some(message),
                ..TranscriptionAck::default()
            },
            other => serde_json::from_value(other).unwrap_or_else(|e| {
                debug!(error = %e, "unrecognised transcription acknowledgment");
                TranscriptionAck::default()
            }),
        })
    }

    pub async fn transcription_status(&self, video_id: &str) -> Result<TranscriptionStatus> {
        let req = self
            .http
            .get(self.endpoint(&["transcript", "status", video_id])?);
        let resp = self.execute(req, OnUnauthorized::ExpireSession).await?;
        decode(resp).await
    }

    pub async fn ask_question(&self, video_id: &str, question: &str) -> Result<Answer> {
        let req = self
            .http
            .post(self.endpoint(&["query", "ask-question"])?)
            .json(&AskRequest { video_id, question });
        let resp = self.execute(req, OnUnauthorized::ExpireSession).await?;
        decode(resp).await
    }

    pub async fn query_history(&self, video_id: &str) -> Result<Vec<QueryRecord>> {
        let req = self.http.get(self.endpoint(&["query", "history", video_id])?);
        let resp = self.execute(req, OnUnauthorized::ExpireSession).await?;
        decode(resp).await
    }

    pub async fn video_history(&self) -> Result<Vec<Video>> {
        let req = self.http.get(self.endpoint(&["videos", "history"])?);
        let resp = self.execute(req, OnUnauthorized::ExpireSession).await?;
        decode(resp).await
    }

    pub async fn video_details(&self, video_id: &str) -> Result<Video> {
        let req = self.http.get(self.endpoint(&["videos", video_id])?);
        let resp = self.execute(req, OnUnauthorized::ExpireSession).await?;
        decode(resp).await
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| VidqaError::BaseUrl {
                url: self.base_url.to_string(),
                reason: "cannot be used as a base".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Request transform: attach the bearer token when a session exists.
    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match self.session.token() {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn execute(&self, req: RequestBuilder, on_unauthorized: OnUnauthorized) -> Result<Response> {
        let resp = self.authorize(req).send().await?;
        let status = resp.status();
        debug!(path = resp.url().path(), %status, "response received");

        if status.is_success() {
            return Ok(resp);
        }

        match (status, on_unauthorized) {
            (StatusCode::UNAUTHORIZED, OnUnauthorized::ExpireSession) => {
                self.expire_session();
                Err(VidqaError::SessionExpired)
            }
            (
                StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN,
                OnUnauthorized::RejectCredentials,
            ) => Err(VidqaError::InvalidCredentials),
            _ => Err(VidqaError::Api {
                status,
                message: error_message(resp).await,
            }),
        }
    }

    /// Response transform for 401: forget everything and go to login.
    fn expire_session(&self) {
        info!("token rejected by server, ending session");
        // sign_out logs its own storage failure; the redirect must still happen.
        self.session.sign_out().ok();
        self.cache.clear();
        self.navigator.redirect_to_login();
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| VidqaError::BaseUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if url.cannot_be_a_base() {
        return Err(VidqaError::BaseUrl {
            url: raw.to_string(),
            reason: "cannot be used as a base".to_string(),
        });
    }
    Ok(url)
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(VidqaError::Decode)
}

/// Best human-readable message from an error body.
async fn error_message(resp: Response) -> String {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();

    if let Ok(json) = serde_json::from_str::<serde_json::Value>(&body) {
        for key in ["detail", "message"] {
            match json.get(key) {
                Some(serde_json::Value::String(s)) => return s.clone(),
                Some(serde_json::Value::Null) | None => {}
                Some(other) => return other.to_string(),
            }
        }
    }

    let body = body.trim();
    if body.is_empty() {
        status.canonical_reason().unwrap_or("unknown error").to_string()
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{router::Router, session::MemorySessionStore};

    fn client(base: &str) -> Result<ApiClient> {
        let session = Arc::new(Session::restore(MemorySessionStore::default()));
        let router = Arc::new(Router::new(Arc::clone(&session)));
        let config = ClientConfig {
            base_url: base.to_string(),
            ..ClientConfig::default()
        };
        ApiClient::new(&config, session, router)
    }

    #[test]
    fn endpoints_keep_base_path_and_escape_ids() {
        let api = client("http://backend:9000/api/").unwrap();

        let url = api.endpoint(&["transcript", "status", "a/b c"]).unwrap();
        assert_eq!(url.as_str(), "http://backend:9000/api/transcript/status/a%2Fb%20c");

        let root = client("http://localhost:8000").unwrap();
        assert_eq!(
            root.endpoint(&["auth", "login"]).unwrap().as_str(),
            "http://localhost:8000/auth/login"
        );
    }

    #[test]
    fn unusable_base_url_is_rejected() {
        assert!(matches!(client("not a url"), Err(VidqaError::BaseUrl { .. })));
        assert!(matches!(client("mailto:me@example.com"), Err(VidqaError::BaseUrl { .. })));
    }
}
