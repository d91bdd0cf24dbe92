/// Fetch engine: one whole-body GET per attempt, outcome classification,
/// and bounded retry with linearly growing backoff.
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

use mirror_shared::errors::FetchError;
use mirror_shared::models::Outcome;

use crate::resolver::parse_target;
use crate::store::ContentStore;

/// A fully buffered HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// Transport seam so the engine can run against a scripted client in tests.
///
/// Implementations report only transport-level failures; HTTP error statuses
/// come back as responses.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError>;
}

/// Production client: certificate validation disabled, redirects followed.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        let target = parse_target(url).ok_or_else(|| FetchError::InvalidUrl(url.to_string()))?;

        let response = self
            .client
            .get(target)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = response.bytes().await.map_err(classify_transport)?.to_vec();

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}

/// Map a reqwest failure onto the terminal/transient taxonomy.
fn classify_transport(err: reqwest::Error) -> FetchError {
    let message = error_chain(&err);
    if err.is_builder() {
        return FetchError::InvalidUrl(message);
    }

    let lowered = message.to_lowercase();
    let is_dns = [
        "dns error",
        "failed to lookup address",
        "name or service not known",
        "no such host",
        "nodename nor servname",
    ]
    .iter()
    .any(|needle| lowered.contains(needle));

    if is_dns {
        FetchError::Dns(message)
    } else {
        FetchError::Transport(message)
    }
}

/// Join an error with its sources: "outer: inner: root".
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        // Some errors already embed their source in Display
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

/// Accept only media types, and never a charset-bearing one.
pub fn validate_content_type(value: Option<&str>) -> Result<&str, FetchError> {
    let Some(value) = value else {
        return Err(FetchError::InvalidContentType("none".to_string()));
    };

    let lowered = value.to_ascii_lowercase();
    let is_media = ["audio", "image", "video"]
        .iter()
        .any(|kind| lowered.contains(kind));

    if is_media && !lowered.contains("charset") {
        Ok(value)
    } else {
        Err(FetchError::InvalidContentType(value.to_string()))
    }
}

/// Attempt budget and delay schedule for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    /// Added to the delay after every retry.
    pub delay_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            delay_step: Duration::from_secs(1),
        }
    }
}

pub struct FetchEngine<C> {
    client: C,
    store: ContentStore,
    policy: RetryPolicy,
}

impl<C: HttpClient> FetchEngine<C> {
    pub fn new(client: C, store: ContentStore) -> Self {
        Self::with_policy(client, store, RetryPolicy::default())
    }

    pub fn with_policy(client: C, store: ContentStore, policy: RetryPolicy) -> Self {
        Self {
            client,
            store,
            policy,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Fetch and store one URL. Never fails: every error becomes an outcome.
    ///
    /// With `strict` set, HTTP error statuses are failures; otherwise the
    /// response is judged on its content type alone.
    pub async fn fetch(&self, url: &str, strict: bool) -> Outcome {
        let mut attempt = 1;
        let mut delay = self.policy.initial_delay;

        loop {
            let err = match self.attempt(url, strict).await {
                Ok(path) => return Outcome::Stored(path),
                Err(e) => e,
            };

            if err.is_terminal() {
                debug!("Terminal failure for {}: {}", url, err);
                return Outcome::Failed(err.to_string());
            }
            if attempt >= self.policy.max_attempts {
                warn!("Giving up on {} after {} attempts: {}", url, attempt, err);
                return Outcome::Failed(err.to_string());
            }

            debug!(
                "Transient failure for {} (attempt {}), retrying in {:?}: {}",
                url, attempt, delay, err
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
            delay += self.policy.delay_step;
        }
    }

    async fn attempt(&self, url: &str, strict: bool) -> Result<PathBuf, FetchError> {
        let response = self.client.get(url).await?;

        if strict && (response.status.is_client_error() || response.status.is_server_error()) {
            return Err(FetchError::status(
                response.status.as_u16(),
                response.status.canonical_reason(),
            ));
        }

        let content_type = validate_content_type(response.content_type.as_deref())?;
        self.store
            .store(&response.body, content_type)
            .await
            .map_err(|e| FetchError::Store(format!("Failed to store {}: {}", url, e)))
    }
}
