//! HTTP client for the sound store.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use radiopad_core::{
    usable_duration, DurationStore, Error, HttpError, PlayCountService, PlayCountUpdate, Result,
    SoundId, SoundItem, SourceFetcher,
};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::config::ApiConfig;
use crate::types::{DurationPatch, PatchAck, PlayCountPatch, SoundRecord};

/// Attempts for idempotent reads. Writes are never retried.
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (milliseconds).
const BASE_RETRY_DELAY_MS: u64 = 250;

/// Largest source accepted for decoding.
const MAX_SOURCE_BYTES: usize = 256 * 1024 * 1024;

/// Client for the `/sounds` resource.
#[derive(Clone)]
pub struct SoundsClient {
    http: reqwest::Client,
    base_url: Url,
}

impl SoundsClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
        })
    }

    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `GET /sounds`
    pub async fn list_sounds(&self) -> Result<Vec<SoundRecord>> {
        let url = self.endpoint(&["sounds"])?;
        self.get_json(&url).await
    }

    /// The sound list converted for the player.
    pub async fn list_items(&self) -> Result<Vec<SoundItem>> {
        Ok(self
            .list_sounds()
            .await?
            .into_iter()
            .map(SoundItem::from)
            .collect())
    }

    /// `GET /sounds/{id}`
    pub async fn get_sound(&self, id: &SoundId) -> Result<SoundRecord> {
        let url = self.endpoint(&["sounds", id.as_str()])?;
        self.get_json(&url).await.map_err(|e| {
            if e.is_not_found() {
                Error::NotFound(format!("sound {id}"))
            } else {
                e
            }
        })
    }

    /// `PATCH /sounds/{id}` with `{"playCount": next_count}`.
    pub async fn increment_play_count(
        &self,
        id: &SoundId,
        next_count: u64,
    ) -> Result<PlayCountUpdate> {
        let url = self.endpoint(&["sounds", id.as_str()])?;
        let ack = self
            .patch(&url, &PlayCountPatch {
                play_count: next_count,
            })
            .await?;

        Ok(PlayCountUpdate {
            id: ack.id.unwrap_or_else(|| id.clone()),
            play_count: ack.play_count.unwrap_or(next_count),
        })
    }

    /// `PATCH /sounds/{id}` with `{"durationSeconds": seconds}`.
    pub async fn patch_duration(&self, id: &SoundId, seconds: f64) -> Result<()> {
        let seconds = usable_duration(seconds)
            .ok_or_else(|| Error::InvalidArgument(format!("unusable duration {seconds}")))?;
        let url = self.endpoint(&["sounds", id.as_str()])?;
        self.patch(&url, &DurationPatch {
            duration_seconds: seconds,
        })
        .await?;
        debug!("Saved duration {seconds:.2}s for sound {id}");
        Ok(())
    }

    /// Download a source in full.
    pub async fn fetch(&self, source: &str) -> Result<Bytes> {
        let url = self.resolve(source)?;
        let data = self
            .with_retries(&url, || async {
                let response = self.send(self.http.get(url.clone())).await?;
                if response
                    .content_length()
                    .is_some_and(|len| len > MAX_SOURCE_BYTES as u64)
                {
                    return Err(Error::UnsupportedFormat(format!("{url} is too large")));
                }
                response
                    .bytes()
                    .await
                    .map_err(|e| Error::Network(format!("Failed to read {url}: {e}")))
            })
            .await?;

        if data.len() > MAX_SOURCE_BYTES {
            return Err(Error::UnsupportedFormat(format!("{url} is too large")));
        }
        debug!("Fetched {} bytes from {url}", data.len());
        Ok(data)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::Http(HttpError::InvalidUrl(self.base_url.to_string())))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Absolute sources are used as-is, relative ones hang off the store.
    fn resolve(&self, source: &str) -> Result<Url> {
        let source = source.trim();
        Url::parse(source)
            .or_else(|_| self.base_url.join(source))
            .map_err(|e| Error::Http(HttpError::InvalidUrl(format!("{source}: {e}"))))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T> {
        self.with_retries(url, || async {
            let response = self.send(self.http.get(url.clone())).await?;
            let body = response
                .bytes()
                .await
                .map_err(|e| Error::Network(format!("Failed to read response body: {e}")))?;
            Ok(serde_json::from_slice(&body)?)
        })
        .await
    }

    async fn patch<B: Serialize + Sync>(&self, url: &Url, body: &B) -> Result<PatchAck> {
        let response = self.send(self.http.patch(url.clone()).json(body)).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("Failed to read response body: {e}")))?;

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(PatchAck::default());
        }
        serde_json::from_slice(&body)
            .map_err(|e| Error::Store(format!("Unreadable acknowledgement from {url}: {e}")))
    }

    async fn with_retries<T, F, Fut>(&self, url: &Url, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_error = None;
        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = Duration::from_millis(BASE_RETRY_DELAY_MS * 2u64.pow(attempt - 1));
                tokio::time::sleep(delay).await;
                debug!("Retry attempt {attempt} for {url} after {delay:?}");
            }

            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => {
                    warn!("Request to {url} failed (attempt {attempt}): {e}");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Network("Request failed".to_string())))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Http(HttpError::Timeout)
            } else if e.is_connect() {
                Error::Http(HttpError::ConnectionFailed(e.to_string()))
            } else {
                Error::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Http(HttpError::StatusError {
                status: status.as_u16(),
                message,
            }));
        }

        Ok(response)
    }
}

impl PlayCountService for SoundsClient {
    async fn increment_play_count(
        &self,
        id: &SoundId,
        next_count: u64,
    ) -> Result<PlayCountUpdate> {
        Self::increment_play_count(self, id, next_count).await
    }
}

impl DurationStore for SoundsClient {
    async fn patch_duration(&self, id: &SoundId, seconds: f64) -> Result<()> {
        Self::patch_duration(self, id, seconds).await
    }
}

impl SourceFetcher for SoundsClient {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        Self::fetch(self, url).await
    }
}
