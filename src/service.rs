use async_trait::async_trait;
use log::{debug, warn, Level};
use logging_timer::timer;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::config::{ApiConfig, QueryConfig};
use crate::envelope::Envelope;
use crate::error::DeckError;
use crate::pagination::ResultPage;
use crate::query::FetchRequest;

/// Source of listing pages. The HTTP endpoint is the production
/// implementation; anything else (tests, caches) can stand in.
#[async_trait]
pub trait PageFetcher<T>: Send + Sync {
    async fn fetch_page(&self, request: &FetchRequest) -> Result<ResultPage<T>, DeckError>;
}

#[async_trait]
impl<T, P> PageFetcher<T> for Arc<P>
where
    T: Send + 'static,
    P: PageFetcher<T> + ?Sized,
{
    async fn fetch_page(&self, request: &FetchRequest) -> Result<ResultPage<T>, DeckError> {
        (**self).fetch_page(request).await
    }
}

/// Bounded retry of transport failures. One attempt means no retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const NONE: RetryPolicy = RetryPolicy {
        max_attempts: 1,
        delay: Duration::ZERO,
    };

    pub fn from_config(config: &QueryConfig) -> Self {
        RetryPolicy {
            max_attempts: config.max_attempts.max(1),
            delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts are used up.
    pub async fn run<T, Op, Fut>(&self, mut op: Op) -> Result<T, DeckError>
    where
        Op: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, DeckError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    warn!(
                        "Attempt {}/{} failed: {} - retrying in {:?}",
                        attempt, self.max_attempts, e, self.delay
                    );
                    attempt += 1;
                    tokio::time::sleep(self.delay).await;
                }
                result => return result,
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::NONE
    }
}

/// Shared HTTP client for the platform backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    token: Option<String>,
    retry: RetryPolicy,
}

impl ApiClient {
    pub fn new(api: &ApiConfig, retry: RetryPolicy) -> Result<Self, DeckError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(api.timeout_secs))
            .connect_timeout(Duration::from_secs(api.connect_timeout_secs))
            .build()
            .map_err(|e| DeckError::Config(format!("HTTP client build failed: {}", e)))?;

        Ok(ApiClient {
            http,
            base_url: Self::normalize_base(&api.base_url)?,
            token: api.token.clone(),
            retry,
        })
    }

    pub fn from_config(api: &ApiConfig, query: &QueryConfig) -> Result<Self, DeckError> {
        Self::new(api, RetryPolicy::from_config(query))
    }

    // Url::join drops the last path segment unless the base ends in '/'
    fn normalize_base(base_url: &str) -> Result<Url, DeckError> {
        let mut base = base_url.trim().to_owned();
        if !base.ends_with('/') {
            base.push('/');
        }
        Url::parse(&base)
            .map_err(|e| DeckError::Config(format!("Invalid base URL '{}': {}", base_url, e)))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn url_for(&self, path: &str) -> Result<Url, DeckError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| DeckError::Config(format!("Invalid endpoint path '{}': {}", path, e)))
    }

    /// A typed listing endpoint under this client's base URL.
    pub fn endpoint<T>(&self, path: &str) -> Endpoint<T> {
        Endpoint {
            client: self.clone(),
            path: path.to_owned(),
            _items: PhantomData,
        }
    }

    /// GET `path` and decode the envelope, retrying transport failures per
    /// the client's policy.
    pub async fn get_envelope(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<Envelope, DeckError> {
        let url = self.url_for(path)?;
        self.retry
            .run(|| self.get_envelope_once(url.clone(), query))
            .await
    }

    async fn get_envelope_once(
        &self,
        url: Url,
        query: &[(String, String)],
    ) -> Result<Envelope, DeckError> {
        let _tmr = timer!(Level::Trace; "ApiClient::get_envelope", "{}", url);

        let mut request = self.http.get(url.clone()).query(query);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        // Keep the HTTP error around: a failing status with a readable
        // envelope still reports the server's own message.
        let status_error = response.error_for_status_ref().err();
        let body = response.bytes().await?;
        debug!("GET {} -> {} ({} bytes)", url, status, body.len());

        match Envelope::parse(&body) {
            Ok(envelope) => Ok(envelope),
            Err(parse_error) => match status_error {
                Some(http_error) => Err(DeckError::Transport(http_error)),
                None => Err(parse_error),
            },
        }
    }
}

/// One listing endpoint returning items of type `T`.
#[derive(Debug)]
pub struct Endpoint<T> {
    client: ApiClient,
    path: String,
    _items: PhantomData<fn() -> T>,
}

impl<T> Clone for Endpoint<T> {
    fn clone(&self) -> Self {
        Endpoint {
            client: self.client.clone(),
            path: self.path.clone(),
            _items: PhantomData,
        }
    }
}

#[async_trait]
impl<T> PageFetcher<T> for Endpoint<T>
where
    T: DeserializeOwned + Send + 'static,
{
    async fn fetch_page(&self, request: &FetchRequest) -> Result<ResultPage<T>, DeckError> {
        let envelope = self
            .client
            .get_envelope(&self.path, request.params.as_slice())
            .await?;
        envelope.into_page(request.page, request.limit)
    }
}
