//! Per-provider HTTP transport: throttling, timeouts, status classification
//! and bounded retries in one place.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::http_client::{HttpClient, HttpError, HttpErrorKind, HttpRequest, HttpResponse};
use crate::provider::SourceError;
use crate::retry::RetryPolicy;
use crate::throttling::{RateLimitConfig, RateLimiter};

/// Knobs for one provider's transport.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub rate_limit: RateLimitConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

#[derive(Clone)]
pub struct Transport {
    provider: String,
    http_client: Arc<dyn HttpClient>,
    retry: RetryPolicy,
    limiter: RateLimiter,
    request_timeout: Duration,
    headers: BTreeMap<String, String>,
}

impl Transport {
    pub fn new(
        provider: impl Into<String>,
        http_client: Arc<dyn HttpClient>,
        config: TransportConfig,
    ) -> Self {
        Self {
            provider: provider.into(),
            http_client,
            retry: config.retry,
            limiter: RateLimiter::new(config.rate_limit),
            request_timeout: config.request_timeout,
            headers: BTreeMap::from([(String::from("accept"), String::from("application/json"))]),
        }
    }

    /// Adds a header sent with every request from this transport.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub const fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// GETs `url` and decodes the body as JSON.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<T, SourceError> {
        let response = self.get(url, cancel).await?;
        serde_json::from_str(&response.body).map_err(|error| {
            SourceError::data_parsing(format!(
                "failed to parse {} response: {error}",
                self.provider
            ))
        })
    }

    /// GETs `url`, retrying transient failures. Only 2xx responses are returned.
    pub async fn get(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, SourceError> {
        self.retry
            .run(cancel, move |attempt| self.attempt(url, attempt, cancel))
            .await
    }

    async fn attempt(
        &self,
        url: &str,
        attempt: u32,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, SourceError> {
        self.limiter.acquire(cancel).await?;

        debug!(provider = %self.provider, attempt, "sending request");
        let request = self
            .headers
            .iter()
            .fold(HttpRequest::get(url), |request, (name, value)| {
                request.with_header(name.as_str(), value.as_str())
            })
            .with_timeout(self.request_timeout);
        let outcome = tokio::select! {
            _ = cancel.cancelled() => return Err(SourceError::cancelled()),
            outcome = tokio::time::timeout(self.request_timeout, self.http_client.execute(request)) => outcome,
        };

        match outcome {
            Err(_) => Err(SourceError::timeout(format!(
                "{} request exceeded {}s",
                self.provider,
                self.request_timeout.as_secs_f64()
            ))),
            Ok(Err(error)) => Err(classify_http_error(&self.provider, &error)),
            Ok(Ok(response)) => classify_status(&self.provider, response),
        }
    }
}

/// Maps a non-2xx status to its error kind; 2xx passes through.
pub fn classify_status(provider: &str, response: HttpResponse) -> Result<HttpResponse, SourceError> {
    let status = response.status;
    if response.is_success() {
        return Ok(response);
    }

    let message = format!("{provider} returned status {status}");
    Err(match status {
        401 | 403 => SourceError::authentication(message),
        404 => SourceError::not_found(message),
        429 => SourceError::rate_limited(
            message,
            response.header("retry-after").and_then(parse_retry_after),
        ),
        400..=499 => SourceError::invalid_request(message),
        503 => SourceError::service_unavailable(message),
        _ => SourceError::server_error(message),
    })
}

fn classify_http_error(provider: &str, error: &HttpError) -> SourceError {
    match error.kind() {
        HttpErrorKind::Timeout => {
            SourceError::timeout(format!("{provider} request timed out: {}", error.message()))
        }
        HttpErrorKind::Connect | HttpErrorKind::Other => {
            SourceError::network(format!("{provider} transport error: {}", error.message()))
        }
    }
}

/// Delta-seconds form only; HTTP dates are ignored.
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
