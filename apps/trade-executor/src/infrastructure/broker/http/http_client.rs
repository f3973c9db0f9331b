//! HTTP client wrapper with retry logic.
//!
//! Only idempotent GETs are retried. Order POSTs get exactly one attempt,
//! since a retried submission could reach the broker twice.

use std::time::Duration;

use rand::Rng;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::config::{HttpBrokerConfig, RetryConfig};
use super::error::BrokerHttpError;

/// HTTP client for the broker API.
#[derive(Debug, Clone)]
pub struct BrokerHttpClient {
    client: Client,
    base_url: String,
    retry_config: RetryConfig,
}

impl BrokerHttpClient {
    /// Create a new HTTP client from config.
    pub fn new(config: &HttpBrokerConfig) -> Result<Self, BrokerHttpError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BrokerHttpError::Http(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            retry_config: config.retry.clone(),
        })
    }

    /// Broker API base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET and decode JSON, retrying transient failures.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, BrokerHttpError> {
        let url = format!("{}{path}", self.base_url);
        let mut backoff = ExponentialBackoff::new(&self.retry_config);

        loop {
            let response = match self.client.get(&url).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    let err = BrokerHttpError::from_reqwest(&e);
                    if let Some(delay) = backoff.next_backoff() {
                        tracing::warn!(
                            error = %err,
                            delay_ms = delay.as_millis(),
                            attempt = backoff.attempt,
                            "Network error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(give_up(backoff.attempt, err));
                }
            };

            let status = response.status();

            if status.is_success() {
                let text = response
                    .text()
                    .await
                    .map_err(|e| BrokerHttpError::from_reqwest(&e))?;
                return serde_json::from_str(&text)
                    .map_err(|e| BrokerHttpError::JsonParse(e.to_string()));
            }

            let retry_after = retry_after_secs(&response);
            let body = response.text().await.unwrap_or_default();

            match categorize_status(status) {
                ErrorCategory::RateLimited => {
                    if let Some(delay) = backoff.next_backoff() {
                        let delay = retry_after
                            .map_or(delay, Duration::from_secs)
                            .min(self.retry_config.max_backoff);
                        tracing::warn!(
                            url = %url,
                            delay_ms = delay.as_millis(),
                            "Rate limited, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(BrokerHttpError::RateLimited {
                        retry_after_secs: retry_after.unwrap_or(60),
                    });
                }
                ErrorCategory::Retryable => {
                    let err = BrokerHttpError::Api {
                        status: status.as_u16(),
                        message: body,
                    };
                    if let Some(delay) = backoff.next_backoff() {
                        tracing::warn!(
                            error = %err,
                            delay_ms = delay.as_millis(),
                            "Retryable error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(give_up(backoff.attempt, err));
                }
                ErrorCategory::NonRetryable => {
                    return Err(BrokerHttpError::Api {
                        status: status.as_u16(),
                        message: body,
                    });
                }
            }
        }
    }

    /// POST a JSON body once and return the raw response text.
    pub async fn post_text<B: Serialize + Sync + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<String, BrokerHttpError> {
        let url = format!("{}{path}", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| BrokerHttpError::from_reqwest(&e))?;

        let status = response.status();
        if status.is_success() {
            return response
                .text()
                .await
                .map_err(|e| BrokerHttpError::from_reqwest(&e));
        }

        let retry_after = retry_after_secs(&response);
        let message = response.text().await.unwrap_or_default();

        Err(if status == StatusCode::TOO_MANY_REQUESTS {
            BrokerHttpError::RateLimited {
                retry_after_secs: retry_after.unwrap_or(60),
            }
        } else if status.is_client_error() {
            BrokerHttpError::OrderRejected(format!("{}: {message}", status.as_u16()))
        } else {
            BrokerHttpError::Api {
                status: status.as_u16(),
                message,
            }
        })
    }
}

fn retry_after_secs(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get("Retry-After")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
}

fn give_up(attempts: u32, last: BrokerHttpError) -> BrokerHttpError {
    if attempts <= 1 {
        return last;
    }
    BrokerHttpError::MaxRetriesExceeded {
        attempts,
        last_error: last.to_string(),
    }
}

/// Error category for determining retry behavior.
enum ErrorCategory {
    RateLimited,
    Retryable,
    NonRetryable,
}

/// Categorize HTTP status code for retry handling.
const fn categorize_status(status: StatusCode) -> ErrorCategory {
    match status.as_u16() {
        429 => ErrorCategory::RateLimited,
        408 | 500..=599 => ErrorCategory::Retryable,
        _ => ErrorCategory::NonRetryable,
    }
}

/// Exponential backoff with proportional jitter.
struct ExponentialBackoff {
    attempt: u32,
    max_attempts: u32,
    current_backoff: Duration,
    max_backoff: Duration,
    multiplier: f64,
    jitter_factor: f64,
}

impl ExponentialBackoff {
    const fn new(config: &RetryConfig) -> Self {
        Self {
            attempt: 0,
            max_attempts: config.max_attempts,
            current_backoff: config.initial_backoff,
            max_backoff: config.max_backoff,
            multiplier: config.multiplier,
            jitter_factor: config.jitter_factor,
        }
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        self.attempt += 1;
        if self.attempt >= self.max_attempts {
            return None;
        }

        let backoff = self.current_backoff;
        self.current_backoff = Duration::from_secs_f64(
            (self.current_backoff.as_secs_f64() * self.multiplier)
                .min(self.max_backoff.as_secs_f64()),
        );

        Some(self.jittered(backoff))
    }

    fn jittered(&self, backoff: Duration) -> Duration {
        if self.jitter_factor <= 0.0 {
            return backoff;
        }
        let secs = backoff.as_secs_f64();
        let spread = secs * self.jitter_factor;
        let jittered = rand::rng().random_range((secs - spread).max(0.0)..=secs + spread);
        Duration::from_secs_f64(jittered.min(self.max_backoff.as_secs_f64()))
    }
}
