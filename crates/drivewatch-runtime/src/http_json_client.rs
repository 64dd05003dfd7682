//! JSON-over-HTTP client with bounded retries shared by the service clients.

use std::time::Duration;

use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::transport_helpers::{
    is_replay_safe_method, parse_retry_after, retry_delay, should_retry_status,
    should_retry_transport_error, truncate_for_error,
};

pub const RETRY_ATTEMPT_HEADER: &str = "x-drivewatch-retry-attempt";

#[derive(Debug, Error)]
pub enum ApiRequestError {
    #[error("{service} api {operation} failed with status {status}: {body}")]
    Status {
        service: &'static str,
        operation: String,
        status: u16,
        body: String,
    },
    #[error("{service} api {operation} request failed")]
    Transport {
        service: &'static str,
        operation: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to decode {service} api {operation} response")]
    Decode {
        service: &'static str,
        operation: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ApiRequestError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport { .. } | Self::Decode { .. } => None,
        }
    }
}

/// Timeout and retry knobs applied to every outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpClientSettings {
    pub request_timeout_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
}

impl Default for HttpClientSettings {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
            retry_max_attempts: 3,
            retry_base_delay_ms: 500,
        }
    }
}

#[derive(Clone)]
pub struct HttpJsonClient {
    http: reqwest::Client,
    service: &'static str,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
}

impl HttpJsonClient {
    pub fn new(
        service: &'static str,
        user_agent: &'static str,
        mut headers: HeaderMap,
        settings: HttpClientSettings,
    ) -> anyhow::Result<Self> {
        headers.insert(
            reqwest::header::USER_AGENT,
            HeaderValue::from_static(user_agent),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(settings.request_timeout_ms.max(1)))
            .build()
            .with_context(|| format!("failed to create {service} api client"))?;
        Ok(Self {
            http,
            service,
            retry_max_attempts: settings.retry_max_attempts.max(1),
            retry_base_delay_ms: settings.retry_base_delay_ms.max(1),
        })
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub async fn request_json<T, F>(&self, operation: &str, builder: F) -> Result<T, ApiRequestError>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let response = self.send_with_retry(operation, builder, None).await?;
        self.decode(operation, response).await
    }

    /// Like [`Self::request_json`] for read-only POST calls such as search queries,
    /// which are retried as freely as a GET.
    pub async fn query_json<T, F>(&self, operation: &str, builder: F) -> Result<T, ApiRequestError>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let response = self.send_with_retry(operation, builder, Some(true)).await?;
        self.decode(operation, response).await
    }

    async fn decode<T: DeserializeOwned>(
        &self,
        operation: &str,
        response: reqwest::Response,
    ) -> Result<T, ApiRequestError> {
        response
            .json::<T>()
            .await
            .map_err(|source| ApiRequestError::Decode {
                service: self.service,
                operation: operation.to_string(),
                source,
            })
    }

    /// Sends a request whose response body is not needed.
    pub async fn request_empty<F>(&self, operation: &str, builder: F) -> Result<(), ApiRequestError>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        self.send_with_retry(operation, builder, None).await.map(|_| ())
    }

    /// `replay_safe` overrides the method-based decision of whether a failed
    /// attempt may be repeated.
    async fn send_with_retry<F>(
        &self,
        operation: &str,
        mut builder: F,
        replay_safe: Option<bool>,
    ) -> Result<reqwest::Response, ApiRequestError>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let request = builder()
                .header(RETRY_ATTEMPT_HEADER, attempt.saturating_sub(1).to_string())
                .build()
                .map_err(|source| ApiRequestError::Transport {
                    service: self.service,
                    operation: operation.to_string(),
                    source,
                })?;
            let replay_safe =
                replay_safe.unwrap_or_else(|| is_replay_safe_method(request.method()));
            let response = self.http.execute(request).await;
            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    let retry_after = parse_retry_after(response.headers());
                    let body = response.text().await.unwrap_or_default();
                    if attempt < self.retry_max_attempts
                        && should_retry_status(status.as_u16(), replay_safe)
                    {
                        tracing::debug!(
                            service = self.service,
                            operation,
                            status = status.as_u16(),
                            attempt,
                            "retrying api request"
                        );
                        tokio::time::sleep(retry_delay(
                            self.retry_base_delay_ms,
                            attempt,
                            retry_after,
                        ))
                        .await;
                        continue;
                    }
                    return Err(ApiRequestError::Status {
                        service: self.service,
                        operation: operation.to_string(),
                        status: status.as_u16(),
                        body: truncate_for_error(&body, 800),
                    });
                }
                Err(error) => {
                    if attempt < self.retry_max_attempts
                        && should_retry_transport_error(&error, replay_safe)
                    {
                        tokio::time::sleep(retry_delay(self.retry_base_delay_ms, attempt, None))
                            .await;
                        continue;
                    }
                    return Err(ApiRequestError::Transport {
                        service: self.service,
                        operation: operation.to_string(),
                        source: error,
                    });
                }
            }
        }
    }
}
