//! Shared HTTP plumbing for platform publishers and analytics fetchers.
//!
//! Two call styles: [`ApiClient::request_json`] retries timeouts and rate
//! limits internally (fetcher traffic), while [`ApiClient::send_once`] makes
//! a single attempt and hands the raw status back (publisher traffic, where
//! retry happens at the orchestration level).

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::Method;
use serde_json::Value;

use crate::error::PlatformError;
use crate::retry::BackoffPolicy;

/// A single platform API response with the pieces callers branch on.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub retry_after: Option<u64>,
    pub rate_limit_reset: Option<i64>,
    pub body: Value,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Wait hint in seconds, preferring Retry-After over the reset timestamp.
    pub fn wait_hint(&self, now_epoch: i64) -> Option<u64> {
        self.retry_after.or_else(|| {
            self.rate_limit_reset
                .map(|reset| reset.saturating_sub(now_epoch).max(0) as u64)
        })
    }
}

#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    policy: BackoffPolicy,
}

impl ApiClient {
    pub fn new(policy: BackoffPolicy) -> Result<Self, PlatformError> {
        let client = reqwest::Client::builder()
            .timeout(policy.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent("crosscast/0.2")
            .build()
            .map_err(|e| PlatformError::Network(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, policy })
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Single attempt, raw result. Timeouts and connection failures map to
    /// `Timeout`/`Network`; HTTP statuses are the caller's to interpret.
    pub async fn send_once(
        &self,
        method: Method,
        url: &str,
        bearer: Option<&str>,
        query: &[(&str, &str)],
        json: Option<&Value>,
    ) -> Result<RawResponse, PlatformError> {
        self.send_once_with_headers(method, url, bearer, query, json, &[])
            .await
    }

    /// [`send_once`](Self::send_once) plus extra request headers, for APIs
    /// that demand protocol headers beyond the bearer token.
    pub async fn send_once_with_headers(
        &self,
        method: Method,
        url: &str,
        bearer: Option<&str>,
        query: &[(&str, &str)],
        json: Option<&Value>,
        headers: &[(&str, &str)],
    ) -> Result<RawResponse, PlatformError> {
        let mut req = self.client.request(method, url);
        if let Some(token) = bearer {
            req = req.bearer_auth(token);
        }
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(body) = json {
            req = req.json(body);
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                PlatformError::Timeout(format!("request to {} timed out", url))
            } else {
                PlatformError::Network(format!("request to {} failed: {}", url, e))
            }
        })?;

        let status = response.status().as_u16();
        let retry_after = parse_retry_after(response.headers());
        let rate_limit_reset = parse_rate_limit_reset(response.headers());
        let text = response
            .text()
            .await
            .map_err(|e| PlatformError::Network(format!("failed to read response body: {}", e)))?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        Ok(RawResponse {
            status,
            retry_after,
            rate_limit_reset,
            body,
        })
    }

    /// Single form-encoded POST (OAuth token endpoints).
    pub async fn post_form_once(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<RawResponse, PlatformError> {
        let response = self
            .client
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PlatformError::Timeout(format!("request to {} timed out", url))
                } else {
                    PlatformError::Network(format!("request to {} failed: {}", url, e))
                }
            })?;

        let status = response.status().as_u16();
        let retry_after = parse_retry_after(response.headers());
        let rate_limit_reset = parse_rate_limit_reset(response.headers());
        let text = response
            .text()
            .await
            .map_err(|e| PlatformError::Network(format!("failed to read response body: {}", e)))?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        Ok(RawResponse {
            status,
            retry_after,
            rate_limit_reset,
            body,
        })
    }

    /// Retrying request with the standard status mapping: 401 and 403 are
    /// auth failures, 404 is not-found, 429 waits and retries until the
    /// attempt budget runs out, timeouts retry on the exponential schedule.
    /// Any other non-2xx becomes `Api`.
    pub async fn request_json(
        &self,
        method: Method,
        url: &str,
        bearer: Option<&str>,
        query: &[(&str, &str)],
        json: Option<&Value>,
        headers: &[(&str, &str)],
        retry_on_rate_limit: bool,
    ) -> Result<Value, PlatformError> {
        let max_retries = self.policy.max_retries;
        let mut attempt: u32 = 0;

        loop {
            let result = self
                .send_once_with_headers(method.clone(), url, bearer, query, json, headers)
                .await;

            let response = match result {
                Ok(r) => r,
                Err(PlatformError::Timeout(msg)) => {
                    if attempt < max_retries {
                        tracing::warn!(url, attempt, "request timed out, retrying");
                        tokio::time::sleep(self.policy.delay_for_attempt(attempt)).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(PlatformError::Timeout(msg));
                }
                Err(other) => return Err(other),
            };

            if response.is_success() {
                return Ok(response.body);
            }

            match response.status {
                401 | 403 => {
                    return Err(PlatformError::Authentication(format!(
                        "access token rejected by {}",
                        url
                    )))
                }
                404 => {
                    return Err(PlatformError::NotFound(format!(
                        "resource not found at {}",
                        url
                    )))
                }
                429 => {
                    let now = chrono::Utc::now().timestamp();
                    let hint = response.wait_hint(now);
                    if retry_on_rate_limit && attempt < max_retries {
                        let wait = self.policy.rate_limit_wait(
                            response.retry_after,
                            response.rate_limit_reset,
                            now,
                            attempt,
                        );
                        tracing::warn!(url, attempt, wait_secs = wait.as_secs(), "rate limited, waiting");
                        tokio::time::sleep(wait).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(PlatformError::RateLimited {
                        message: format!("rate limit exceeded at {}", url),
                        wait_secs: hint,
                    });
                }
                status => {
                    return Err(PlatformError::Api {
                        status,
                        message: truncate_body(&response.body),
                    })
                }
            }
        }
    }
}

fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}

fn parse_rate_limit_reset(headers: &HeaderMap) -> Option<i64> {
    // Twitter spells it x-rate-limit-reset; most others use x-ratelimit-reset.
    ["x-rate-limit-reset", "x-ratelimit-reset"]
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}

fn truncate_body(body: &Value) -> String {
    let text = body.to_string();
    // Cut on a char boundary; byte 512 may land inside a multibyte char.
    match text.char_indices().nth(512) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text,
    }
}

/// Trim trailing slashes so joined paths never double up.
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}
