//! Twitter publisher.
//!
//! Posts go to the v2 `/2/tweets` endpoint. Content over the character limit
//! is segmented into a reply thread; the first tweet's id and URL are the
//! canonical result, with every part id preserved. A thread that fails after
//! some tweets went out surfaces as `Partial` so the caller can record what
//! actually reached the platform.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};

use crate::credentials::PlatformCredentials;
use crate::error::PlatformError;
use crate::http::{normalize_base_url, ApiClient, RawResponse};
use crate::segmenter::{self, SegmentError};
use crate::types::{PlatformParams, PublishOutcome};

use super::{PlatformResult, Publisher};

const STANDARD_LIMIT: usize = 280;
const PREMIUM_LIMIT: usize = 4000;

pub struct TwitterPublisher {
    http: ApiClient,
    base_url: String,
}

impl TwitterPublisher {
    pub fn new(http: ApiClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: normalize_base_url(base_url),
        }
    }

    /// Post one tweet, optionally as a reply, returning the new tweet id.
    async fn post_tweet(
        &self,
        text: &str,
        reply_to: Option<&str>,
        token: &str,
    ) -> PlatformResult<String> {
        let mut payload = json!({ "text": text });
        if let Some(id) = reply_to {
            payload["reply"] = json!({ "in_reply_to_tweet_id": id });
        }

        let url = format!("{}/2/tweets", self.base_url);
        let response = self
            .http
            .send_once(Method::POST, &url, Some(token), &[], Some(&payload))
            .await?;
        map_tweet_response(response)
    }
}

#[async_trait]
impl Publisher for TwitterPublisher {
    fn name(&self) -> &str {
        "twitter"
    }

    fn character_limit(&self, params: &PlatformParams) -> usize {
        if params.premium {
            PREMIUM_LIMIT
        } else {
            STANDARD_LIMIT
        }
    }

    fn validate(&self, content: &str, params: &PlatformParams) -> PlatformResult<()> {
        if content.trim().is_empty() {
            return Err(PlatformError::Validation(
                "Tweet content cannot be empty".to_string(),
            ));
        }
        let limit = self.character_limit(params);
        let length = content.chars().count();
        if length <= limit {
            return Ok(());
        }
        if !params.allow_threads() {
            return Err(PlatformError::Validation(format!(
                "Content is {} characters; the limit is {} and threading is disabled",
                length, limit
            )));
        }
        // Confirms the content fits in a thread before any network traffic.
        segmenter::segment(content, limit).map_err(segment_error)?;
        Ok(())
    }

    async fn publish(
        &self,
        content: &str,
        credentials: &PlatformCredentials,
        params: &PlatformParams,
    ) -> PlatformResult<PublishOutcome> {
        self.validate(content, params)?;

        let limit = self.character_limit(params);
        let token = credentials.token();
        let username = &credentials.platform_username;

        if content.chars().count() <= limit {
            let id = self.post_tweet(content, None, token).await?;
            let url = tweet_url(username, &id);
            return Ok(PublishOutcome::single(id, url));
        }

        let fragments = segmenter::segment(content, limit).map_err(segment_error)?;
        let total = fragments.len();
        let mut posted_ids: Vec<String> = Vec::with_capacity(total);

        for (index, fragment) in fragments.iter().enumerate() {
            let reply_to = posted_ids.last().map(String::as_str);
            match self.post_tweet(fragment, reply_to, token).await {
                Ok(id) => posted_ids.push(id),
                Err(err) if posted_ids.is_empty() => return Err(err),
                Err(err) => {
                    let first_url = tweet_url(username, &posted_ids[0]);
                    return Err(PlatformError::Partial {
                        message: format!(
                            "Thread failed at tweet {}/{}: {}",
                            index + 1,
                            total,
                            err
                        ),
                        posted_ids,
                        first_url: Some(first_url),
                    });
                }
            }
        }

        let first_id = posted_ids[0].clone();
        let url = tweet_url(username, &first_id);
        Ok(PublishOutcome {
            post_id: first_id,
            url,
            part_ids: posted_ids,
            published_at: chrono::Utc::now().timestamp(),
        })
    }
}

fn map_tweet_response(response: RawResponse) -> PlatformResult<String> {
    match response.status {
        201 => response
            .body
            .pointer("/data/id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| PlatformError::Api {
                status: 201,
                message: "Tweet created but response carried no id".to_string(),
            }),
        401 => Err(PlatformError::Authentication(
            "Twitter access token expired or invalid".to_string(),
        )),
        429 => {
            let now = chrono::Utc::now().timestamp();
            Err(PlatformError::RateLimited {
                message: "Twitter rate limit exceeded".to_string(),
                wait_secs: response.wait_hint(now),
            })
        }
        403 => Err(PlatformError::Api {
            status: 403,
            message: format!(
                "Twitter rejected the tweet (permissions): {}",
                body_detail(&response.body)
            ),
        }),
        400 if is_duplicate(&response.body) => Err(PlatformError::Duplicate(
            "Twitter rejected the tweet as duplicate content".to_string(),
        )),
        status => Err(PlatformError::Api {
            status,
            message: body_detail(&response.body),
        }),
    }
}

fn is_duplicate(body: &Value) -> bool {
    body.to_string().to_lowercase().contains("duplicate")
}

fn body_detail(body: &Value) -> String {
    body.pointer("/detail")
        .or_else(|| body.pointer("/errors/0/message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}

fn segment_error(err: SegmentError) -> PlatformError {
    PlatformError::Validation(err.to_string())
}

/// Public tweet URL. Usernames are stored with or without the leading '@'.
fn tweet_url(username: &str, tweet_id: &str) -> String {
    format!(
        "https://twitter.com/{}/status/{}",
        username.trim_start_matches('@'),
        tweet_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::BackoffPolicy;

    fn publisher() -> TwitterPublisher {
        TwitterPublisher::new(
            ApiClient::new(BackoffPolicy::default()).unwrap(),
            "https://api.twitter.com/",
        )
    }

    #[test]
    fn test_character_limit_standard_and_premium() {
        let publisher = publisher();
        assert_eq!(publisher.character_limit(&PlatformParams::default()), 280);

        let premium = PlatformParams {
            premium: true,
            ..Default::default()
        };
        assert_eq!(publisher.character_limit(&premium), 4000);
    }

    #[test]
    fn test_validate_rejects_empty() {
        let publisher = publisher();
        let result = publisher.validate("   ", &PlatformParams::default());
        assert!(matches!(result, Err(PlatformError::Validation(_))));
    }

    #[test]
    fn test_validate_accepts_within_limit() {
        let publisher = publisher();
        assert!(publisher
            .validate("short tweet", &PlatformParams::default())
            .is_ok());
    }

    #[test]
    fn test_validate_over_limit_without_threads() {
        let publisher = publisher();
        let params = PlatformParams {
            allow_threads: Some(false),
            ..Default::default()
        };
        let long = "a".repeat(300);
        let result = publisher.validate(&long, &params);
        assert!(matches!(result, Err(PlatformError::Validation(_))));
    }

    #[test]
    fn test_validate_over_limit_with_threads() {
        let publisher = publisher();
        let long = "word ".repeat(100);
        assert!(publisher.validate(&long, &PlatformParams::default()).is_ok());
    }

    #[test]
    fn test_tweet_url_strips_at_sign() {
        assert_eq!(
            tweet_url("@jess", "123"),
            "https://twitter.com/jess/status/123"
        );
        assert_eq!(
            tweet_url("jess", "123"),
            "https://twitter.com/jess/status/123"
        );
    }

    #[test]
    fn test_map_response_created() {
        let response = RawResponse {
            status: 201,
            retry_after: None,
            rate_limit_reset: None,
            body: serde_json::json!({"data": {"id": "1790"}}),
        };
        assert_eq!(map_tweet_response(response).unwrap(), "1790");
    }

    #[test]
    fn test_map_response_auth() {
        let response = RawResponse {
            status: 401,
            retry_after: None,
            rate_limit_reset: None,
            body: Value::Null,
        };
        assert!(matches!(
            map_tweet_response(response),
            Err(PlatformError::Authentication(_))
        ));
    }

    #[test]
    fn test_map_response_rate_limited_carries_hint() {
        let response = RawResponse {
            status: 429,
            retry_after: Some(120),
            rate_limit_reset: None,
            body: Value::Null,
        };
        match map_tweet_response(response) {
            Err(PlatformError::RateLimited { wait_secs, .. }) => {
                assert_eq!(wait_secs, Some(120));
            }
            other => panic!("expected RateLimited, got {:?}", other),
        }
    }

    #[test]
    fn test_map_response_duplicate() {
        let response = RawResponse {
            status: 400,
            retry_after: None,
            rate_limit_reset: None,
            body: serde_json::json!({"detail": "You are not allowed to create a Tweet with duplicate content."}),
        };
        assert!(matches!(
            map_tweet_response(response),
            Err(PlatformError::Duplicate(_))
        ));
    }

    #[test]
    fn test_map_response_plain_400() {
        let response = RawResponse {
            status: 400,
            retry_after: None,
            rate_limit_reset: None,
            body: serde_json::json!({"detail": "Bad request"}),
        };
        assert!(matches!(
            map_tweet_response(response),
            Err(PlatformError::Api { status: 400, .. })
        ));
    }
}
