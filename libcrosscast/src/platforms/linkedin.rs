//! LinkedIn publisher.
//!
//! Publishes UGC posts on behalf of the authenticated member. The member URN
//! is resolved from `/v2/me` at publish time rather than stored, so a
//! reconnected account never posts under a stale identity. LinkedIn has no
//! thread concept; over-limit content is a validation error.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};

use crate::credentials::PlatformCredentials;
use crate::error::PlatformError;
use crate::http::{normalize_base_url, ApiClient, RawResponse};
use crate::types::{PlatformParams, PublishOutcome};

use super::{PlatformResult, Publisher};

const MAX_TEXT_LENGTH: usize = 3000;

/// Required on every Rest.li call.
const RESTLI_HEADER: (&str, &str) = ("X-Restli-Protocol-Version", "2.0.0");

pub struct LinkedinPublisher {
    http: ApiClient,
    base_url: String,
}

impl LinkedinPublisher {
    pub fn new(http: ApiClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: normalize_base_url(base_url),
        }
    }

    /// Resolve the member URN for the token's owner.
    async fn member_urn(&self, token: &str) -> PlatformResult<String> {
        let url = format!("{}/v2/me", self.base_url);
        let response = self
            .http
            .send_once_with_headers(Method::GET, &url, Some(token), &[], None, &[RESTLI_HEADER])
            .await?;

        match response.status {
            200 => response
                .body
                .get("id")
                .and_then(Value::as_str)
                .map(|id| format!("urn:li:person:{}", id))
                .ok_or_else(|| PlatformError::Api {
                    status: 200,
                    message: "LinkedIn profile response carried no id".to_string(),
                }),
            401 => Err(PlatformError::Authentication(
                "LinkedIn access token expired or invalid".to_string(),
            )),
            status => Err(PlatformError::Api {
                status,
                message: format!("Failed to resolve LinkedIn member: {}", response.body),
            }),
        }
    }
}

#[async_trait]
impl Publisher for LinkedinPublisher {
    fn name(&self) -> &str {
        "linkedin"
    }

    fn character_limit(&self, _params: &PlatformParams) -> usize {
        MAX_TEXT_LENGTH
    }

    fn validate(&self, content: &str, params: &PlatformParams) -> PlatformResult<()> {
        if content.trim().is_empty() {
            return Err(PlatformError::Validation(
                "LinkedIn post content cannot be empty".to_string(),
            ));
        }
        let length = content.chars().count();
        let limit = self.character_limit(params);
        if length > limit {
            return Err(PlatformError::Validation(format!(
                "Content is {} characters; the LinkedIn limit is {}",
                length, limit
            )));
        }
        if let Some(visibility) = params.visibility.as_deref() {
            if visibility != "PUBLIC" && visibility != "CONNECTIONS" {
                return Err(PlatformError::Validation(format!(
                    "Invalid LinkedIn visibility '{}'; expected PUBLIC or CONNECTIONS",
                    visibility
                )));
            }
        }
        Ok(())
    }

    async fn publish(
        &self,
        content: &str,
        credentials: &PlatformCredentials,
        params: &PlatformParams,
    ) -> PlatformResult<PublishOutcome> {
        self.validate(content, params)?;

        let token = credentials.token();
        let author = self.member_urn(token).await?;
        let visibility = params.visibility.as_deref().unwrap_or("PUBLIC");

        let payload = json!({
            "author": author,
            "lifecycleState": "PUBLISHED",
            "specificContent": {
                "com.linkedin.ugc.ShareContent": {
                    "shareCommentary": { "text": content },
                    "shareMediaCategory": "NONE"
                }
            },
            "visibility": {
                "com.linkedin.ugc.MemberNetworkVisibility": visibility
            }
        });

        let url = format!("{}/v2/ugcPosts", self.base_url);
        let response = self
            .http
            .send_once_with_headers(
                Method::POST,
                &url,
                Some(token),
                &[],
                Some(&payload),
                &[RESTLI_HEADER],
            )
            .await?;

        let urn = map_share_response(response)?;
        let post_url = share_url(&urn);
        Ok(PublishOutcome::single(urn, post_url))
    }
}

fn map_share_response(response: RawResponse) -> PlatformResult<String> {
    match response.status {
        201 => response
            .body
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| PlatformError::Api {
                status: 201,
                message: "LinkedIn share created but response carried no id".to_string(),
            }),
        401 => Err(PlatformError::Authentication(
            "LinkedIn access token expired or invalid".to_string(),
        )),
        429 => {
            let now = chrono::Utc::now().timestamp();
            Err(PlatformError::RateLimited {
                message: "LinkedIn rate limit exceeded".to_string(),
                wait_secs: response.wait_hint(now),
            })
        }
        403 => Err(PlatformError::Api {
            status: 403,
            message: format!(
                "LinkedIn rejected the share (permissions): {}",
                response.body
            ),
        }),
        status => Err(PlatformError::Api {
            status,
            message: response.body.to_string(),
        }),
    }
}

/// Feed URL for a share URN such as `urn:li:share:7123456789`.
fn share_url(urn: &str) -> String {
    format!("https://www.linkedin.com/feed/update/{}", urn)
}
