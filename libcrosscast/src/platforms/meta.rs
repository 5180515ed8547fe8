//! Meta publisher: Facebook Pages and Instagram business accounts.
//!
//! Both surfaces speak the Graph API with form-encoded POSTs carrying the
//! access token in the body. Facebook is a single feed post; Instagram is the
//! two-step container flow (create media container, wait for processing,
//! publish it). Which surface to use comes from `platform_type` in the post
//! params, defaulting to Facebook.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::credentials::PlatformCredentials;
use crate::error::PlatformError;
use crate::http::{normalize_base_url, ApiClient, RawResponse};
use crate::types::{PlatformParams, PublishOutcome};

use super::{PlatformResult, Publisher};

const FACEBOOK_LIMIT: usize = 63_206;
const INSTAGRAM_LIMIT: usize = 2200;

// Graph API error codes that mean the token is bad or the quota is spent.
const GRAPH_AUTH_CODE: i64 = 190;
const GRAPH_RATE_CODES: [i64; 4] = [4, 17, 32, 613];

pub struct MetaPublisher {
    http: ApiClient,
    base_url: String,
    /// Wait between Instagram container creation and publish.
    container_delay: Duration,
}

impl MetaPublisher {
    pub fn new(http: ApiClient, base_url: &str, container_delay: Duration) -> Self {
        Self {
            http,
            base_url: normalize_base_url(base_url),
            container_delay,
        }
    }

    async fn publish_facebook(
        &self,
        content: &str,
        page_id: &str,
        token: &str,
        link: Option<&str>,
    ) -> PlatformResult<PublishOutcome> {
        let url = format!("{}/{}/feed", self.base_url, page_id);
        let mut form = vec![("message", content), ("access_token", token)];
        if let Some(link) = link {
            form.push(("link", link));
        }

        let response = self.http.post_form_once(&url, &form).await?;
        let post_id = map_graph_response(response, "Facebook")?;
        let post_url = format!("https://www.facebook.com/{}", post_id);
        Ok(PublishOutcome::single(post_id, post_url))
    }

    async fn publish_instagram(
        &self,
        caption: &str,
        account_id: &str,
        token: &str,
        image_url: &str,
    ) -> PlatformResult<PublishOutcome> {
        let container_url = format!("{}/{}/media", self.base_url, account_id);
        let response = self
            .http
            .post_form_once(
                &container_url,
                &[
                    ("image_url", image_url),
                    ("caption", caption),
                    ("access_token", token),
                ],
            )
            .await?;
        let container_id = map_graph_response(response, "Instagram")?;

        // The container needs time to process the image before publish.
        tokio::time::sleep(self.container_delay).await;

        let publish_url = format!("{}/{}/media_publish", self.base_url, account_id);
        let response = self
            .http
            .post_form_once(
                &publish_url,
                &[("creation_id", container_id.as_str()), ("access_token", token)],
            )
            .await?;
        let post_id = map_graph_response(response, "Instagram")?;
        let post_url = format!("https://www.instagram.com/p/{}", post_id);
        Ok(PublishOutcome::single(post_id, post_url))
    }
}

#[async_trait]
impl Publisher for MetaPublisher {
    fn name(&self) -> &str {
        "meta"
    }

    fn character_limit(&self, params: &PlatformParams) -> usize {
        if is_instagram(params) {
            INSTAGRAM_LIMIT
        } else {
            FACEBOOK_LIMIT
        }
    }

    fn validate(&self, content: &str, params: &PlatformParams) -> PlatformResult<()> {
        if content.trim().is_empty() {
            return Err(PlatformError::Validation(
                "Post content cannot be empty".to_string(),
            ));
        }
        match params.platform_type.as_deref() {
            None | Some("facebook") | Some("instagram") => {}
            Some(other) => {
                return Err(PlatformError::Validation(format!(
                    "Unknown Meta platform_type '{}'; expected facebook or instagram",
                    other
                )))
            }
        }
        let limit = self.character_limit(params);
        let length = content.chars().count();
        if length > limit {
            return Err(PlatformError::Validation(format!(
                "Content is {} characters; the limit is {}",
                length, limit
            )));
        }
        if is_instagram(params) && params.image_url.is_none() {
            return Err(PlatformError::Validation(
                "Instagram posts require an image_url".to_string(),
            ));
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
        if is_instagram(params) {
            let account_id = params
                .instagram_account_id
                .as_deref()
                .or(credentials.instagram_account_id.as_deref())
                .ok_or_else(|| {
                    PlatformError::Validation(
                        "No Instagram account id on the post or the connected account"
                            .to_string(),
                    )
                })?;
            // validate() already required image_url
            let image_url = params.image_url.as_deref().ok_or_else(|| {
                PlatformError::Validation("Instagram posts require an image_url".to_string())
            })?;
            self.publish_instagram(content, account_id, token, image_url)
                .await
        } else {
            let page_id = params
                .page_id
                .as_deref()
                .or(credentials.page_id.as_deref())
                .ok_or_else(|| {
                    PlatformError::Validation(
                        "No Facebook page id on the post or the connected account".to_string(),
                    )
                })?;
            self.publish_facebook(content, page_id, token, params.link.as_deref())
                .await
        }
    }
}

fn is_instagram(params: &PlatformParams) -> bool {
    params.platform_type.as_deref() == Some("instagram")
}

/// Pull the created object id out of a Graph API response, or map the error
/// envelope onto the shared taxonomy.
fn map_graph_response(response: RawResponse, surface: &str) -> PlatformResult<String> {
    if response.is_success() {
        return response
            .body
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| PlatformError::Api {
                status: response.status,
                message: format!("{} response carried no id", surface),
            });
    }

    let code = response.body.pointer("/error/code").and_then(Value::as_i64);
    let message = response
        .body
        .pointer("/error/message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| response.body.to_string());

    match (response.status, code) {
        (401, _) => Err(PlatformError::Authentication(format!(
            "{} access token expired or invalid",
            surface
        ))),
        (_, Some(GRAPH_AUTH_CODE)) => Err(PlatformError::Authentication(format!(
            "{} access token expired or invalid: {}",
            surface, message
        ))),
        (_, Some(code)) if GRAPH_RATE_CODES.contains(&code) => {
            let now = chrono::Utc::now().timestamp();
            Err(PlatformError::RateLimited {
                message: format!("{} rate limit exceeded: {}", surface, message),
                wait_secs: response.wait_hint(now),
            })
        }
        (status, _) => Err(PlatformError::Api { status, message }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::BackoffPolicy;

    fn publisher() -> MetaPublisher {
        MetaPublisher::new(
            ApiClient::new(BackoffPolicy::default()).unwrap(),
            "https://graph.facebook.com/v18.0",
            Duration::from_millis(0),
        )
    }

    fn instagram_params() -> PlatformParams {
        PlatformParams {
            platform_type: Some("instagram".to_string()),
            image_url: Some("https://example.com/pic.jpg".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_character_limits_per_surface() {
        let publisher = publisher();
        assert_eq!(publisher.character_limit(&PlatformParams::default()), 63_206);
        assert_eq!(publisher.character_limit(&instagram_params()), 2200);
    }

    #[test]
    fn test_validate_instagram_requires_image() {
        let params = PlatformParams {
            platform_type: Some("instagram".to_string()),
            ..Default::default()
        };
        let result = publisher().validate("caption", &params);
        assert!(matches!(result, Err(PlatformError::Validation(_))));
    }

    #[test]
    fn test_validate_instagram_caption_limit() {
        let result = publisher().validate(&"a".repeat(2201), &instagram_params());
        assert!(matches!(result, Err(PlatformError::Validation(_))));

        assert!(publisher()
            .validate(&"a".repeat(2200), &instagram_params())
            .is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_platform_type() {
        let params = PlatformParams {
            platform_type: Some("threads".to_string()),
            ..Default::default()
        };
        let result = publisher().validate("post", &params);
        assert!(matches!(result, Err(PlatformError::Validation(_))));
    }

    #[test]
    fn test_map_graph_response_success() {
        let response = RawResponse {
            status: 200,
            retry_after: None,
            rate_limit_reset: None,
            body: serde_json::json!({"id": "1234_5678"}),
        };
        assert_eq!(map_graph_response(response, "Facebook").unwrap(), "1234_5678");
    }

    #[test]
    fn test_map_graph_response_expired_token_code() {
        let response = RawResponse {
            status: 400,
            retry_after: None,
            rate_limit_reset: None,
            body: serde_json::json!({"error": {"message": "Error validating access token", "code": 190}}),
        };
        assert!(matches!(
            map_graph_response(response, "Facebook"),
            Err(PlatformError::Authentication(_))
        ));
    }

    #[test]
    fn test_map_graph_response_rate_limit_code() {
        let response = RawResponse {
            status: 400,
            retry_after: None,
            rate_limit_reset: None,
            body: serde_json::json!({"error": {"message": "Application request limit reached", "code": 4}}),
        };
        assert!(matches!(
            map_graph_response(response, "Instagram"),
            Err(PlatformError::RateLimited { .. })
        ));
    }

    #[test]
    fn test_map_graph_response_other_error() {
        let response = RawResponse {
            status: 500,
            retry_after: None,
            rate_limit_reset: None,
            body: serde_json::json!({"error": {"message": "unknown", "code": 1}}),
        };
        assert!(matches!(
            map_graph_response(response, "Facebook"),
            Err(PlatformError::Api { status: 500, .. })
        ));
    }
}
