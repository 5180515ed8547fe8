//! Mock publisher for testing
//!
//! A configurable publisher that simulates successes, failures, delays and
//! fail-then-recover sequences, so scheduler and orchestration tests can run
//! without platform credentials or network access.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::credentials::PlatformCredentials;
use crate::error::PlatformError;
use crate::types::{PlatformParams, PublishOutcome};

use super::{PlatformResult, Publisher};

/// Configuration for mock publisher behavior
#[derive(Clone)]
pub struct MockConfig {
    /// Publisher name reported by `name()`
    pub name: String,

    /// Error to return from publish; `None` means success
    pub publish_error: Option<PlatformError>,

    /// Fail this many publishes before succeeding (overrides `publish_error`
    /// once spent)
    pub fail_first: usize,

    /// Delay before completing operations (simulates network latency)
    pub delay: Duration,

    /// Character limit enforced by `validate`
    pub character_limit: usize,

    /// Number of times publish has been called
    pub publish_call_count: Arc<Mutex<usize>>,

    /// Content that was published (for verification)
    pub published_content: Arc<Mutex<Vec<String>>>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            publish_error: None,
            fail_first: 0,
            delay: Duration::from_millis(0),
            character_limit: 280,
            publish_call_count: Arc::new(Mutex::new(0)),
            published_content: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

/// Mock publisher for testing
pub struct MockPublisher {
    config: MockConfig,
}

impl MockPublisher {
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    /// A publisher that always succeeds
    pub fn success() -> Self {
        Self::new(MockConfig::default())
    }

    /// A publisher that always fails with the given error
    pub fn failing(error: PlatformError) -> Self {
        Self::new(MockConfig {
            publish_error: Some(error),
            ..Default::default()
        })
    }

    /// A publisher that fails authentication
    pub fn auth_failure() -> Self {
        Self::failing(PlatformError::Authentication(
            "Mock token rejected".to_string(),
        ))
    }

    /// A publisher that fails `n` times, then succeeds
    pub fn fail_then_succeed(n: usize, error: PlatformError) -> Self {
        Self::new(MockConfig {
            publish_error: Some(error),
            fail_first: n,
            ..Default::default()
        })
    }

    /// A publisher with simulated latency
    pub fn with_delay(delay: Duration) -> Self {
        Self::new(MockConfig {
            delay,
            ..Default::default()
        })
    }

    pub fn publish_call_count(&self) -> usize {
        *self.config.publish_call_count.lock().unwrap()
    }

    pub fn published_content(&self) -> Vec<String> {
        self.config.published_content.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn character_limit(&self, _params: &PlatformParams) -> usize {
        self.config.character_limit
    }

    fn validate(&self, content: &str, _params: &PlatformParams) -> PlatformResult<()> {
        if content.trim().is_empty() {
            return Err(PlatformError::Validation(
                "Content cannot be empty".to_string(),
            ));
        }
        let length = content.chars().count();
        if length > self.config.character_limit {
            return Err(PlatformError::Validation(format!(
                "Content exceeds {} character limit (got {} characters)",
                self.config.character_limit, length
            )));
        }
        Ok(())
    }

    async fn publish(
        &self,
        content: &str,
        _credentials: &PlatformCredentials,
        params: &PlatformParams,
    ) -> PlatformResult<PublishOutcome> {
        let call = {
            let mut count = self.config.publish_call_count.lock().unwrap();
            *count += 1;
            *count
        };

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        self.validate(content, params)?;

        if let Some(error) = &self.config.publish_error {
            // fail_first == 0 means fail forever
            if self.config.fail_first == 0 || call <= self.config.fail_first {
                return Err(error.clone());
            }
        }

        self.config
            .published_content
            .lock()
            .unwrap()
            .push(content.to_string());

        let post_id = format!("{}-{}", self.config.name, uuid::Uuid::new_v4());
        let url = format!("https://example.com/{}/{}", self.config.name, post_id);
        Ok(PublishOutcome::single(post_id, url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn credentials() -> PlatformCredentials {
        PlatformCredentials {
            access_token: SecretString::from("mock-token".to_string()),
            platform_username: "mockuser".to_string(),
            page_id: None,
            instagram_account_id: None,
        }
    }

    #[tokio::test]
    async fn test_mock_success() {
        let publisher = MockPublisher::success();
        assert_eq!(publisher.name(), "mock");

        let outcome = publisher
            .publish("Test content", &credentials(), &PlatformParams::default())
            .await
            .unwrap();
        assert!(outcome.post_id.starts_with("mock-"));
        assert_eq!(publisher.publish_call_count(), 1);
        assert_eq!(publisher.published_content(), vec!["Test content"]);
    }

    #[tokio::test]
    async fn test_mock_auth_failure() {
        let publisher = MockPublisher::auth_failure();
        let result = publisher
            .publish("Test", &credentials(), &PlatformParams::default())
            .await;
        assert!(matches!(result, Err(PlatformError::Authentication(_))));
        assert_eq!(publisher.publish_call_count(), 1);
        assert!(publisher.published_content().is_empty());
    }

    #[tokio::test]
    async fn test_mock_fail_then_succeed() {
        let publisher = MockPublisher::fail_then_succeed(
            2,
            PlatformError::Network("connection reset".to_string()),
        );
        let creds = credentials();
        let params = PlatformParams::default();

        assert!(publisher.publish("a", &creds, &params).await.is_err());
        assert!(publisher.publish("a", &creds, &params).await.is_err());
        assert!(publisher.publish("a", &creds, &params).await.is_ok());
        assert_eq!(publisher.publish_call_count(), 3);
    }

    #[tokio::test]
    async fn test_mock_validates_limit() {
        let publisher = MockPublisher::new(MockConfig {
            character_limit: 10,
            ..Default::default()
        });
        let result = publisher
            .publish(
                "This is way too long",
                &credentials(),
                &PlatformParams::default(),
            )
            .await;
        assert!(matches!(result, Err(PlatformError::Validation(_))));
    }

    #[tokio::test]
    async fn test_mock_with_delay() {
        let publisher = MockPublisher::with_delay(Duration::from_millis(50));
        let start = std::time::Instant::now();
        publisher
            .publish("Test", &credentials(), &PlatformParams::default())
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
