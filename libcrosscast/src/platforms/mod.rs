//! Platform publishers
//!
//! One [`Publisher`] per platform, all speaking the shared error taxonomy so
//! the orchestration layer can branch on outcomes without knowing which
//! platform it is talking to. Publishers make a single attempt per call;
//! retry policy lives with the caller.

use async_trait::async_trait;

use crate::credentials::PlatformCredentials;
use crate::error::PlatformError;
use crate::types::{PlatformKind, PlatformParams, PublishOutcome};

pub mod linkedin;
pub mod meta;
pub mod twitter;

// Mock publisher is available for all builds (not just tests) to support
// integration tests
pub mod mock;

pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

/// Unified publishing interface.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Lowercase platform identifier (e.g. "twitter").
    fn name(&self) -> &str;

    /// Effective character limit for a single post under these params.
    fn character_limit(&self, params: &PlatformParams) -> usize;

    /// Check content and params before any network traffic.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Validation` when the content cannot be
    /// published under these params (too long with threading disabled,
    /// missing required params, empty content).
    fn validate(&self, content: &str, params: &PlatformParams) -> PlatformResult<()>;

    /// Publish `content` with the given credentials.
    ///
    /// Multi-part publishes that fail after some parts went out return
    /// `PlatformError::Partial` carrying the ids that did post.
    async fn publish(
        &self,
        content: &str,
        credentials: &PlatformCredentials,
        params: &PlatformParams,
    ) -> PlatformResult<PublishOutcome>;
}

/// Owns one publisher per platform, built from config.
pub struct PublisherRegistry {
    twitter: std::sync::Arc<dyn Publisher>,
    linkedin: std::sync::Arc<dyn Publisher>,
    meta: std::sync::Arc<dyn Publisher>,
}

impl PublisherRegistry {
    pub fn new(
        http: crate::http::ApiClient,
        endpoints: &crate::config::EndpointsConfig,
        instagram_container_delay: std::time::Duration,
    ) -> Self {
        Self {
            twitter: std::sync::Arc::new(twitter::TwitterPublisher::new(
                http.clone(),
                &endpoints.twitter_base_url,
            )),
            linkedin: std::sync::Arc::new(linkedin::LinkedinPublisher::new(
                http.clone(),
                &endpoints.linkedin_base_url,
            )),
            meta: std::sync::Arc::new(meta::MetaPublisher::new(
                http,
                &endpoints.meta_base_url,
                instagram_container_delay,
            )),
        }
    }

    pub fn get(&self, platform: PlatformKind) -> std::sync::Arc<dyn Publisher> {
        match platform {
            PlatformKind::Twitter => self.twitter.clone(),
            PlatformKind::Linkedin => self.linkedin.clone(),
            PlatformKind::Meta => self.meta.clone(),
        }
    }
}
