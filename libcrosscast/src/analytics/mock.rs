//! Mock analytics fetcher for testing

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::PlatformError;
use crate::platforms::PlatformResult;
use crate::types::PlatformKind;

use super::{AnalyticsFetcher, NormalizedMetrics};

/// Configurable fetcher that returns a fixed result or error and records the
/// post ids it was asked about.
pub struct MockFetcher {
    platform: PlatformKind,
    result: Result<NormalizedMetrics, PlatformError>,
    requested_ids: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn returning(platform: PlatformKind, metrics: NormalizedMetrics) -> Self {
        Self {
            platform,
            result: Ok(metrics),
            requested_ids: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(platform: PlatformKind, error: PlatformError) -> Self {
        Self {
            platform,
            result: Err(error),
            requested_ids: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn rate_limited(platform: PlatformKind) -> Self {
        Self::failing(
            platform,
            PlatformError::RateLimited {
                message: "Mock rate limit".to_string(),
                wait_secs: Some(60),
            },
        )
    }

    pub fn requested_ids(&self) -> Vec<String> {
        self.requested_ids.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requested_ids.lock().unwrap().len()
    }
}

#[async_trait]
impl AnalyticsFetcher for MockFetcher {
    fn platform(&self) -> PlatformKind {
        self.platform
    }

    async fn fetch_post_metrics(
        &self,
        platform_post_id: &str,
    ) -> PlatformResult<NormalizedMetrics> {
        self.requested_ids
            .lock()
            .unwrap()
            .push(platform_post_id.to_string());
        self.result.clone().map_err(|e| e)
    }
}
