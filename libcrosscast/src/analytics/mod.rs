//! Analytics fetchers
//!
//! One [`AnalyticsFetcher`] per platform, each returning [`NormalizedMetrics`]
//! so the sync service can store every platform's numbers in the same shape.
//! Derived rates are computed here so all platforms agree on the formulas.

use async_trait::async_trait;

use crate::platforms::PlatformResult;
use crate::types::PlatformKind;

pub mod linkedin;
pub mod meta;
pub mod mock;
pub mod sync;
pub mod twitter;

/// Platform metrics mapped onto a common schema. Metrics a platform does not
/// expose stay zero.
#[derive(Debug, Clone, Default)]
pub struct NormalizedMetrics {
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
    pub reactions: i64,
    pub retweets: i64,
    pub quote_tweets: i64,
    pub impressions: i64,
    pub reach: i64,
    pub clicks: i64,
    pub video_views: i64,
    pub video_watch_time: i64,
    pub engagement_rate: f64,
    pub click_through_rate: f64,
    /// Public URL for the post when the platform reports one.
    pub post_url: Option<String>,
}

/// Fetches per-post metrics from one platform.
#[async_trait]
pub trait AnalyticsFetcher: Send + Sync {
    fn platform(&self) -> PlatformKind;

    /// Fetch current metrics for a post by its platform-side id.
    async fn fetch_post_metrics(&self, platform_post_id: &str)
        -> PlatformResult<NormalizedMetrics>;
}

/// Engagement rate as a percentage of impressions, rounded to 2 decimals.
/// Zero impressions means a zero rate rather than a division error.
pub fn engagement_rate(likes: i64, comments: i64, shares: i64, impressions: i64) -> f64 {
    if impressions <= 0 {
        return 0.0;
    }
    let engagements = (likes + comments + shares) as f64;
    round2(engagements / impressions as f64 * 100.0)
}

/// Click-through rate as a percentage of impressions, rounded to 2 decimals.
pub fn click_through_rate(clicks: i64, impressions: i64) -> f64 {
    if impressions <= 0 {
        return 0.0;
    }
    round2(clicks as f64 / impressions as f64 * 100.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engagement_rate() {
        // (10 + 5 + 5) / 1000 * 100 = 2.0
        assert_eq!(engagement_rate(10, 5, 5, 1000), 2.0);
    }

    #[test]
    fn test_engagement_rate_rounds_to_two_decimals() {
        // 1 / 3 * 100 = 33.333... -> 33.33
        assert_eq!(engagement_rate(1, 0, 0, 3), 33.33);
        // 2 / 3 * 100 = 66.666... -> 66.67
        assert_eq!(engagement_rate(2, 0, 0, 3), 66.67);
    }

    #[test]
    fn test_engagement_rate_zero_impressions() {
        assert_eq!(engagement_rate(100, 50, 25, 0), 0.0);
    }

    #[test]
    fn test_click_through_rate() {
        assert_eq!(click_through_rate(25, 1000), 2.5);
        assert_eq!(click_through_rate(0, 1000), 0.0);
        assert_eq!(click_through_rate(25, 0), 0.0);
    }
}
