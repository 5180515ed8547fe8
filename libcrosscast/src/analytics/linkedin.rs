//! LinkedIn analytics fetcher.
//!
//! Share statistics come from `organizationalEntityShareStatistics`, keyed by
//! the organization the account is connected as. A second call for the post
//! details is best-effort; LinkedIn only adds video numbers there, so a
//! failure degrades the snapshot rather than failing the sync.

use async_trait::async_trait;
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::error::PlatformError;
use crate::http::{normalize_base_url, ApiClient};
use crate::platforms::PlatformResult;
use crate::types::PlatformKind;

use super::{click_through_rate, engagement_rate, AnalyticsFetcher, NormalizedMetrics};

const RESTLI_HEADERS: [(&str, &str); 2] = [
    ("X-Restli-Protocol-Version", "2.0.0"),
    ("LinkedIn-Version", "202401"),
];

pub struct LinkedinFetcher {
    http: ApiClient,
    base_url: String,
    access_token: SecretString,
    /// Organization URN the connected account posts as, when known.
    organization_id: Option<String>,
}

impl LinkedinFetcher {
    pub fn new(
        http: ApiClient,
        base_url: &str,
        access_token: SecretString,
        organization_id: Option<String>,
    ) -> Self {
        Self {
            http,
            base_url: normalize_base_url(base_url),
            access_token,
            organization_id,
        }
    }

    async fn fetch_share_statistics(&self, share_urn: &str) -> PlatformResult<Value> {
        let url = format!("{}/v2/organizationalEntityShareStatistics", self.base_url);
        let organization = self
            .organization_id
            .as_deref()
            .unwrap_or("urn:li:organization:0");

        let body = self
            .http
            .request_json(
                Method::GET,
                &url,
                Some(self.access_token.expose_secret()),
                &[
                    ("q", "organizationalEntity"),
                    ("organizationalEntity", organization),
                    ("shares", share_urn),
                ],
                None,
                &RESTLI_HEADERS,
                true,
            )
            .await?;

        body.pointer("/elements/0").cloned().ok_or_else(|| {
            PlatformError::NotFound(format!("LinkedIn post {} not found", share_urn))
        })
    }

    /// Best-effort post details for video metrics.
    async fn fetch_post_details(&self, share_urn: &str) -> Value {
        let post_id = share_urn.rsplit(':').next().unwrap_or(share_urn);
        let url = format!("{}/v2/ugcPosts/{}", self.base_url, post_id);

        match self
            .http
            .request_json(
                Method::GET,
                &url,
                Some(self.access_token.expose_secret()),
                &[],
                None,
                &RESTLI_HEADERS,
                true,
            )
            .await
        {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!(share_urn, error = %err, "failed to fetch LinkedIn post details");
                Value::Null
            }
        }
    }
}

#[async_trait]
impl AnalyticsFetcher for LinkedinFetcher {
    fn platform(&self) -> PlatformKind {
        PlatformKind::Linkedin
    }

    async fn fetch_post_metrics(
        &self,
        platform_post_id: &str,
    ) -> PlatformResult<NormalizedMetrics> {
        let share_stats = self.fetch_share_statistics(platform_post_id).await?;
        let post_details = self.fetch_post_details(platform_post_id).await;
        Ok(parse_share_metrics(&share_stats, &post_details))
    }
}

fn parse_share_metrics(share_stats: &Value, post_details: &Value) -> NormalizedMetrics {
    let totals = share_stats
        .get("totalShareStatistics")
        .cloned()
        .unwrap_or(Value::Null);
    let count = |key: &str| totals.get(key).and_then(Value::as_i64).unwrap_or(0);

    let likes = count("likeCount");
    let comments = count("commentCount");
    let shares = count("shareCount");
    let impressions = count("impressionCount");
    let clicks = count("clickCount");
    let unique_impressions = count("uniqueImpressionsCount");

    let video_views = post_details
        .get("videoViews")
        .and_then(Value::as_i64)
        .unwrap_or(0);

    NormalizedMetrics {
        likes,
        comments,
        shares,
        reactions: likes,
        retweets: 0,
        quote_tweets: 0,
        impressions,
        reach: if unique_impressions > 0 {
            unique_impressions
        } else {
            impressions
        },
        clicks,
        video_views,
        video_watch_time: 0,
        engagement_rate: engagement_rate(likes, comments, shares, impressions),
        click_through_rate: click_through_rate(clicks, impressions),
        post_url: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_share_metrics() {
        let stats = json!({
            "totalShareStatistics": {
                "likeCount": 30,
                "commentCount": 10,
                "shareCount": 10,
                "impressionCount": 2000,
                "clickCount": 50,
                "uniqueImpressionsCount": 1500
            }
        });
        let metrics = parse_share_metrics(&stats, &Value::Null);

        assert_eq!(metrics.likes, 30);
        assert_eq!(metrics.comments, 10);
        assert_eq!(metrics.shares, 10);
        assert_eq!(metrics.impressions, 2000);
        assert_eq!(metrics.reach, 1500);
        assert_eq!(metrics.clicks, 50);
        // (30 + 10 + 10) / 2000 * 100
        assert_eq!(metrics.engagement_rate, 2.5);
        assert_eq!(metrics.click_through_rate, 2.5);
    }

    #[test]
    fn test_parse_reach_falls_back_to_impressions() {
        let stats = json!({
            "totalShareStatistics": {
                "likeCount": 1,
                "impressionCount": 100
            }
        });
        let metrics = parse_share_metrics(&stats, &Value::Null);
        assert_eq!(metrics.reach, 100);
    }

    #[test]
    fn test_parse_video_views_from_details() {
        let stats = json!({"totalShareStatistics": {}});
        let details = json!({"videoViews": 250});
        let metrics = parse_share_metrics(&stats, &details);
        assert_eq!(metrics.video_views, 250);
    }

    #[test]
    fn test_parse_empty_statistics() {
        let metrics = parse_share_metrics(&json!({}), &Value::Null);
        assert_eq!(metrics.likes, 0);
        assert_eq!(metrics.engagement_rate, 0.0);
    }
}
