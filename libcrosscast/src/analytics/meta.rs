//! Meta analytics fetcher for Facebook and Instagram posts.
//!
//! The surface is detected from the post id: Facebook post ids are
//! `{page_id}_{post_id}` composites, Instagram media ids are plain numbers.
//! Engagement counts come from the object itself; impressions and reach come
//! from the separate `/insights` edge, which needs extra permissions and is
//! therefore best-effort.

use async_trait::async_trait;
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::error::PlatformError;
use crate::http::{normalize_base_url, ApiClient};
use crate::platforms::PlatformResult;
use crate::types::PlatformKind;

use super::{click_through_rate, engagement_rate, AnalyticsFetcher, NormalizedMetrics};

const FACEBOOK_POST_FIELDS: &str =
    "reactions.summary(total_count),comments.summary(total_count),shares,created_time,message,permalink_url";
const FACEBOOK_INSIGHT_METRICS: &str =
    "post_impressions,post_impressions_unique,post_engaged_users,post_clicks,post_video_views";

const INSTAGRAM_MEDIA_FIELDS: &str =
    "id,media_type,media_url,permalink,timestamp,like_count,comments_count,caption";
const INSTAGRAM_INSIGHT_METRICS: &str = "impressions,reach,engagement,saved,video_views";

pub struct MetaFetcher {
    http: ApiClient,
    base_url: String,
    access_token: SecretString,
}

impl MetaFetcher {
    pub fn new(http: ApiClient, base_url: &str, access_token: SecretString) -> Self {
        Self {
            http,
            base_url: normalize_base_url(base_url),
            access_token,
        }
    }

    async fn fetch_object(&self, object_id: &str, fields: &str) -> PlatformResult<Value> {
        let url = format!("{}/{}", self.base_url, object_id);
        let body = self
            .http
            .request_json(
                Method::GET,
                &url,
                Some(self.access_token.expose_secret()),
                &[("fields", fields)],
                None,
                &[],
                true,
            )
            .await?;

        if body.get("error").is_some() {
            return Err(PlatformError::NotFound(format!(
                "Meta post {} not found",
                object_id
            )));
        }
        Ok(body)
    }

    /// Best-effort insights; metrics read as zero when the edge is denied.
    async fn fetch_insights(&self, object_id: &str, metrics: &str) -> Value {
        let url = format!("{}/{}/insights", self.base_url, object_id);
        let result = self
            .http
            .request_json(
                Method::GET,
                &url,
                Some(self.access_token.expose_secret()),
                &[("metric", metrics)],
                None,
                &[],
                true,
            )
            .await;

        match result {
            Ok(body) => flatten_insights(&body),
            Err(err) => {
                tracing::warn!(object_id, error = %err, "failed to fetch Meta insights");
                Value::Null
            }
        }
    }
}

#[async_trait]
impl AnalyticsFetcher for MetaFetcher {
    fn platform(&self) -> PlatformKind {
        PlatformKind::Meta
    }

    async fn fetch_post_metrics(
        &self,
        platform_post_id: &str,
    ) -> PlatformResult<NormalizedMetrics> {
        if platform_post_id.contains('_') {
            let post = self
                .fetch_object(platform_post_id, FACEBOOK_POST_FIELDS)
                .await?;
            let insights = self
                .fetch_insights(platform_post_id, FACEBOOK_INSIGHT_METRICS)
                .await;
            Ok(parse_facebook_metrics(&post, &insights))
        } else {
            let media = self
                .fetch_object(platform_post_id, INSTAGRAM_MEDIA_FIELDS)
                .await?;
            let insights = self
                .fetch_insights(platform_post_id, INSTAGRAM_INSIGHT_METRICS)
                .await;
            Ok(parse_instagram_metrics(&media, &insights))
        }
    }
}

/// Collapse the insights array into `{name: value}` pairs.
fn flatten_insights(body: &Value) -> Value {
    let mut flat = serde_json::Map::new();
    if let Some(entries) = body.get("data").and_then(Value::as_array) {
        for entry in entries {
            if let Some(name) = entry.get("name").and_then(Value::as_str) {
                let value = entry
                    .pointer("/values/0/value")
                    .cloned()
                    .unwrap_or(Value::from(0));
                flat.insert(name.to_string(), value);
            }
        }
    }
    Value::Object(flat)
}

fn parse_facebook_metrics(post: &Value, insights: &Value) -> NormalizedMetrics {
    let reactions = post
        .pointer("/reactions/summary/total_count")
        .and_then(Value::as_i64)
        .unwrap_or(0);
    let comments = post
        .pointer("/comments/summary/total_count")
        .and_then(Value::as_i64)
        .unwrap_or(0);
    let shares = post
        .pointer("/shares/count")
        .and_then(Value::as_i64)
        .unwrap_or(0);

    let insight = |key: &str| insights.get(key).and_then(Value::as_i64).unwrap_or(0);
    let impressions = insight("post_impressions");
    let reach = insight("post_impressions_unique");
    let clicks = insight("post_clicks");
    let video_views = insight("post_video_views");

    NormalizedMetrics {
        likes: reactions,
        comments,
        shares,
        reactions,
        retweets: 0,
        quote_tweets: 0,
        impressions,
        reach,
        clicks,
        video_views,
        video_watch_time: 0,
        engagement_rate: engagement_rate(reactions, comments, shares, impressions),
        click_through_rate: click_through_rate(clicks, impressions),
        post_url: post
            .get("permalink_url")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

fn parse_instagram_metrics(media: &Value, insights: &Value) -> NormalizedMetrics {
    let likes = media.get("like_count").and_then(Value::as_i64).unwrap_or(0);
    let comments = media
        .get("comments_count")
        .and_then(Value::as_i64)
        .unwrap_or(0);

    let insight = |key: &str| insights.get(key).and_then(Value::as_i64).unwrap_or(0);
    let impressions = insight("impressions");
    let reach = insight("reach");
    let video_views = insight("video_views");

    NormalizedMetrics {
        likes,
        comments,
        // Instagram does not expose share counts
        shares: 0,
        reactions: likes,
        retweets: 0,
        quote_tweets: 0,
        impressions,
        reach,
        // click counts are not in the basic media insights
        clicks: 0,
        video_views,
        video_watch_time: 0,
        engagement_rate: engagement_rate(likes, comments, 0, impressions),
        click_through_rate: 0.0,
        post_url: media
            .get("permalink")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}
