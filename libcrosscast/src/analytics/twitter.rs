//! Twitter analytics fetcher.
//!
//! Reads tweet metrics from `/2/tweets/{id}`. Public metrics are always
//! present; impression and click counts need the non-public or organic
//! metric sets, which only the tweet owner's token can see, so those fall
//! back through non_public then organic then zero.

use async_trait::async_trait;
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::error::PlatformError;
use crate::http::{normalize_base_url, ApiClient};
use crate::platforms::PlatformResult;
use crate::types::PlatformKind;

use super::{click_through_rate, engagement_rate, AnalyticsFetcher, NormalizedMetrics};

const TWEET_FIELDS: &str = "public_metrics,non_public_metrics,organic_metrics,created_at";

pub struct TwitterFetcher {
    http: ApiClient,
    base_url: String,
    access_token: SecretString,
}

impl TwitterFetcher {
    pub fn new(http: ApiClient, base_url: &str, access_token: SecretString) -> Self {
        Self {
            http,
            base_url: normalize_base_url(base_url),
            access_token,
        }
    }
}

#[async_trait]
impl AnalyticsFetcher for TwitterFetcher {
    fn platform(&self) -> PlatformKind {
        PlatformKind::Twitter
    }

    async fn fetch_post_metrics(
        &self,
        platform_post_id: &str,
    ) -> PlatformResult<NormalizedMetrics> {
        let url = format!("{}/2/tweets/{}", self.base_url, platform_post_id);
        let body = self
            .http
            .request_json(
                Method::GET,
                &url,
                Some(self.access_token.expose_secret()),
                &[("tweet.fields", TWEET_FIELDS)],
                None,
                &[],
                true,
            )
            .await?;

        // A 200 with no data object means the tweet is gone or hidden.
        let tweet = body.get("data").ok_or_else(|| {
            PlatformError::NotFound(format!("Tweet {} not found", platform_post_id))
        })?;

        Ok(parse_tweet_metrics(tweet, platform_post_id))
    }
}

fn parse_tweet_metrics(tweet: &Value, tweet_id: &str) -> NormalizedMetrics {
    let public = metric_set(tweet, "public_metrics");
    let non_public = metric_set(tweet, "non_public_metrics");
    let organic = metric_set(tweet, "organic_metrics");

    let likes = public("like_count");
    let retweets = public("retweet_count");
    let replies = public("reply_count");
    let quotes = public("quote_count");
    // Quote tweets are shares too
    let shares = retweets + quotes;

    let mut impressions = non_public("impression_count");
    if impressions == 0 {
        impressions = organic("impression_count");
    }
    let mut url_clicks = non_public("url_link_clicks");
    if url_clicks == 0 {
        url_clicks = organic("url_link_clicks");
    }
    let profile_clicks = non_public("user_profile_clicks");
    let clicks = url_clicks + profile_clicks;

    NormalizedMetrics {
        likes,
        comments: replies,
        shares,
        // Twitter has no separate reaction type
        reactions: likes,
        retweets,
        quote_tweets: quotes,
        impressions,
        // Twitter reports no unique-viewer figure
        reach: impressions,
        clicks,
        video_views: 0,
        video_watch_time: 0,
        engagement_rate: engagement_rate(likes, replies, shares, impressions),
        click_through_rate: click_through_rate(clicks, impressions),
        post_url: Some(format!("https://twitter.com/i/web/status/{}", tweet_id)),
    }
}

/// Reader over one of the tweet's metric objects; absent keys read as zero.
fn metric_set<'a>(tweet: &'a Value, name: &str) -> impl Fn(&str) -> i64 + 'a {
    let set = tweet.get(name).cloned().unwrap_or(Value::Null);
    move |key: &str| set.get(key).and_then(Value::as_i64).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_public_metrics_only() {
        let tweet = json!({
            "id": "1790",
            "public_metrics": {
                "like_count": 42,
                "retweet_count": 7,
                "reply_count": 3,
                "quote_count": 2,
                "bookmark_count": 5
            }
        });
        let metrics = parse_tweet_metrics(&tweet, "1790");

        assert_eq!(metrics.likes, 42);
        assert_eq!(metrics.comments, 3);
        // retweets plus quote tweets
        assert_eq!(metrics.shares, 9);
        assert_eq!(metrics.retweets, 7);
        assert_eq!(metrics.quote_tweets, 2);
        // no owner metrics available
        assert_eq!(metrics.impressions, 0);
        assert_eq!(metrics.engagement_rate, 0.0);
        assert_eq!(
            metrics.post_url.as_deref(),
            Some("https://twitter.com/i/web/status/1790")
        );
    }

    #[test]
    fn test_parse_with_non_public_metrics() {
        let tweet = json!({
            "public_metrics": {
                "like_count": 10,
                "retweet_count": 5,
                "reply_count": 5,
                "quote_count": 0
            },
            "non_public_metrics": {
                "impression_count": 1000,
                "url_link_clicks": 20,
                "user_profile_clicks": 5
            }
        });
        let metrics = parse_tweet_metrics(&tweet, "1");

        assert_eq!(metrics.impressions, 1000);
        assert_eq!(metrics.reach, 1000);
        assert_eq!(metrics.clicks, 25);
        // (10 + 5 + 5) / 1000 * 100
        assert_eq!(metrics.engagement_rate, 2.0);
        assert_eq!(metrics.click_through_rate, 2.5);
    }

    #[test]
    fn test_parse_falls_back_to_organic_metrics() {
        let tweet = json!({
            "public_metrics": { "like_count": 1 },
            "organic_metrics": {
                "impression_count": 500,
                "url_link_clicks": 10
            }
        });
        let metrics = parse_tweet_metrics(&tweet, "1");

        assert_eq!(metrics.impressions, 500);
        assert_eq!(metrics.clicks, 10);
    }
}
