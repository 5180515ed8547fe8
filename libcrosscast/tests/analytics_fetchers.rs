//! Integration tests for the platform analytics fetchers.
//!
//! Each test stands up a `wiremock` server playing the platform API and
//! asserts the normalized metrics that come back, including the best-effort
//! paths where a secondary call fails and the snapshot degrades instead of
//! erroring.

use std::time::Duration;

use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use libcrosscast::analytics::linkedin::LinkedinFetcher;
use libcrosscast::analytics::meta::MetaFetcher;
use libcrosscast::analytics::twitter::TwitterFetcher;
use libcrosscast::analytics::AnalyticsFetcher;
use libcrosscast::error::PlatformError;
use libcrosscast::http::ApiClient;
use libcrosscast::retry::BackoffPolicy;

fn test_client() -> ApiClient {
    ApiClient::new(BackoffPolicy::new(0, 2.0, Duration::from_secs(5)))
        .expect("failed to build test ApiClient")
}

fn token() -> SecretString {
    SecretString::from("test-token".to_string())
}

// ---------------------------------------------------------------------------
// Twitter
// ---------------------------------------------------------------------------

#[tokio::test]
async fn twitter_fetches_owner_metrics() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/2/tweets/1790"))
        .and(query_param(
            "tweet.fields",
            "public_metrics,non_public_metrics,organic_metrics,created_at",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "data": {
                "id": "1790",
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
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = TwitterFetcher::new(test_client(), &server.uri(), token());
    let metrics = fetcher
        .fetch_post_metrics("1790")
        .await
        .expect("fetch should succeed");

    assert_eq!(metrics.likes, 10);
    assert_eq!(metrics.comments, 5);
    assert_eq!(metrics.shares, 5);
    assert_eq!(metrics.impressions, 1000);
    assert_eq!(metrics.clicks, 25);
    assert_eq!(metrics.engagement_rate, 2.0);
    assert_eq!(metrics.click_through_rate, 2.5);
    assert_eq!(
        metrics.post_url.as_deref(),
        Some("https://twitter.com/i/web/status/1790")
    );
}

#[tokio::test]
async fn twitter_response_without_data_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/2/tweets/404404"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "errors": [{"title": "Not Found Error", "detail": "Could not find tweet"}]
        })))
        .mount(&server)
        .await;

    let fetcher = TwitterFetcher::new(test_client(), &server.uri(), token());
    let result = fetcher.fetch_post_metrics("404404").await;

    assert!(matches!(result, Err(PlatformError::NotFound(_))));
}

#[tokio::test]
async fn twitter_rejected_token_is_authentication_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/2/tweets/1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let fetcher = TwitterFetcher::new(test_client(), &server.uri(), token());
    let result = fetcher.fetch_post_metrics("1").await;

    assert!(matches!(result, Err(PlatformError::Authentication(_))));
}

#[tokio::test]
async fn twitter_forbidden_token_is_authentication_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/2/tweets/1"))
        .respond_with(ResponseTemplate::new(403).set_body_json(&json!({
            "title": "Forbidden",
            "detail": "Your token lacks the required scope"
        })))
        .mount(&server)
        .await;

    let fetcher = TwitterFetcher::new(test_client(), &server.uri(), token());
    let result = fetcher.fetch_post_metrics("1").await;

    assert!(matches!(result, Err(PlatformError::Authentication(_))));
}

#[tokio::test]
async fn twitter_server_error_with_multibyte_body_is_api_error() {
    let server = MockServer::start().await;

    // Long error text in a two-byte alphabet; the message gets clipped, the
    // fetch must not panic.
    Mock::given(method("GET"))
        .and(path("/2/tweets/1"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(&json!({ "detail": "é".repeat(600) })),
        )
        .mount(&server)
        .await;

    let fetcher = TwitterFetcher::new(test_client(), &server.uri(), token());
    let result = fetcher.fetch_post_metrics("1").await;

    match result {
        Err(PlatformError::Api { status, message }) => {
            assert_eq!(status, 500);
            assert!(message.ends_with('…'));
        }
        other => panic!("expected Api error, got {:?}", other),
    }
}

// ---------------------------------------------------------------------------
// LinkedIn
// ---------------------------------------------------------------------------

#[tokio::test]
async fn linkedin_fetches_share_statistics() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/organizationalEntityShareStatistics"))
        .and(query_param("q", "organizationalEntity"))
        .and(query_param("organizationalEntity", "urn:li:organization:42"))
        .and(query_param("shares", "urn:li:share:7123"))
        .and(header("X-Restli-Protocol-Version", "2.0.0"))
        .and(header("LinkedIn-Version", "202401"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "elements": [{
                "totalShareStatistics": {
                    "likeCount": 30,
                    "commentCount": 10,
                    "shareCount": 10,
                    "impressionCount": 2000,
                    "clickCount": 50,
                    "uniqueImpressionsCount": 1500
                }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/ugcPosts/7123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({"videoViews": 250})))
        .mount(&server)
        .await;

    let fetcher = LinkedinFetcher::new(
        test_client(),
        &server.uri(),
        token(),
        Some("urn:li:organization:42".to_string()),
    );
    let metrics = fetcher
        .fetch_post_metrics("urn:li:share:7123")
        .await
        .expect("fetch should succeed");

    assert_eq!(metrics.likes, 30);
    assert_eq!(metrics.impressions, 2000);
    assert_eq!(metrics.reach, 1500);
    assert_eq!(metrics.clicks, 50);
    assert_eq!(metrics.video_views, 250);
    assert_eq!(metrics.engagement_rate, 2.5);
}

#[tokio::test]
async fn linkedin_detail_failure_degrades_to_zero_video_views() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/organizationalEntityShareStatistics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "elements": [{
                "totalShareStatistics": {"likeCount": 3, "impressionCount": 100}
            }]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/ugcPosts/7999"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let fetcher = LinkedinFetcher::new(test_client(), &server.uri(), token(), None);
    let metrics = fetcher
        .fetch_post_metrics("urn:li:share:7999")
        .await
        .expect("stats alone should be enough");

    assert_eq!(metrics.likes, 3);
    assert_eq!(metrics.video_views, 0);
}

#[tokio::test]
async fn linkedin_empty_elements_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/organizationalEntityShareStatistics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({"elements": []})))
        .mount(&server)
        .await;

    let fetcher = LinkedinFetcher::new(test_client(), &server.uri(), token(), None);
    let result = fetcher.fetch_post_metrics("urn:li:share:1").await;

    assert!(matches!(result, Err(PlatformError::NotFound(_))));
}

// ---------------------------------------------------------------------------
// Meta
// ---------------------------------------------------------------------------

#[tokio::test]
async fn meta_fetches_facebook_post_with_insights() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/123_456"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "id": "123_456",
            "reactions": {"summary": {"total_count": 80}},
            "comments": {"summary": {"total_count": 15}},
            "shares": {"count": 5},
            "permalink_url": "https://www.facebook.com/123_456"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/123_456/insights"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "data": [
                {"name": "post_impressions", "values": [{"value": 4000}]},
                {"name": "post_impressions_unique", "values": [{"value": 3000}]},
                {"name": "post_clicks", "values": [{"value": 100}]}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = MetaFetcher::new(test_client(), &server.uri(), token());
    let metrics = fetcher
        .fetch_post_metrics("123_456")
        .await
        .expect("fetch should succeed");

    assert_eq!(metrics.likes, 80);
    assert_eq!(metrics.comments, 15);
    assert_eq!(metrics.shares, 5);
    assert_eq!(metrics.impressions, 4000);
    assert_eq!(metrics.reach, 3000);
    assert_eq!(metrics.clicks, 100);
    assert_eq!(
        metrics.post_url.as_deref(),
        Some("https://www.facebook.com/123_456")
    );
}

#[tokio::test]
async fn meta_fetches_instagram_media_when_insights_denied() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/17900"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "id": "17900",
            "like_count": 200,
            "comments_count": 50,
            "permalink": "https://www.instagram.com/p/abc123/"
        })))
        .mount(&server)
        .await;

    // Insights need extra permissions; a denial degrades the snapshot.
    Mock::given(method("GET"))
        .and(path("/17900/insights"))
        .respond_with(ResponseTemplate::new(403).set_body_json(&json!({
            "error": {"message": "Insufficient permission", "code": 10}
        })))
        .mount(&server)
        .await;

    let fetcher = MetaFetcher::new(test_client(), &server.uri(), token());
    let metrics = fetcher
        .fetch_post_metrics("17900")
        .await
        .expect("media fields alone should be enough");

    assert_eq!(metrics.likes, 200);
    assert_eq!(metrics.comments, 50);
    assert_eq!(metrics.impressions, 0);
    assert_eq!(metrics.engagement_rate, 0.0);
    assert_eq!(
        metrics.post_url.as_deref(),
        Some("https://www.instagram.com/p/abc123/")
    );
}

#[tokio::test]
async fn meta_error_envelope_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/123_999"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "error": {"message": "Unsupported get request", "code": 100}
        })))
        .mount(&server)
        .await;

    let fetcher = MetaFetcher::new(test_client(), &server.uri(), token());
    let result = fetcher.fetch_post_metrics("123_999").await;

    assert!(matches!(result, Err(PlatformError::NotFound(_))));
}
