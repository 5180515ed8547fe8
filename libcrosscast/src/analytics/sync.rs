//! Analytics sync orchestration.
//!
//! Walks a business's published posts, asks the right platform fetcher for
//! current metrics, appends a snapshot row and refreshes the cached counters
//! on the post. A rate-limited platform is dropped for the rest of the run so
//! one throttled API does not burn the whole sync; an authentication failure
//! drops the platform too, since every later call would fail the same way.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::credentials::CredentialGateway;
use crate::db::Database;
use crate::error::{CrosscastError, PlatformError, Result};
use crate::http::ApiClient;
use crate::types::{PlatformKind, PostAnalytics, PublishedPost, PublishedStatus};

use super::linkedin::LinkedinFetcher;
use super::meta::MetaFetcher;
use super::twitter::TwitterFetcher;
use super::{AnalyticsFetcher, NormalizedMetrics};

#[derive(Debug, Clone, Default, Serialize)]
pub struct PlatformCounts {
    pub synced: usize,
    pub failed: usize,
    pub rate_limited: usize,
}

/// Outcome of one sync run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncSummary {
    pub total_posts: usize,
    pub synced: usize,
    pub failed: usize,
    pub rate_limited: usize,
    pub by_platform: HashMap<PlatformKind, PlatformCounts>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub total_posts: i64,
    pub synced_posts: i64,
    pub unsynced_posts: i64,
    pub last_sync_at: Option<i64>,
    pub sync_percentage: f64,
}

enum FetcherSource {
    /// Build fetchers from the business's connected accounts.
    Live {
        gateway: CredentialGateway,
        http: ApiClient,
        endpoints: crate::config::EndpointsConfig,
    },
    /// Preset fetchers, used by tests.
    Fixed(HashMap<PlatformKind, Arc<dyn AnalyticsFetcher>>),
}

pub struct AnalyticsSyncService {
    db: Database,
    source: FetcherSource,
}

impl AnalyticsSyncService {
    pub fn new(
        db: Database,
        gateway: CredentialGateway,
        http: ApiClient,
        endpoints: crate::config::EndpointsConfig,
    ) -> Self {
        Self {
            db,
            source: FetcherSource::Live {
                gateway,
                http,
                endpoints,
            },
        }
    }

    pub fn with_fetchers(
        db: Database,
        fetchers: HashMap<PlatformKind, Arc<dyn AnalyticsFetcher>>,
    ) -> Self {
        Self {
            db,
            source: FetcherSource::Fixed(fetchers),
        }
    }

    /// Sync metrics for every published post of a business, optionally
    /// filtered to one platform and capped at `limit` posts.
    pub async fn sync_business(
        &self,
        business_id: &str,
        platform: Option<PlatformKind>,
        limit: Option<i64>,
    ) -> Result<SyncSummary> {
        if !self.db.business_exists(business_id).await? {
            return Err(CrosscastError::InvalidInput(format!(
                "Business {} not found",
                business_id
            )));
        }

        tracing::info!(business_id, "starting analytics sync");

        let mut fetchers = self.build_fetchers(business_id).await?;
        let posts = self
            .db
            .list_published_for_sync(business_id, platform, limit)
            .await?;

        let mut summary = SyncSummary {
            total_posts: posts.len(),
            ..Default::default()
        };

        for post in &posts {
            let counts = summary.by_platform.entry(post.platform).or_default();

            match self.sync_post(&fetchers, post).await {
                Ok(_) => {
                    summary.synced += 1;
                    counts.synced += 1;
                    tracing::debug!(post_id = %post.id, platform = %post.platform, "synced post metrics");
                }
                Err(PlatformError::RateLimited { message, .. }) => {
                    summary.rate_limited += 1;
                    counts.rate_limited += 1;
                    let error = format!(
                        "Rate limited on {} for post {}: {}",
                        post.platform, post.id, message
                    );
                    tracing::warn!("{}", error);
                    summary.errors.push(error);
                    // Stop hitting this platform for the rest of the run
                    fetchers.remove(&post.platform);
                }
                Err(PlatformError::Authentication(message)) => {
                    summary.failed += 1;
                    counts.failed += 1;
                    let error = format!(
                        "Authentication failed on {} for post {}: {}",
                        post.platform, post.id, message
                    );
                    tracing::error!("{}", error);
                    summary.errors.push(error);
                    fetchers.remove(&post.platform);
                }
                Err(err) => {
                    summary.failed += 1;
                    counts.failed += 1;
                    let error =
                        format!("Failed to sync post {} ({}): {}", post.id, post.platform, err);
                    tracing::error!("{}", error);
                    summary.errors.push(error);
                }
            }
        }

        tracing::info!(
            business_id,
            synced = summary.synced,
            total = summary.total_posts,
            "completed analytics sync"
        );
        Ok(summary)
    }

    /// Sync one published post and return the stored snapshot.
    pub async fn sync_single_post(&self, post_id: &str) -> Result<PostAnalytics> {
        let post = self
            .db
            .get_published_post(post_id)
            .await?
            .ok_or_else(|| CrosscastError::InvalidInput(format!("Post {} not found", post_id)))?;

        if post.status != PublishedStatus::Published {
            return Err(CrosscastError::InvalidInput(format!(
                "Post {} is not published (status: {})",
                post_id, post.status
            )));
        }

        let fetchers = self.build_fetchers(&post.business_id).await?;
        let snapshot = self.sync_post(&fetchers, &post).await?;
        Ok(snapshot)
    }

    /// How much of a business's published output has been synced.
    pub async fn sync_status(&self, business_id: &str) -> Result<SyncStatus> {
        let (total, synced, last_sync) = self.db.sync_status_counts(business_id).await?;
        let percentage = if total > 0 {
            (synced as f64 / total as f64 * 10_000.0).round() / 100.0
        } else {
            0.0
        };
        Ok(SyncStatus {
            total_posts: total,
            synced_posts: synced,
            unsynced_posts: total - synced,
            last_sync_at: last_sync,
            sync_percentage: percentage,
        })
    }

    async fn sync_post(
        &self,
        fetchers: &HashMap<PlatformKind, Arc<dyn AnalyticsFetcher>>,
        post: &PublishedPost,
    ) -> std::result::Result<PostAnalytics, PlatformError> {
        let fetcher = fetchers.get(&post.platform).ok_or_else(|| {
            PlatformError::Api {
                status: 0,
                message: format!("No fetcher available for platform {}", post.platform),
            }
        })?;

        let platform_post_id = post.platform_post_id.as_deref().ok_or_else(|| {
            PlatformError::Validation(format!("Post {} has no platform post id", post.id))
        })?;

        let metrics = fetcher.fetch_post_metrics(platform_post_id).await?;
        self.store_snapshot(post, platform_post_id, &metrics)
            .await
            .map_err(|e| PlatformError::Api {
                status: 0,
                message: format!("Failed to store analytics: {}", e),
            })
    }

    async fn store_snapshot(
        &self,
        post: &PublishedPost,
        platform_post_id: &str,
        metrics: &NormalizedMetrics,
    ) -> Result<PostAnalytics> {
        let fetched_at = chrono::Utc::now().timestamp();
        let snapshot = PostAnalytics {
            id: Uuid::new_v4().to_string(),
            published_post_id: post.id.clone(),
            business_id: post.business_id.clone(),
            platform: post.platform,
            likes: metrics.likes,
            comments: metrics.comments,
            shares: metrics.shares,
            reactions: metrics.reactions,
            retweets: metrics.retweets,
            quote_tweets: metrics.quote_tweets,
            impressions: metrics.impressions,
            reach: metrics.reach,
            clicks: metrics.clicks,
            video_views: metrics.video_views,
            video_watch_time: metrics.video_watch_time,
            engagement_rate: metrics.engagement_rate,
            click_through_rate: metrics.click_through_rate,
            platform_post_id: Some(platform_post_id.to_string()),
            platform_post_url: metrics
                .post_url
                .clone()
                .or_else(|| post.platform_post_url.clone()),
            fetched_at,
        };

        self.db.insert_analytics(&snapshot).await?;
        self.db
            .update_cached_metrics(
                &post.id,
                metrics.likes,
                metrics.comments,
                metrics.shares,
                metrics.impressions,
                fetched_at,
            )
            .await?;
        Ok(snapshot)
    }

    async fn build_fetchers(
        &self,
        business_id: &str,
    ) -> Result<HashMap<PlatformKind, Arc<dyn AnalyticsFetcher>>> {
        match &self.source {
            FetcherSource::Fixed(fetchers) => Ok(fetchers.clone()),
            FetcherSource::Live {
                gateway,
                http,
                endpoints,
            } => {
                let mut fetchers: HashMap<PlatformKind, Arc<dyn AnalyticsFetcher>> =
                    HashMap::new();
                let accounts = self.db.list_active_accounts(business_id, None).await?;

                for account in accounts {
                    let (account, credentials) = match gateway.resolve(&account.id).await {
                        Ok(resolved) => resolved,
                        Err(err) => {
                            tracing::warn!(
                                account_id = %account.id,
                                platform = %account.platform,
                                error = %err,
                                "skipping account, could not resolve credentials"
                            );
                            continue;
                        }
                    };

                    let fetcher: Arc<dyn AnalyticsFetcher> = match account.platform {
                        PlatformKind::Twitter => Arc::new(TwitterFetcher::new(
                            http.clone(),
                            &endpoints.twitter_base_url,
                            credentials.access_token,
                        )),
                        PlatformKind::Linkedin => Arc::new(LinkedinFetcher::new(
                            http.clone(),
                            &endpoints.linkedin_base_url,
                            credentials.access_token,
                            credentials.page_id.clone(),
                        )),
                        PlatformKind::Meta => Arc::new(MetaFetcher::new(
                            http.clone(),
                            &endpoints.meta_base_url,
                            credentials.access_token,
                        )),
                    };
                    fetchers.insert(account.platform, fetcher);
                }
                Ok(fetchers)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::mock::MockFetcher;
    use crate::types::SocialAccount;
    use tempfile::TempDir;

    async fn test_db() -> (Database, TempDir) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::new(path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    async fn seed_business(db: &Database) -> String {
        let business_id = "biz-1".to_string();
        db.create_business(&business_id, "Test Business").await.unwrap();
        business_id
    }

    async fn seed_account(db: &Database, business_id: &str, platform: PlatformKind) -> String {
        let account = SocialAccount {
            id: format!("acct-{}", platform),
            business_id: business_id.to_string(),
            platform,
            platform_username: "user".to_string(),
            access_token_enc: "enc".to_string(),
            refresh_token_enc: None,
            token_expiry: None,
            token_version: 0,
            page_id: None,
            instagram_account_id: None,
            is_active: true,
            created_at: chrono::Utc::now().timestamp(),
        };
        db.create_account(&account).await.unwrap();
        account.id
    }

    async fn seed_published(
        db: &Database,
        business_id: &str,
        account_id: &str,
        platform: PlatformKind,
        platform_post_id: &str,
    ) -> String {
        let mut post = PublishedPost::new_pending(
            business_id.to_string(),
            account_id.to_string(),
            "hello".to_string(),
            platform,
        );
        post.status = PublishedStatus::Published;
        post.platform_post_id = Some(platform_post_id.to_string());
        post.published_at = Some(chrono::Utc::now().timestamp());
        db.create_published_post(&post).await.unwrap();
        post.id
    }

    fn fixed_fetchers(
        entries: Vec<(PlatformKind, Arc<dyn AnalyticsFetcher>)>,
    ) -> HashMap<PlatformKind, Arc<dyn AnalyticsFetcher>> {
        entries.into_iter().collect()
    }

    #[tokio::test]
    async fn test_sync_business_happy_path() {
        let (db, _dir) = test_db().await;
        let business_id = seed_business(&db).await;
        let account_id = seed_account(&db, &business_id, PlatformKind::Twitter).await;
        let post_id =
            seed_published(&db, &business_id, &account_id, PlatformKind::Twitter, "tw-1").await;

        let metrics = NormalizedMetrics {
            likes: 10,
            comments: 2,
            shares: 3,
            impressions: 500,
            engagement_rate: 3.0,
            ..Default::default()
        };
        let service = AnalyticsSyncService::with_fetchers(
            db.clone(),
            fixed_fetchers(vec![(
                PlatformKind::Twitter,
                Arc::new(MockFetcher::returning(PlatformKind::Twitter, metrics)),
            )]),
        );

        let summary = service.sync_business(&business_id, None, None).await.unwrap();
        assert_eq!(summary.total_posts, 1);
        assert_eq!(summary.synced, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.by_platform[&PlatformKind::Twitter].synced, 1);

        // snapshot row written
        let snapshot = db.latest_analytics(&post_id).await.unwrap().unwrap();
        assert_eq!(snapshot.likes, 10);
        assert_eq!(snapshot.impressions, 500);

        // cached counters refreshed on the post
        let post = db.get_published_post(&post_id).await.unwrap().unwrap();
        assert_eq!(post.likes_count, 10);
        assert_eq!(post.shares_count, 3);
        assert!(post.last_metrics_sync.is_some());
    }

    #[tokio::test]
    async fn test_sync_rate_limit_evicts_platform() {
        let (db, _dir) = test_db().await;
        let business_id = seed_business(&db).await;
        let account_id = seed_account(&db, &business_id, PlatformKind::Twitter).await;
        seed_published(&db, &business_id, &account_id, PlatformKind::Twitter, "tw-1").await;
        seed_published(&db, &business_id, &account_id, PlatformKind::Twitter, "tw-2").await;

        let fetcher = Arc::new(MockFetcher::rate_limited(PlatformKind::Twitter));
        let service = AnalyticsSyncService::with_fetchers(
            db.clone(),
            fixed_fetchers(vec![(PlatformKind::Twitter, fetcher.clone())]),
        );

        let summary = service.sync_business(&business_id, None, None).await.unwrap();
        assert_eq!(summary.total_posts, 2);
        assert_eq!(summary.rate_limited, 1);
        // second post failed without touching the evicted fetcher
        assert_eq!(summary.failed, 1);
        assert_eq!(fetcher.call_count(), 1);
        assert_eq!(summary.errors.len(), 2);
    }

    #[tokio::test]
    async fn test_sync_auth_failure_evicts_platform() {
        let (db, _dir) = test_db().await;
        let business_id = seed_business(&db).await;
        let account_id = seed_account(&db, &business_id, PlatformKind::Linkedin).await;
        seed_published(
            &db,
            &business_id,
            &account_id,
            PlatformKind::Linkedin,
            "urn:li:share:1",
        )
        .await;
        seed_published(
            &db,
            &business_id,
            &account_id,
            PlatformKind::Linkedin,
            "urn:li:share:2",
        )
        .await;

        let fetcher = Arc::new(MockFetcher::failing(
            PlatformKind::Linkedin,
            PlatformError::Authentication("token revoked".to_string()),
        ));
        let service = AnalyticsSyncService::with_fetchers(
            db.clone(),
            fixed_fetchers(vec![(PlatformKind::Linkedin, fetcher.clone())]),
        );

        let summary = service.sync_business(&business_id, None, None).await.unwrap();
        assert_eq!(summary.failed, 2);
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn test_sync_unknown_business() {
        let (db, _dir) = test_db().await;
        let service = AnalyticsSyncService::with_fetchers(db, HashMap::new());

        let result = service.sync_business("nope", None, None).await;
        assert!(matches!(result, Err(CrosscastError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_sync_single_post_requires_published_status() {
        let (db, _dir) = test_db().await;
        let business_id = seed_business(&db).await;
        let account_id = seed_account(&db, &business_id, PlatformKind::Twitter).await;

        // still pending, never reached the platform
        let post = PublishedPost::new_pending(
            business_id.clone(),
            account_id,
            "draft".to_string(),
            PlatformKind::Twitter,
        );
        db.create_published_post(&post).await.unwrap();

        let service = AnalyticsSyncService::with_fetchers(db, HashMap::new());
        let result = service.sync_single_post(&post.id).await;
        assert!(matches!(result, Err(CrosscastError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_sync_status_percentages() {
        let (db, _dir) = test_db().await;
        let business_id = seed_business(&db).await;
        let account_id = seed_account(&db, &business_id, PlatformKind::Twitter).await;
        let synced_post =
            seed_published(&db, &business_id, &account_id, PlatformKind::Twitter, "tw-1").await;
        seed_published(&db, &business_id, &account_id, PlatformKind::Twitter, "tw-2").await;

        let now = chrono::Utc::now().timestamp();
        db.update_cached_metrics(&synced_post, 1, 0, 0, 10, now)
            .await
            .unwrap();

        let service = AnalyticsSyncService::with_fetchers(db, HashMap::new());
        let status = service.sync_status(&business_id).await.unwrap();
        assert_eq!(status.total_posts, 2);
        assert_eq!(status.synced_posts, 1);
        assert_eq!(status.unsynced_posts, 1);
        assert_eq!(status.sync_percentage, 50.0);
        assert_eq!(status.last_sync_at, Some(now));
    }
}
