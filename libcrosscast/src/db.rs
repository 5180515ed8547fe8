//! Database operations for Crosscast
//!
//! All state transitions on scheduled posts go through compare-and-swap
//! updates (`WHERE id = ? AND status = ?`), so concurrent executors and
//! user-facing commands can never clobber a terminal status.

use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::path::Path;

use crate::error::{DbError, Result};
use crate::types::{
    PlatformKind, PostAnalytics, PublishedPost, PublishedStatus, ScheduledPost, ScheduledStatus,
    SocialAccount,
};

/// A task row from the delayed-delivery queue.
#[derive(Debug, Clone)]
pub struct QueuedTask {
    pub handle: String,
    pub task: String,
    pub args: String,
    pub eta: i64,
}

/// Per-platform, per-status scheduled post counts.
#[derive(Debug, Clone)]
pub struct QueueStat {
    pub platform: String,
    pub status: String,
    pub count: i64,
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    pub async fn new(db_path: &str) -> Result<Self> {
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
        }

        // mode=rwc creates the database file if it doesn't exist
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(DbError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        Ok(Self { pool })
    }

    // ========================================================================
    // Businesses
    // ========================================================================

    pub async fn create_business(&self, id: &str, name: &str) -> Result<()> {
        sqlx::query("INSERT INTO businesses (id, name, created_at) VALUES (?, ?, ?)")
            .bind(id)
            .bind(name)
            .bind(chrono::Utc::now().timestamp())
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;
        Ok(())
    }

    pub async fn business_exists(&self, id: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM businesses WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;
        Ok(row.is_some())
    }

    // ========================================================================
    // Social accounts
    // ========================================================================

    pub async fn create_account(&self, account: &SocialAccount) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO social_accounts
                (id, business_id, platform, platform_username, access_token_enc,
                 refresh_token_enc, token_expiry, token_version, page_id,
                 instagram_account_id, is_active, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.id)
        .bind(&account.business_id)
        .bind(account.platform)
        .bind(&account.platform_username)
        .bind(&account.access_token_enc)
        .bind(&account.refresh_token_enc)
        .bind(account.token_expiry)
        .bind(account.token_version)
        .bind(&account.page_id)
        .bind(&account.instagram_account_id)
        .bind(account.is_active)
        .bind(account.created_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;
        Ok(())
    }

    pub async fn get_account(&self, id: &str) -> Result<Option<SocialAccount>> {
        let row = sqlx::query("SELECT * FROM social_accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;
        Ok(row.map(|r| map_account(&r)))
    }

    pub async fn list_active_accounts(
        &self,
        business_id: &str,
        platform: Option<PlatformKind>,
    ) -> Result<Vec<SocialAccount>> {
        let mut query_str =
            "SELECT * FROM social_accounts WHERE business_id = ? AND is_active = 1".to_string();
        if platform.is_some() {
            query_str.push_str(" AND platform = ?");
        }

        let mut query = sqlx::query(&query_str).bind(business_id);
        if let Some(p) = platform {
            query = query.bind(p);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;
        Ok(rows.iter().map(map_account).collect())
    }

    /// Persist refreshed tokens, guarded by the token version the caller
    /// read. Returns false when another refresher won the race.
    pub async fn update_account_tokens(
        &self,
        account_id: &str,
        access_token_enc: &str,
        refresh_token_enc: Option<&str>,
        token_expiry: Option<i64>,
        expected_version: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE social_accounts
            SET access_token_enc = ?, refresh_token_enc = ?, token_expiry = ?,
                token_version = token_version + 1
            WHERE id = ? AND token_version = ?
            "#,
        )
        .bind(access_token_enc)
        .bind(refresh_token_enc)
        .bind(token_expiry)
        .bind(account_id)
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;
        Ok(result.rows_affected() == 1)
    }

    // ========================================================================
    // Scheduled posts
    // ========================================================================

    pub async fn create_scheduled_post(&self, post: &ScheduledPost) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO scheduled_posts
                (id, business_id, social_account_id, content_text, platform,
                 platform_params, scheduled_for, status, task_handle,
                 published_post_id, platform_post_id, platform_post_url,
                 error_message, retry_count, last_retry_at, created_at,
                 updated_at, published_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&post.business_id)
        .bind(&post.social_account_id)
        .bind(&post.content_text)
        .bind(post.platform)
        .bind(&post.platform_params)
        .bind(post.scheduled_for)
        .bind(post.status)
        .bind(&post.task_handle)
        .bind(&post.published_post_id)
        .bind(&post.platform_post_id)
        .bind(&post.platform_post_url)
        .bind(&post.error_message)
        .bind(post.retry_count)
        .bind(post.last_retry_at)
        .bind(post.created_at)
        .bind(post.updated_at)
        .bind(post.published_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;
        Ok(())
    }

    pub async fn get_scheduled_post(&self, id: &str) -> Result<Option<ScheduledPost>> {
        let row = sqlx::query("SELECT * FROM scheduled_posts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;
        Ok(row.map(|r| map_scheduled(&r)))
    }

    pub async fn list_scheduled_posts(
        &self,
        business_id: Option<&str>,
        status: Option<ScheduledStatus>,
        platform: Option<PlatformKind>,
        limit: i64,
    ) -> Result<Vec<ScheduledPost>> {
        let mut where_clauses = vec!["1=1"];
        if business_id.is_some() {
            where_clauses.push("business_id = ?");
        }
        if status.is_some() {
            where_clauses.push("status = ?");
        }
        if platform.is_some() {
            where_clauses.push("platform = ?");
        }

        let query_str = format!(
            "SELECT * FROM scheduled_posts WHERE {} ORDER BY scheduled_for ASC LIMIT ?",
            where_clauses.join(" AND ")
        );

        let mut query = sqlx::query(&query_str);
        if let Some(b) = business_id {
            query = query.bind(b);
        }
        if let Some(s) = status {
            query = query.bind(s);
        }
        if let Some(p) = platform {
            query = query.bind(p);
        }
        query = query.bind(limit);

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;
        Ok(rows.iter().map(map_scheduled).collect())
    }

    /// Atomic status transition. Returns false if the post was not in `from`
    /// (someone else got there first, or the status is terminal).
    pub async fn transition_scheduled_status(
        &self,
        id: &str,
        from: ScheduledStatus,
        to: ScheduledStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE scheduled_posts SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(to)
        .bind(chrono::Utc::now().timestamp())
        .bind(id)
        .bind(from)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn set_task_handle(&self, id: &str, handle: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE scheduled_posts SET task_handle = ?, updated_at = ? WHERE id = ?")
            .bind(handle)
            .bind(chrono::Utc::now().timestamp())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;
        Ok(())
    }

    /// Finalize a successful publish. CAS from `publishing` so a concurrent
    /// duplicate execution cannot double-finish.
    pub async fn mark_scheduled_published(
        &self,
        id: &str,
        published_post_id: &str,
        platform_post_id: &str,
        platform_post_url: &str,
    ) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            UPDATE scheduled_posts
            SET status = 'published', published_post_id = ?, platform_post_id = ?,
                platform_post_url = ?, published_at = ?, updated_at = ?,
                error_message = NULL
            WHERE id = ? AND status = 'publishing'
            "#,
        )
        .bind(published_post_id)
        .bind(platform_post_id)
        .bind(platform_post_url)
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;
        Ok(result.rows_affected() == 1)
    }

    /// Record a partial publish (some thread parts posted, then a failure).
    pub async fn mark_scheduled_partial(
        &self,
        id: &str,
        published_post_id: &str,
        platform_post_id: Option<&str>,
        platform_post_url: Option<&str>,
        error_message: &str,
    ) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            UPDATE scheduled_posts
            SET status = 'partial', published_post_id = ?, platform_post_id = ?,
                platform_post_url = ?, error_message = ?, published_at = ?,
                updated_at = ?
            WHERE id = ? AND status = 'publishing'
            "#,
        )
        .bind(published_post_id)
        .bind(platform_post_id)
        .bind(platform_post_url)
        .bind(error_message)
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;
        Ok(result.rows_affected() == 1)
    }

    /// Record a failed attempt and bump the retry counter. Returns the new
    /// retry count, or None if the post was not in `publishing`.
    pub async fn mark_scheduled_failed(&self, id: &str, error_message: &str) -> Result<Option<i64>> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            UPDATE scheduled_posts
            SET status = 'failed', error_message = ?, retry_count = retry_count + 1,
                last_retry_at = ?, updated_at = ?
            WHERE id = ? AND status = 'publishing'
            "#,
        )
        .bind(error_message)
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        if result.rows_affected() != 1 {
            return Ok(None);
        }
        let row = sqlx::query("SELECT retry_count FROM scheduled_posts WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;
        Ok(Some(row.get("retry_count")))
    }

    /// Update time/content of a pending post. CAS on `pending`; returns false
    /// once the post has moved on.
    pub async fn update_pending_schedule(
        &self,
        id: &str,
        scheduled_for: i64,
        content_text: Option<&str>,
        platform_params: Option<&str>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_posts
            SET scheduled_for = ?,
                content_text = COALESCE(?, content_text),
                platform_params = COALESCE(?, platform_params),
                updated_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(scheduled_for)
        .bind(content_text)
        .bind(platform_params)
        .bind(chrono::Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;
        Ok(result.rows_affected() == 1)
    }

    /// Pending posts due within the queue window, skipping anything further
    /// past due than the grace period (those are left for expiry).
    pub async fn due_pending_posts(
        &self,
        now: i64,
        window_secs: i64,
        grace_secs: i64,
    ) -> Result<Vec<ScheduledPost>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM scheduled_posts
            WHERE status = 'pending'
              AND scheduled_for <= ?
              AND scheduled_for > ?
            ORDER BY scheduled_for ASC
            "#,
        )
        .bind(now + window_secs)
        .bind(now - grace_secs)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;
        Ok(rows.iter().map(map_scheduled).collect())
    }

    /// Expire pending/queued posts whose scheduled time is older than
    /// `cutoff`. Returns the number of rows expired.
    pub async fn expire_overdue_posts(&self, cutoff: i64, message: &str) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_posts
            SET status = 'expired', error_message = ?, updated_at = ?
            WHERE status IN ('pending', 'queued') AND scheduled_for < ?
            "#,
        )
        .bind(message)
        .bind(chrono::Utc::now().timestamp())
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;
        Ok(result.rows_affected())
    }

    pub async fn scheduled_post_stats(&self) -> Result<Vec<QueueStat>> {
        let rows = sqlx::query(
            r#"
            SELECT platform, status, COUNT(*) as count
            FROM scheduled_posts
            GROUP BY platform, status
            ORDER BY platform, status
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;
        Ok(rows
            .iter()
            .map(|r| QueueStat {
                platform: r.get("platform"),
                status: r.get("status"),
                count: r.get("count"),
            })
            .collect())
    }

    // ========================================================================
    // Published posts
    // ========================================================================

    pub async fn create_published_post(&self, post: &PublishedPost) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO published_posts
                (id, business_id, social_account_id, content_text, platform,
                 platform_post_id, platform_post_url, status, error_message,
                 retry_count, likes_count, comments_count, shares_count,
                 impressions_count, last_metrics_sync, published_at,
                 created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&post.business_id)
        .bind(&post.social_account_id)
        .bind(&post.content_text)
        .bind(post.platform)
        .bind(&post.platform_post_id)
        .bind(&post.platform_post_url)
        .bind(post.status)
        .bind(&post.error_message)
        .bind(post.retry_count)
        .bind(post.likes_count)
        .bind(post.comments_count)
        .bind(post.shares_count)
        .bind(post.impressions_count)
        .bind(post.last_metrics_sync)
        .bind(post.published_at)
        .bind(post.created_at)
        .bind(post.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;
        Ok(())
    }

    pub async fn get_published_post(&self, id: &str) -> Result<Option<PublishedPost>> {
        let row = sqlx::query("SELECT * FROM published_posts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;
        Ok(row.map(|r| map_published(&r)))
    }

    /// Finalize the outcome of a publish attempt.
    pub async fn update_published_result(
        &self,
        id: &str,
        status: PublishedStatus,
        platform_post_id: Option<&str>,
        platform_post_url: Option<&str>,
        error_message: Option<&str>,
        published_at: Option<i64>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE published_posts
            SET status = ?, platform_post_id = ?, platform_post_url = ?,
                error_message = ?, published_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status)
        .bind(platform_post_id)
        .bind(platform_post_url)
        .bind(error_message)
        .bind(published_at)
        .bind(chrono::Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;
        Ok(())
    }

    /// Published posts eligible for analytics sync.
    pub async fn list_published_for_sync(
        &self,
        business_id: &str,
        platform: Option<PlatformKind>,
        limit: Option<i64>,
    ) -> Result<Vec<PublishedPost>> {
        let mut query_str =
            "SELECT * FROM published_posts WHERE business_id = ? AND status = 'published'"
                .to_string();
        if platform.is_some() {
            query_str.push_str(" AND platform = ?");
        }
        query_str.push_str(" ORDER BY published_at DESC");
        if limit.is_some() {
            query_str.push_str(" LIMIT ?");
        }

        let mut query = sqlx::query(&query_str).bind(business_id);
        if let Some(p) = platform {
            query = query.bind(p);
        }
        if let Some(l) = limit {
            query = query.bind(l);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;
        Ok(rows.iter().map(map_published).collect())
    }

    pub async fn update_cached_metrics(
        &self,
        id: &str,
        likes: i64,
        comments: i64,
        shares: i64,
        impressions: i64,
        synced_at: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE published_posts
            SET likes_count = ?, comments_count = ?, shares_count = ?,
                impressions_count = ?, last_metrics_sync = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(likes)
        .bind(comments)
        .bind(shares)
        .bind(impressions)
        .bind(synced_at)
        .bind(chrono::Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;
        Ok(())
    }

    /// (total published, ever-synced, most recent sync) for a business.
    pub async fn sync_status_counts(&self, business_id: &str) -> Result<(i64, i64, Option<i64>)> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) as total,
                   SUM(CASE WHEN last_metrics_sync IS NOT NULL THEN 1 ELSE 0 END) as synced,
                   MAX(last_metrics_sync) as last_sync
            FROM published_posts
            WHERE business_id = ? AND status = 'published'
            "#,
        )
        .bind(business_id)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;
        let total: i64 = row.get("total");
        let synced: Option<i64> = row.get("synced");
        let last_sync: Option<i64> = row.get("last_sync");
        Ok((total, synced.unwrap_or(0), last_sync))
    }

    // ========================================================================
    // Analytics snapshots
    // ========================================================================

    pub async fn insert_analytics(&self, analytics: &PostAnalytics) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO post_analytics
                (id, published_post_id, business_id, platform, likes, comments,
                 shares, reactions, retweets, quote_tweets, impressions, reach,
                 clicks, video_views, video_watch_time, engagement_rate,
                 click_through_rate, platform_post_id, platform_post_url,
                 fetched_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&analytics.id)
        .bind(&analytics.published_post_id)
        .bind(&analytics.business_id)
        .bind(analytics.platform)
        .bind(analytics.likes)
        .bind(analytics.comments)
        .bind(analytics.shares)
        .bind(analytics.reactions)
        .bind(analytics.retweets)
        .bind(analytics.quote_tweets)
        .bind(analytics.impressions)
        .bind(analytics.reach)
        .bind(analytics.clicks)
        .bind(analytics.video_views)
        .bind(analytics.video_watch_time)
        .bind(analytics.engagement_rate)
        .bind(analytics.click_through_rate)
        .bind(&analytics.platform_post_id)
        .bind(&analytics.platform_post_url)
        .bind(analytics.fetched_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;
        Ok(())
    }

    pub async fn latest_analytics(
        &self,
        published_post_id: &str,
    ) -> Result<Option<PostAnalytics>> {
        let row = sqlx::query(
            r#"
            SELECT * FROM post_analytics
            WHERE published_post_id = ?
            ORDER BY fetched_at DESC
            LIMIT 1
            "#,
        )
        .bind(published_post_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;
        Ok(row.map(|r| map_analytics(&r)))
    }

    // ========================================================================
    // Delayed-delivery queue
    // ========================================================================

    pub async fn enqueue_task(&self, handle: &str, task: &str, args: &str, eta: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO queued_tasks (handle, task, args, eta, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(handle)
        .bind(task)
        .bind(args)
        .bind(eta)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;
        Ok(())
    }

    /// Best-effort revoke. Returns false if the task was already claimed.
    pub async fn revoke_task(&self, handle: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM queued_tasks WHERE handle = ?")
            .bind(handle)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn task_exists(&self, handle: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM queued_tasks WHERE handle = ?")
            .bind(handle)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;
        Ok(row.is_some())
    }

    pub async fn due_tasks(&self, now: i64, limit: i64) -> Result<Vec<QueuedTask>> {
        let rows = sqlx::query(
            "SELECT handle, task, args, eta FROM queued_tasks WHERE eta <= ? ORDER BY eta ASC LIMIT ?",
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;
        Ok(rows
            .iter()
            .map(|r| QueuedTask {
                handle: r.get("handle"),
                task: r.get("task"),
                args: r.get("args"),
                eta: r.get("eta"),
            })
            .collect())
    }

    /// Claim a due task for execution. Returns false if another worker (or a
    /// revoke) removed it first.
    pub async fn claim_task(&self, handle: &str) -> Result<bool> {
        self.revoke_task(handle).await
    }
}

fn map_account(r: &sqlx::sqlite::SqliteRow) -> SocialAccount {
    SocialAccount {
        id: r.get("id"),
        business_id: r.get("business_id"),
        platform: r.get("platform"),
        platform_username: r.get("platform_username"),
        access_token_enc: r.get("access_token_enc"),
        refresh_token_enc: r.get("refresh_token_enc"),
        token_expiry: r.get("token_expiry"),
        token_version: r.get("token_version"),
        page_id: r.get("page_id"),
        instagram_account_id: r.get("instagram_account_id"),
        is_active: r.get("is_active"),
        created_at: r.get("created_at"),
    }
}

fn map_scheduled(r: &sqlx::sqlite::SqliteRow) -> ScheduledPost {
    ScheduledPost {
        id: r.get("id"),
        business_id: r.get("business_id"),
        social_account_id: r.get("social_account_id"),
        content_text: r.get("content_text"),
        platform: r.get("platform"),
        platform_params: r.get("platform_params"),
        scheduled_for: r.get("scheduled_for"),
        status: r.get("status"),
        task_handle: r.get("task_handle"),
        published_post_id: r.get("published_post_id"),
        platform_post_id: r.get("platform_post_id"),
        platform_post_url: r.get("platform_post_url"),
        error_message: r.get("error_message"),
        retry_count: r.get("retry_count"),
        last_retry_at: r.get("last_retry_at"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
        published_at: r.get("published_at"),
    }
}

fn map_published(r: &sqlx::sqlite::SqliteRow) -> PublishedPost {
    PublishedPost {
        id: r.get("id"),
        business_id: r.get("business_id"),
        social_account_id: r.get("social_account_id"),
        content_text: r.get("content_text"),
        platform: r.get("platform"),
        platform_post_id: r.get("platform_post_id"),
        platform_post_url: r.get("platform_post_url"),
        status: r.get("status"),
        error_message: r.get("error_message"),
        retry_count: r.get("retry_count"),
        likes_count: r.get("likes_count"),
        comments_count: r.get("comments_count"),
        shares_count: r.get("shares_count"),
        impressions_count: r.get("impressions_count"),
        last_metrics_sync: r.get("last_metrics_sync"),
        published_at: r.get("published_at"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

fn map_analytics(r: &sqlx::sqlite::SqliteRow) -> PostAnalytics {
    PostAnalytics {
        id: r.get("id"),
        published_post_id: r.get("published_post_id"),
        business_id: r.get("business_id"),
        platform: r.get("platform"),
        likes: r.get("likes"),
        comments: r.get("comments"),
        shares: r.get("shares"),
        reactions: r.get("reactions"),
        retweets: r.get("retweets"),
        quote_tweets: r.get("quote_tweets"),
        impressions: r.get("impressions"),
        reach: r.get("reach"),
        clicks: r.get("clicks"),
        video_views: r.get("video_views"),
        video_watch_time: r.get("video_watch_time"),
        engagement_rate: r.get("engagement_rate"),
        click_through_rate: r.get("click_through_rate"),
        platform_post_id: r.get("platform_post_id"),
        platform_post_url: r.get("platform_post_url"),
        fetched_at: r.get("fetched_at"),
    }
}
