//! Core types for Crosscast

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Platforms Crosscast can publish to and sync analytics from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    Linkedin,
    Twitter,
    Meta,
}

impl PlatformKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linkedin => "linkedin",
            Self::Twitter => "twitter",
            Self::Meta => "meta",
        }
    }
}

impl std::str::FromStr for PlatformKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linkedin" => Ok(Self::Linkedin),
            "twitter" => Ok(Self::Twitter),
            "meta" => Ok(Self::Meta),
            _ => Err(format!(
                "Unknown platform: '{}'. Valid options: linkedin, twitter, meta",
                s
            )),
        }
    }
}

impl std::fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle of a scheduled post.
///
/// pending -> queued -> publishing -> published | partial | failed
/// pending/queued may also move to cancelled or expired. published, partial,
/// cancelled and expired are terminal; failed is terminal once the retry
/// budget is spent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ScheduledStatus {
    Pending,
    Queued,
    Publishing,
    Published,
    Partial,
    Failed,
    Cancelled,
    Expired,
}

impl ScheduledStatus {
    /// Statuses that an execution attempt must never overwrite.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Published | Self::Partial | Self::Cancelled | Self::Expired
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::Publishing => "publishing",
            Self::Published => "published",
            Self::Partial => "partial",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for ScheduledStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PublishedStatus {
    Pending,
    Published,
    Partial,
    Failed,
}

impl std::fmt::Display for PublishedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Published => "published",
            Self::Partial => "partial",
            Self::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// A connected social account. Tokens are stored encrypted; `token_version`
/// guards concurrent refresh writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialAccount {
    pub id: String,
    pub business_id: String,
    pub platform: PlatformKind,
    pub platform_username: String,
    pub access_token_enc: String,
    pub refresh_token_enc: Option<String>,
    pub token_expiry: Option<i64>,
    pub token_version: i64,
    pub page_id: Option<String>,
    pub instagram_account_id: Option<String>,
    pub is_active: bool,
    pub created_at: i64,
}

/// A post scheduled for future publication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledPost {
    pub id: String,
    pub business_id: String,
    pub social_account_id: String,
    pub content_text: String,
    pub platform: PlatformKind,
    /// Platform-specific parameters as a JSON object (see [`PlatformParams`]).
    pub platform_params: Option<String>,
    pub scheduled_for: i64,
    pub status: ScheduledStatus,
    pub task_handle: Option<String>,
    pub published_post_id: Option<String>,
    pub platform_post_id: Option<String>,
    pub platform_post_url: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: i64,
    pub last_retry_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
    pub published_at: Option<i64>,
}

impl ScheduledPost {
    pub fn new(
        business_id: String,
        social_account_id: String,
        content_text: String,
        platform: PlatformKind,
        platform_params: Option<String>,
        scheduled_for: i64,
    ) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            business_id,
            social_account_id,
            content_text,
            platform,
            platform_params,
            scheduled_for,
            status: ScheduledStatus::Pending,
            task_handle: None,
            published_post_id: None,
            platform_post_id: None,
            platform_post_url: None,
            error_message: None,
            retry_count: 0,
            last_retry_at: None,
            created_at: now,
            updated_at: now,
            published_at: None,
        }
    }
}

/// A post that reached (or tried to reach) a platform. Created before the
/// network call so failed attempts leave a record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedPost {
    pub id: String,
    pub business_id: String,
    pub social_account_id: String,
    pub content_text: String,
    pub platform: PlatformKind,
    pub platform_post_id: Option<String>,
    pub platform_post_url: Option<String>,
    pub status: PublishedStatus,
    pub error_message: Option<String>,
    pub retry_count: i64,
    // Cached counters, refreshed on each analytics sync
    pub likes_count: i64,
    pub comments_count: i64,
    pub shares_count: i64,
    pub impressions_count: i64,
    pub last_metrics_sync: Option<i64>,
    pub published_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl PublishedPost {
    /// Create the pre-publish record for an attempt that is about to run.
    pub fn new_pending(
        business_id: String,
        social_account_id: String,
        content_text: String,
        platform: PlatformKind,
    ) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            business_id,
            social_account_id,
            content_text,
            platform,
            platform_post_id: None,
            platform_post_url: None,
            status: PublishedStatus::Pending,
            error_message: None,
            retry_count: 0,
            likes_count: 0,
            comments_count: 0,
            shares_count: 0,
            impressions_count: 0,
            last_metrics_sync: None,
            published_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One analytics snapshot for a published post. Rows are append-only; history
/// is reconstructed by ordering on `fetched_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostAnalytics {
    pub id: String,
    pub published_post_id: String,
    pub business_id: String,
    pub platform: PlatformKind,
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
    pub platform_post_id: Option<String>,
    pub platform_post_url: Option<String>,
    pub fetched_at: i64,
}

/// The successful result of a publish call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishOutcome {
    /// Canonical post id on the platform (for threads, the first part).
    pub post_id: String,
    pub url: String,
    /// All part ids for multi-part publishes; a single id otherwise.
    pub part_ids: Vec<String>,
    pub published_at: i64,
}

impl PublishOutcome {
    pub fn single(post_id: String, url: String) -> Self {
        Self {
            part_ids: vec![post_id.clone()],
            post_id,
            url,
            published_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Per-platform publish options, carried on a scheduled post as JSON.
///
/// Unknown keys are ignored so older rows survive schema drift.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformParams {
    /// Meta only: "facebook" (default) or "instagram".
    pub platform_type: Option<String>,
    /// Meta/facebook: target page. Filled in from the account when absent.
    pub page_id: Option<String>,
    /// Meta/instagram: target account. Filled in from the account when absent.
    pub instagram_account_id: Option<String>,
    /// Meta/instagram: required image for the media container.
    pub image_url: Option<String>,
    /// Meta/facebook: optional link attachment.
    pub link: Option<String>,
    /// Twitter: use the premium 4000-character limit.
    #[serde(default)]
    pub premium: bool,
    /// Twitter: segment over-limit content into a thread (default true).
    pub allow_threads: Option<bool>,
    /// LinkedIn: visibility override ("PUBLIC" or "CONNECTIONS").
    pub visibility: Option<String>,
}

impl PlatformParams {
    pub fn from_json(raw: Option<&str>) -> Result<Self, serde_json::Error> {
        match raw {
            Some(s) if !s.trim().is_empty() => serde_json::from_str(s),
            _ => Ok(Self::default()),
        }
    }

    pub fn allow_threads(&self) -> bool {
        self.allow_threads.unwrap_or(true)
    }
}
