//! Publish scheduling and execution.
//!
//! A scheduled post moves pending -> queued -> publishing -> a final state.
//! Scheduling enqueues a delivery task at the post's ETA and stores its
//! handle; the sweep moves due pending posts to queued, re-creating the task
//! when its handle was lost. The delivery daemon claims due tasks and calls
//! [`SchedulerService::execute`], which takes the post through a
//! compare-and-swap claim so duplicate deliveries are no-ops. Failed
//! executions re-enqueue with exponential delay until the retry budget is
//! spent; posts nobody delivered for a week expire.

use std::collections::HashMap;
use std::sync::Arc;

use secrecy::SecretString;

use crate::config::SchedulerConfig;
use crate::credentials::{CredentialGateway, PlatformCredentials};
use crate::db::{Database, QueueStat};
use crate::error::{CrosscastError, PlatformError, Result};
use crate::platforms::{Publisher, PublisherRegistry};
use crate::types::{
    PlatformKind, PlatformParams, PublishOutcome, PublishedPost, PublishedStatus, ScheduledPost,
    ScheduledStatus,
};

pub mod queue;

pub use queue::{DbTaskQueue, MockQueue, TaskQueue, PUBLISH_TASK};

const EXPIRY_MESSAGE: &str = "Post expired - scheduled time was more than 7 days ago";

/// Base delay for the first publish retry; doubles per retry.
const RETRY_BASE_DELAY_SECS: i64 = 60;

enum PublishSource {
    Live {
        gateway: CredentialGateway,
        registry: PublisherRegistry,
    },
    /// Preset publishers keyed by platform, used by tests.
    Fixed(HashMap<PlatformKind, Arc<dyn Publisher>>),
}

pub struct SchedulerService {
    db: Database,
    queue: Arc<dyn TaskQueue>,
    publishers: PublishSource,
    config: SchedulerConfig,
}

/// How one publish attempt ended, before it is written back to the rows.
enum AttemptError {
    Partial {
        published_id: String,
        posted_ids: Vec<String>,
        first_url: Option<String>,
        message: String,
    },
    Failed {
        published_id: Option<String>,
        message: String,
    },
}

impl SchedulerService {
    pub fn new(
        db: Database,
        queue: Arc<dyn TaskQueue>,
        gateway: CredentialGateway,
        registry: PublisherRegistry,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            db,
            queue,
            publishers: PublishSource::Live { gateway, registry },
            config,
        }
    }

    pub fn with_publishers(
        db: Database,
        queue: Arc<dyn TaskQueue>,
        publishers: HashMap<PlatformKind, Arc<dyn Publisher>>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            db,
            queue,
            publishers: PublishSource::Fixed(publishers),
            config,
        }
    }

    /// Schedule a post for future publication.
    pub async fn schedule(
        &self,
        business_id: &str,
        social_account_id: &str,
        content_text: &str,
        platform_params: Option<&str>,
        scheduled_for: i64,
    ) -> Result<ScheduledPost> {
        if content_text.trim().is_empty() {
            return Err(CrosscastError::InvalidInput(
                "Content cannot be empty".to_string(),
            ));
        }
        if scheduled_for <= chrono::Utc::now().timestamp() {
            return Err(CrosscastError::InvalidInput(
                "Scheduled time must be in the future".to_string(),
            ));
        }
        PlatformParams::from_json(platform_params).map_err(|e| {
            CrosscastError::InvalidInput(format!("Invalid platform params: {}", e))
        })?;

        let account = self.checked_account(business_id, social_account_id).await?;

        let post = ScheduledPost::new(
            business_id.to_string(),
            social_account_id.to_string(),
            content_text.to_string(),
            account.platform,
            platform_params.map(str::to_string),
            scheduled_for,
        );
        self.db.create_scheduled_post(&post).await?;
        let handle = self
            .queue
            .enqueue(PUBLISH_TASK, &post.id, scheduled_for)
            .await?;
        self.db.set_task_handle(&post.id, Some(&handle)).await?;
        tracing::info!(post_id = %post.id, platform = %post.platform, scheduled_for, "scheduled post");
        self.require_post(&post.id).await
    }

    /// Move a pending post to a new time, optionally replacing its content or
    /// params. Posts that are already queued or beyond cannot be moved.
    pub async fn reschedule(
        &self,
        post_id: &str,
        scheduled_for: i64,
        content_text: Option<&str>,
        platform_params: Option<&str>,
    ) -> Result<ScheduledPost> {
        if scheduled_for <= chrono::Utc::now().timestamp() {
            return Err(CrosscastError::InvalidInput(
                "Scheduled time must be in the future".to_string(),
            ));
        }
        if let Some(params) = platform_params {
            PlatformParams::from_json(Some(params)).map_err(|e| {
                CrosscastError::InvalidInput(format!("Invalid platform params: {}", e))
            })?;
        }

        let post = self.require_post(post_id).await?;
        if post.status != ScheduledStatus::Pending {
            return Err(CrosscastError::InvalidInput(format!(
                "Only pending posts can be rescheduled (status: {})",
                post.status
            )));
        }

        if let Some(handle) = &post.task_handle {
            self.queue.revoke(handle).await?;
            self.db.set_task_handle(post_id, None).await?;
        }

        let updated = self
            .db
            .update_pending_schedule(post_id, scheduled_for, content_text, platform_params)
            .await?;
        if !updated {
            return Err(CrosscastError::InvalidInput(
                "Post is no longer pending".to_string(),
            ));
        }

        let handle = self
            .queue
            .enqueue(PUBLISH_TASK, post_id, scheduled_for)
            .await?;
        self.db.set_task_handle(post_id, Some(&handle)).await?;
        tracing::info!(post_id, scheduled_for, "rescheduled post");
        self.require_post(post_id).await
    }

    /// Cancel a pending or queued post, revoking its queued task if any.
    pub async fn cancel(&self, post_id: &str) -> Result<()> {
        let post = self.require_post(post_id).await?;
        match post.status {
            ScheduledStatus::Pending | ScheduledStatus::Queued => {}
            status => {
                return Err(CrosscastError::InvalidInput(format!(
                    "Only pending or queued posts can be cancelled (status: {})",
                    status
                )))
            }
        }

        if let Some(handle) = &post.task_handle {
            // Best-effort: the task may already have been claimed, and a
            // queue error must not block the cancel itself.
            if let Err(e) = self.queue.revoke(handle).await {
                tracing::warn!(post_id, error = %e, "could not revoke queued task");
            }
        }

        let cancelled = self
            .db
            .transition_scheduled_status(post_id, ScheduledStatus::Pending, ScheduledStatus::Cancelled)
            .await?
            || self
                .db
                .transition_scheduled_status(post_id, ScheduledStatus::Queued, ScheduledStatus::Cancelled)
                .await?;
        if !cancelled {
            return Err(CrosscastError::InvalidInput(
                "Post was already picked up for publishing".to_string(),
            ));
        }

        tracing::info!(post_id, "cancelled post");
        Ok(())
    }

    /// Publish immediately, bypassing the queue. The published-post record is
    /// created before the network call so a failed attempt still leaves one.
    pub async fn publish_now(
        &self,
        business_id: &str,
        social_account_id: &str,
        content_text: &str,
        platform_params: Option<&str>,
    ) -> Result<PublishedPost> {
        if content_text.trim().is_empty() {
            return Err(CrosscastError::InvalidInput(
                "Content cannot be empty".to_string(),
            ));
        }
        let params = PlatformParams::from_json(platform_params).map_err(|e| {
            CrosscastError::InvalidInput(format!("Invalid platform params: {}", e))
        })?;
        let account = self.checked_account(business_id, social_account_id).await?;

        let (publisher, credentials) = self
            .resolve_publisher(account.platform, social_account_id)
            .await?;

        let record = PublishedPost::new_pending(
            business_id.to_string(),
            social_account_id.to_string(),
            content_text.to_string(),
            account.platform,
        );
        self.db.create_published_post(&record).await?;

        match publisher.publish(content_text, &credentials, &params).await {
            Ok(outcome) => {
                self.db
                    .update_published_result(
                        &record.id,
                        PublishedStatus::Published,
                        Some(&outcome.post_id),
                        Some(&outcome.url),
                        None,
                        Some(outcome.published_at),
                    )
                    .await?;
                tracing::info!(published_id = %record.id, url = %outcome.url, "published post");
            }
            Err(PlatformError::Partial {
                message,
                posted_ids,
                first_url,
            }) => {
                self.db
                    .update_published_result(
                        &record.id,
                        PublishedStatus::Partial,
                        posted_ids.first().map(String::as_str),
                        first_url.as_deref(),
                        Some(&message),
                        Some(chrono::Utc::now().timestamp()),
                    )
                    .await?;
                tracing::warn!(published_id = %record.id, "partial publish: {}", message);
            }
            Err(err) => {
                self.db
                    .update_published_result(
                        &record.id,
                        PublishedStatus::Failed,
                        None,
                        None,
                        Some(&err.to_string()),
                        None,
                    )
                    .await?;
                return Err(err.into());
            }
        }

        self.db
            .get_published_post(&record.id)
            .await?
            .ok_or_else(|| CrosscastError::InvalidInput(format!("Post {} not found", record.id)))
    }

    /// Execute one scheduled post. Safe to call more than once: terminal
    /// posts and posts another worker already claimed are no-ops.
    pub async fn execute(&self, post_id: &str) -> Result<()> {
        let post = match self.db.get_scheduled_post(post_id).await? {
            Some(post) => post,
            None => {
                tracing::warn!(post_id, "scheduled post vanished before execution");
                return Ok(());
            }
        };
        if post.status.is_terminal() {
            tracing::debug!(post_id, status = %post.status, "skipping terminal post");
            return Ok(());
        }

        let claimed = self
            .db
            .transition_scheduled_status(post_id, ScheduledStatus::Queued, ScheduledStatus::Publishing)
            .await?
            || self
                .db
                .transition_scheduled_status(
                    post_id,
                    ScheduledStatus::Pending,
                    ScheduledStatus::Publishing,
                )
                .await?;
        if !claimed {
            tracing::debug!(post_id, "post already claimed by another worker");
            return Ok(());
        }

        match self.attempt(&post).await {
            Ok((published_id, outcome)) => {
                self.db
                    .mark_scheduled_published(post_id, &published_id, &outcome.post_id, &outcome.url)
                    .await?;
                tracing::info!(post_id, url = %outcome.url, "published scheduled post");
            }
            Err(AttemptError::Partial {
                published_id,
                posted_ids,
                first_url,
                message,
            }) => {
                self.db
                    .mark_scheduled_partial(
                        post_id,
                        &published_id,
                        posted_ids.first().map(String::as_str),
                        first_url.as_deref(),
                        &message,
                    )
                    .await?;
                tracing::warn!(post_id, "scheduled post partially published: {}", message);
            }
            Err(AttemptError::Failed {
                published_id,
                message,
            }) => {
                if let Some(published_id) = &published_id {
                    self.db
                        .update_published_result(
                            published_id,
                            PublishedStatus::Failed,
                            None,
                            None,
                            Some(&message),
                            None,
                        )
                        .await?;
                }
                self.record_failure(post_id, &message).await?;
            }
        }
        Ok(())
    }

    /// Move due pending posts to queued, confirming their delivery task still
    /// exists (re-creating it when the handle was lost), and re-queue queued
    /// posts whose task vanished (lost to a crashed daemon).
    pub async fn sweep_due(&self, now: i64) -> Result<usize> {
        let due = self
            .db
            .due_pending_posts(now, self.config.queue_window_secs, self.config.grace_secs)
            .await?;

        let mut queued = 0;
        for post in due {
            let live = match &post.task_handle {
                Some(handle) => self.queue.is_queued(handle).await?,
                None => false,
            };
            let fresh = if live {
                None
            } else {
                let eta = post.scheduled_for.max(now);
                let handle = self.queue.enqueue(PUBLISH_TASK, &post.id, eta).await?;
                self.db.set_task_handle(&post.id, Some(&handle)).await?;
                Some(handle)
            };
            let moved = self
                .db
                .transition_scheduled_status(&post.id, ScheduledStatus::Pending, ScheduledStatus::Queued)
                .await?;
            if moved {
                queued += 1;
                tracing::debug!(post_id = %post.id, "queued post for delivery");
            } else if let Some(handle) = fresh {
                // Someone else moved the post; drop the task we just created.
                self.queue.revoke(&handle).await?;
            }
        }

        let stuck = self
            .db
            .list_scheduled_posts(None, Some(ScheduledStatus::Queued), None, 500)
            .await?;
        for post in stuck {
            let lost = match &post.task_handle {
                Some(handle) => !self.queue.is_queued(handle).await?,
                None => true,
            };
            if lost {
                let eta = post.scheduled_for.max(now);
                let handle = self.queue.enqueue(PUBLISH_TASK, &post.id, eta).await?;
                self.db.set_task_handle(&post.id, Some(&handle)).await?;
                queued += 1;
                tracing::warn!(post_id = %post.id, "re-queued post with lost task handle");
            }
        }

        Ok(queued)
    }

    /// Expire pending and queued posts more than `expiry_days` past due.
    pub async fn expire_overdue(&self, now: i64) -> Result<u64> {
        let cutoff = now - self.config.expiry_days * 86_400;
        let expired = self.db.expire_overdue_posts(cutoff, EXPIRY_MESSAGE).await?;
        if expired > 0 {
            tracing::info!(expired, "expired overdue posts");
        }
        Ok(expired)
    }

    /// Claim and execute queued tasks whose ETA has passed.
    pub async fn process_due_tasks(&self, now: i64, limit: i64) -> Result<usize> {
        let tasks = self.db.due_tasks(now, limit).await?;
        let mut processed = 0;
        for task in tasks {
            // Claiming removes the row; a task another worker claimed first
            // is skipped.
            if !self.db.claim_task(&task.handle).await? {
                continue;
            }
            if task.task == PUBLISH_TASK {
                self.execute(&task.args).await?;
            } else {
                tracing::warn!(task = %task.task, "unknown task type in queue");
            }
            processed += 1;
        }
        Ok(processed)
    }

    /// Per-platform, per-status counts of scheduled posts.
    pub async fn queue_stats(&self) -> Result<Vec<QueueStat>> {
        self.db.scheduled_post_stats().await
    }

    async fn attempt(
        &self,
        post: &ScheduledPost,
    ) -> std::result::Result<(String, PublishOutcome), AttemptError> {
        let params = match PlatformParams::from_json(post.platform_params.as_deref()) {
            Ok(params) => params,
            Err(e) => {
                return Err(AttemptError::Failed {
                    published_id: None,
                    message: format!("Invalid platform params: {}", e),
                })
            }
        };

        let (publisher, credentials) = match self
            .resolve_publisher(post.platform, &post.social_account_id)
            .await
        {
            Ok(resolved) => resolved,
            Err(e) => {
                return Err(AttemptError::Failed {
                    published_id: None,
                    message: e.to_string(),
                })
            }
        };

        let record = PublishedPost::new_pending(
            post.business_id.clone(),
            post.social_account_id.clone(),
            post.content_text.clone(),
            post.platform,
        );
        if let Err(e) = self.db.create_published_post(&record).await {
            return Err(AttemptError::Failed {
                published_id: None,
                message: e.to_string(),
            });
        }

        match publisher
            .publish(&post.content_text, &credentials, &params)
            .await
        {
            Ok(outcome) => {
                if let Err(e) = self
                    .db
                    .update_published_result(
                        &record.id,
                        PublishedStatus::Published,
                        Some(&outcome.post_id),
                        Some(&outcome.url),
                        None,
                        Some(outcome.published_at),
                    )
                    .await
                {
                    return Err(AttemptError::Failed {
                        published_id: Some(record.id),
                        message: e.to_string(),
                    });
                }
                Ok((record.id, outcome))
            }
            Err(PlatformError::Partial {
                message,
                posted_ids,
                first_url,
            }) => {
                let _ = self
                    .db
                    .update_published_result(
                        &record.id,
                        PublishedStatus::Partial,
                        posted_ids.first().map(String::as_str),
                        first_url.as_deref(),
                        Some(&message),
                        Some(chrono::Utc::now().timestamp()),
                    )
                    .await;
                Err(AttemptError::Partial {
                    published_id: record.id,
                    posted_ids,
                    first_url,
                    message,
                })
            }
            Err(err) => Err(AttemptError::Failed {
                published_id: Some(record.id),
                message: err.to_string(),
            }),
        }
    }

    /// Record a failed attempt and re-enqueue while the retry budget lasts.
    async fn record_failure(&self, post_id: &str, message: &str) -> Result<()> {
        let retry_count = match self.db.mark_scheduled_failed(post_id, message).await? {
            Some(count) => count,
            // Lost the race; another worker owns the row now.
            None => return Ok(()),
        };

        if retry_count < self.config.max_publish_retries {
            let delay = RETRY_BASE_DELAY_SECS << (retry_count - 1).max(0);
            let eta = chrono::Utc::now().timestamp() + delay;
            let requeued = self
                .db
                .transition_scheduled_status(post_id, ScheduledStatus::Failed, ScheduledStatus::Queued)
                .await?;
            if requeued {
                let handle = self.queue.enqueue(PUBLISH_TASK, post_id, eta).await?;
                self.db.set_task_handle(post_id, Some(&handle)).await?;
                tracing::warn!(
                    post_id,
                    retry_count,
                    delay_secs = delay,
                    "publish failed, retrying: {}",
                    message
                );
            }
        } else {
            tracing::error!(post_id, retry_count, "publish failed permanently: {}", message);
        }
        Ok(())
    }

    async fn checked_account(
        &self,
        business_id: &str,
        social_account_id: &str,
    ) -> Result<crate::types::SocialAccount> {
        let account = self
            .db
            .get_account(social_account_id)
            .await?
            .ok_or_else(|| {
                CrosscastError::InvalidInput(format!(
                    "Social account {} not found",
                    social_account_id
                ))
            })?;
        if account.business_id != business_id {
            return Err(CrosscastError::InvalidInput(format!(
                "Social account {} does not belong to business {}",
                social_account_id, business_id
            )));
        }
        if !account.is_active {
            return Err(CrosscastError::InvalidInput(format!(
                "Social account {} is disconnected",
                social_account_id
            )));
        }
        Ok(account)
    }

    async fn resolve_publisher(
        &self,
        platform: PlatformKind,
        social_account_id: &str,
    ) -> Result<(Arc<dyn Publisher>, PlatformCredentials)> {
        match &self.publishers {
            PublishSource::Live { gateway, registry } => {
                let (_, credentials) = gateway.resolve(social_account_id).await?;
                Ok((registry.get(platform), credentials))
            }
            PublishSource::Fixed(publishers) => {
                let publisher = publishers.get(&platform).cloned().ok_or_else(|| {
                    CrosscastError::InvalidInput(format!("No publisher for platform {}", platform))
                })?;
                let account = self
                    .db
                    .get_account(social_account_id)
                    .await?
                    .ok_or_else(|| {
                        CrosscastError::InvalidInput(format!(
                            "Social account {} not found",
                            social_account_id
                        ))
                    })?;
                // Tokens pass through undecrypted; fixed publishers never use
                // them for real calls.
                let credentials = PlatformCredentials {
                    access_token: SecretString::from(account.access_token_enc),
                    platform_username: account.platform_username,
                    page_id: account.page_id,
                    instagram_account_id: account.instagram_account_id,
                };
                Ok((publisher, credentials))
            }
        }
    }

    async fn require_post(&self, post_id: &str) -> Result<ScheduledPost> {
        self.db
            .get_scheduled_post(post_id)
            .await?
            .ok_or_else(|| {
                CrosscastError::InvalidInput(format!("Scheduled post {} not found", post_id))
            })
    }
}
