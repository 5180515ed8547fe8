//! Delayed-delivery task queue.
//!
//! The scheduler hands publish work to a [`TaskQueue`] with an ETA and keeps
//! the returned handle so the task can be revoked on cancel or reschedule.
//! The production queue is a sqlite table polled by the delivery daemon;
//! tests swap in [`MockQueue`].

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::db::Database;
use crate::error::{CrosscastError, Result};

/// The task name used for scheduled publishes.
pub const PUBLISH_TASK: &str = "publish_post";

#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Enqueue `task` with `args` to run no earlier than `eta` (epoch
    /// seconds). Returns the handle used to revoke it.
    async fn enqueue(&self, task: &str, args: &str, eta: i64) -> Result<String>;

    /// Remove a queued task. Returns false when the handle is already gone
    /// (delivered, claimed, or never existed).
    async fn revoke(&self, handle: &str) -> Result<bool>;

    /// Whether a handle is still waiting in the queue.
    async fn is_queued(&self, handle: &str) -> Result<bool>;
}

/// Queue backed by the `queued_tasks` table.
pub struct DbTaskQueue {
    db: Database,
}

impl DbTaskQueue {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TaskQueue for DbTaskQueue {
    async fn enqueue(&self, task: &str, args: &str, eta: i64) -> Result<String> {
        let handle = Uuid::new_v4().to_string();
        self.db.enqueue_task(&handle, task, args, eta).await?;
        Ok(handle)
    }

    async fn revoke(&self, handle: &str) -> Result<bool> {
        self.db.revoke_task(handle).await
    }

    async fn is_queued(&self, handle: &str) -> Result<bool> {
        self.db.task_exists(handle).await
    }
}

/// A queued entry recorded by [`MockQueue`].
#[derive(Debug, Clone)]
pub struct MockEntry {
    pub handle: String,
    pub task: String,
    pub args: String,
    pub eta: i64,
}

/// In-memory queue for tests.
#[derive(Default)]
pub struct MockQueue {
    entries: Arc<Mutex<Vec<MockEntry>>>,
    revoked: Arc<Mutex<Vec<String>>>,
    revoke_error: Arc<Mutex<Option<String>>>,
}

impl MockQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<MockEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn revoked(&self) -> Vec<String> {
        self.revoked.lock().unwrap().clone()
    }

    pub fn enqueue_count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Make every later `revoke` call fail with `message`.
    pub fn fail_revoke_with(&self, message: &str) {
        *self.revoke_error.lock().unwrap() = Some(message.to_string());
    }
}

#[async_trait]
impl TaskQueue for MockQueue {
    async fn enqueue(&self, task: &str, args: &str, eta: i64) -> Result<String> {
        let handle = Uuid::new_v4().to_string();
        self.entries.lock().unwrap().push(MockEntry {
            handle: handle.clone(),
            task: task.to_string(),
            args: args.to_string(),
            eta,
        });
        Ok(handle)
    }

    async fn revoke(&self, handle: &str) -> Result<bool> {
        if let Some(message) = self.revoke_error.lock().unwrap().clone() {
            return Err(CrosscastError::InvalidInput(message));
        }
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|e| e.handle != handle);
        let removed = entries.len() < before;
        if removed {
            self.revoked.lock().unwrap().push(handle.to_string());
        }
        Ok(removed)
    }

    async fn is_queued(&self, handle: &str) -> Result<bool> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .any(|e| e.handle == handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_db_queue_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("queue.db");
        let db = Database::new(path.to_str().unwrap()).await.unwrap();
        let queue = DbTaskQueue::new(db.clone());

        let handle = queue.enqueue(PUBLISH_TASK, "post-1", 1_900_000_000).await.unwrap();
        assert!(queue.is_queued(&handle).await.unwrap());

        assert!(queue.revoke(&handle).await.unwrap());
        assert!(!queue.is_queued(&handle).await.unwrap());
        // revoking again is a no-op
        assert!(!queue.revoke(&handle).await.unwrap());
    }

    #[tokio::test]
    async fn test_mock_queue_records_entries() {
        let queue = MockQueue::new();
        let handle = queue.enqueue(PUBLISH_TASK, "post-1", 100).await.unwrap();
        assert_eq!(queue.enqueue_count(), 1);
        assert_eq!(queue.entries()[0].args, "post-1");

        assert!(queue.revoke(&handle).await.unwrap());
        assert_eq!(queue.enqueue_count(), 0);
        assert_eq!(queue.revoked(), vec![handle]);
    }
}
