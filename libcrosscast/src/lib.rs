//! Crosscast - multi-platform social publishing and analytics
//!
//! This library provides the core functionality for scheduling and publishing
//! posts to LinkedIn, Twitter and Meta surfaces, and for syncing per-post
//! engagement metrics back into a local database.

pub mod analytics;
pub mod config;
pub mod credentials;
pub mod db;
pub mod error;
pub mod http;
pub mod logging;
pub mod platforms;
pub mod retry;
pub mod scheduler;
pub mod segmenter;
pub mod types;

// Re-export commonly used types
pub use analytics::sync::{AnalyticsSyncService, SyncStatus, SyncSummary};
pub use config::Config;
pub use credentials::{CredentialGateway, PlatformCredentials, TokenCipher};
pub use db::Database;
pub use error::{CrosscastError, PlatformError, Result};
pub use scheduler::{DbTaskQueue, SchedulerService, TaskQueue};
pub use types::{
    PlatformKind, PlatformParams, PublishOutcome, PublishedPost, ScheduledPost, ScheduledStatus,
    SocialAccount,
};
