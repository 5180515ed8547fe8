//! Error types for Crosscast

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CrosscastError>;

#[derive(Error, Debug)]
pub enum CrosscastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl CrosscastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CrosscastError::InvalidInput(_) => 3,
            CrosscastError::Platform(PlatformError::Authentication(_)) => 2,
            CrosscastError::Platform(_) => 1,
            CrosscastError::Config(_) => 1,
            CrosscastError::Database(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Shared error taxonomy for platform publishers and analytics fetchers.
///
/// Callers branch on the variant to decide whether to retry, wait, surface
/// partial success, or give up, so mapping platform responses onto the right
/// variant matters more than the message text.
#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Content validation failed: {0}")]
    Validation(String),

    /// Rate limited by the platform. `wait_secs` is the platform's own hint
    /// (Retry-After or reset timestamp) when one was provided.
    #[error("Rate limit exceeded: {message}")]
    RateLimited {
        message: String,
        wait_secs: Option<u64>,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate content rejected: {0}")]
    Duplicate(String),

    /// A multi-part publish failed after some parts went out. The ids of the
    /// parts that did post are preserved so the caller can record them.
    #[error("Partial publish failure: {message}")]
    Partial {
        message: String,
        posted_ids: Vec<String>,
        first_url: Option<String>,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Platform API error ({status}): {message}")]
    Api { status: u16, message: String },
}

impl PlatformError {
    /// Transient errors are worth retrying; everything else is permanent
    /// for the current attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlatformError::Network(_)
                | PlatformError::Timeout(_)
                | PlatformError::RateLimited { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_invalid_input() {
        let error = CrosscastError::InvalidInput("Empty content".to_string());
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_authentication_error() {
        let platform_error = PlatformError::Authentication("Token expired".to_string());
        let error = CrosscastError::Platform(platform_error);
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_other_platform_errors() {
        let cases = vec![
            PlatformError::Validation("too long".to_string()),
            PlatformError::RateLimited {
                message: "slow down".to_string(),
                wait_secs: Some(30),
            },
            PlatformError::NotFound("gone".to_string()),
            PlatformError::Duplicate("seen before".to_string()),
            PlatformError::Network("refused".to_string()),
            PlatformError::Timeout("30s".to_string()),
            PlatformError::Api {
                status: 500,
                message: "boom".to_string(),
            },
        ];
        for platform_error in cases {
            let error = CrosscastError::Platform(platform_error);
            assert_eq!(error.exit_code(), 1);
        }
    }

    #[test]
    fn test_exit_code_config_and_database() {
        let config_error = ConfigError::MissingField("database.path".to_string());
        assert_eq!(CrosscastError::Config(config_error).exit_code(), 1);

        let db_error = DbError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "File not found",
        ));
        assert_eq!(CrosscastError::Database(db_error).exit_code(), 1);
    }

    #[test]
    fn test_transient_classification() {
        assert!(PlatformError::Network("refused".to_string()).is_transient());
        assert!(PlatformError::Timeout("30s".to_string()).is_transient());
        assert!(PlatformError::RateLimited {
            message: "429".to_string(),
            wait_secs: None,
        }
        .is_transient());

        assert!(!PlatformError::Validation("too long".to_string()).is_transient());
        assert!(!PlatformError::Authentication("bad token".to_string()).is_transient());
        assert!(!PlatformError::Duplicate("dup".to_string()).is_transient());
        assert!(!PlatformError::NotFound("404".to_string()).is_transient());
        assert!(!PlatformError::Api {
            status: 500,
            message: "boom".to_string(),
        }
        .is_transient());
    }

    #[test]
    fn test_error_message_formatting() {
        let error = CrosscastError::InvalidInput("Content cannot be empty".to_string());
        assert_eq!(
            format!("{}", error),
            "Invalid input: Content cannot be empty"
        );

        let platform_error = PlatformError::Authentication("LinkedIn token expired".to_string());
        let error = CrosscastError::Platform(platform_error);
        assert_eq!(
            format!("{}", error),
            "Platform error: Authentication failed: LinkedIn token expired"
        );
    }

    #[test]
    fn test_rate_limited_carries_wait_hint() {
        let error = PlatformError::RateLimited {
            message: "Twitter rate limit exceeded".to_string(),
            wait_secs: Some(900),
        };
        match &error {
            PlatformError::RateLimited { wait_secs, .. } => {
                assert_eq!(*wait_secs, Some(900));
            }
            _ => panic!("Expected RateLimited"),
        }
        assert!(format!("{}", error).contains("Twitter rate limit exceeded"));
    }

    #[test]
    fn test_partial_preserves_posted_ids() {
        let error = PlatformError::Partial {
            message: "Thread failed at tweet 3/5".to_string(),
            posted_ids: vec!["1".to_string(), "2".to_string()],
            first_url: Some("https://twitter.com/u/status/1".to_string()),
        };
        match &error {
            PlatformError::Partial {
                posted_ids,
                first_url,
                ..
            } => {
                assert_eq!(posted_ids.len(), 2);
                assert!(first_url.as_deref().unwrap().ends_with("/status/1"));
            }
            _ => panic!("Expected Partial"),
        }
    }

    #[test]
    fn test_error_conversion_from_platform_error() {
        let platform_error = PlatformError::Network("test".to_string());
        let error: CrosscastError = platform_error.into();
        assert!(matches!(error, CrosscastError::Platform(_)));
    }

    #[test]
    fn test_platform_error_clone() {
        let original = PlatformError::Partial {
            message: "mid-thread".to_string(),
            posted_ids: vec!["a".to_string()],
            first_url: None,
        };
        let cloned = original.clone();
        assert_eq!(format!("{}", original), format!("{}", cloned));
    }
}
