//! Logging setup shared by the crosscast binaries.
//!
//! Everything goes to stderr so command output stays pipeable. The CLIs log
//! errors only by default and the delivery daemon logs at info; both defer
//! to `CROSSCAST_LOG_LEVEL`, and `--verbose` forces debug. The output shape
//! comes from `CROSSCAST_LOG_FORMAT` (`text`, `json`, or `pretty`).

use std::str::FromStr;

use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Single-line output without decoration.
    Text,
    /// One JSON object per line, for log collectors.
    Json,
    /// Multi-line colored output for debugging sessions.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(format!(
                "unknown log format '{}' (expected text, json, or pretty)",
                other
            )),
        }
    }
}

/// Install the global subscriber for a binary. `default_level` applies when
/// neither `CROSSCAST_LOG_LEVEL` nor `--verbose` says otherwise.
///
/// Call once at startup; a second call panics in the subscriber.
pub fn init(default_level: &str, verbose: bool) {
    let format = resolve_format(std::env::var("CROSSCAST_LOG_FORMAT").ok().as_deref());
    let level = resolve_level(
        std::env::var("CROSSCAST_LOG_LEVEL").ok().as_deref(),
        default_level,
        verbose,
    );
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.with_target(false).init(),
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}

fn resolve_format(env: Option<&str>) -> LogFormat {
    env.and_then(|v| v.parse().ok()).unwrap_or(LogFormat::Text)
}

fn resolve_level(env: Option<&str>, default_level: &str, verbose: bool) -> String {
    if verbose {
        "debug".to_string()
    } else {
        env.unwrap_or(default_level).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("Pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("syslog".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_resolve_format_defaults_to_text() {
        assert_eq!(resolve_format(None), LogFormat::Text);
        assert_eq!(resolve_format(Some("json")), LogFormat::Json);
        // unparseable values fall back rather than erroring at startup
        assert_eq!(resolve_format(Some("???")), LogFormat::Text);
    }

    #[test]
    fn test_resolve_level_precedence() {
        assert_eq!(resolve_level(None, "error", false), "error");
        assert_eq!(resolve_level(Some("warn"), "error", false), "warn");
        // --verbose beats the env var
        assert_eq!(resolve_level(Some("warn"), "error", true), "debug");
    }
}
