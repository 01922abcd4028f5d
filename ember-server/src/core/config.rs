//! Server configuration
//!
//! All settings can be overridden through environment variables:
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | WORK_DIR | /var/lib/ember | Working directory (database, logs) |
//! | HTTP_PORT | 3000 | HTTP API port |
//! | PAPER_WIDTH | 48 | Ticket width in characters (80mm paper) |
//! | SEND_TIMEOUT_MS | 10000 | Bound on one transport send |
//! | PROBE_TIMEOUT_MS | 5000 | Bound on a connection test |
//! | PRINT_MAX_ATTEMPTS | 3 | Delivery attempts before a job fails |
//! | BACKOFF_BASE_MS | 2000 | First retry delay |
//! | BACKOFF_CAP_MS | 60000 | Retry delay ceiling |
//! | STALE_PRINTING_MS | 120000 | Reclaim threshold for orphaned jobs |
//! | ENVIRONMENT | development | Runtime environment |

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Working directory for the database and logs
    pub work_dir: String,
    /// HTTP API port
    pub http_port: u16,
    /// Ticket width in characters
    pub paper_width: usize,
    /// Bound on one transport send (connect + write), milliseconds
    pub send_timeout_ms: u64,
    /// Bound on a connectivity probe, milliseconds
    pub probe_timeout_ms: u64,
    /// Delivery attempts before a job settles as failed
    pub print_max_attempts: u32,
    /// First retry delay, milliseconds
    pub backoff_base_ms: i64,
    /// Retry delay ceiling, milliseconds
    pub backoff_cap_ms: i64,
    /// Age after which an orphaned `printing` job is reclaimed, milliseconds
    pub stale_printing_ms: i64,
    /// Runtime environment: development | staging | production
    pub environment: String,
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables, with defaults
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/ember".into()),
            http_port: env_parse("HTTP_PORT", 3000),
            paper_width: env_parse("PAPER_WIDTH", 48),
            send_timeout_ms: env_parse("SEND_TIMEOUT_MS", 10_000),
            probe_timeout_ms: env_parse("PROBE_TIMEOUT_MS", 5_000),
            print_max_attempts: env_parse("PRINT_MAX_ATTEMPTS", shared::DEFAULT_MAX_ATTEMPTS),
            backoff_base_ms: env_parse("BACKOFF_BASE_MS", 2_000),
            backoff_cap_ms: env_parse("BACKOFF_CAP_MS", 60_000),
            stale_printing_ms: env_parse("STALE_PRINTING_MS", 120_000),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
