//! Built-in fallback values used when no config source sets a field.

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 30_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_MAX_RETRY_INTERVAL_MS: u64 = 300_000;

pub fn default_categories() -> Vec<String> {
    vec!["messages".to_string(), "activity".to_string()]
}
