//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use coview_shared::constants::DEFAULT_HTTP_PORT;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file. Parent directories are created on startup.
    /// Env: `DATABASE_PATH`
    /// Default: `./coview.db`
    pub database_path: PathBuf,

    /// Origin that shareable URLs are built on.
    /// Env: `PUBLIC_ORIGIN`
    /// Default: `http://localhost:8080`
    pub public_origin: String,

    /// Upper bound on a single store call before it is reported as failed.
    /// Env: `STORE_TIMEOUT_MS`
    /// Default: `5000`
    pub store_timeout: Duration,

    /// Sustained requests per second per client.
    /// Env: `RATE_LIMIT_PER_SEC`
    /// Default: `10`
    pub rate_limit_per_sec: f64,

    /// Burst size per client.
    /// Env: `RATE_LIMIT_BURST`
    /// Default: `30`
    pub rate_limit_burst: f64,

    /// Rate limiter buckets idle for longer than this are evicted.
    /// Env: `RATE_LIMIT_IDLE_SECS`
    /// Default: `600`
    pub rate_limit_idle: Duration,

    /// Number of top-level threads shown when the request has no `limit`.
    /// Env: `THREAD_DISPLAY_LIMIT`
    /// Default: unset (show everything).
    pub thread_display_limit: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: PathBuf::from("./coview.db"),
            public_origin: format!("http://localhost:{DEFAULT_HTTP_PORT}"),
            store_timeout: Duration::from_millis(5000),
            rate_limit_per_sec: 10.0,
            rate_limit_burst: 30.0,
            rate_limit_idle: Duration::from_secs(600),
            thread_display_limit: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ServerConfig::from_env`] over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = parsed(&lookup, "HTTP_ADDR") {
            config.http_addr = addr;
        }

        if let Some(path) = lookup("DATABASE_PATH").filter(|p| !p.trim().is_empty()) {
            config.database_path = PathBuf::from(path);
        }

        if let Some(origin) = lookup("PUBLIC_ORIGIN").filter(|o| !o.trim().is_empty()) {
            config.public_origin = origin.trim().trim_end_matches('/').to_string();
        }

        if let Some(ms) = parsed::<u64>(&lookup, "STORE_TIMEOUT_MS").filter(|ms| *ms > 0) {
            config.store_timeout = Duration::from_millis(ms);
        }

        if let Some(rate) = parsed::<f64>(&lookup, "RATE_LIMIT_PER_SEC").filter(|r| *r > 0.0) {
            config.rate_limit_per_sec = rate;
        }

        if let Some(burst) = parsed::<f64>(&lookup, "RATE_LIMIT_BURST").filter(|b| *b >= 1.0) {
            config.rate_limit_burst = burst;
        }

        if let Some(secs) = parsed::<u64>(&lookup, "RATE_LIMIT_IDLE_SECS") {
            config.rate_limit_idle = Duration::from_secs(secs);
        }

        if let Some(limit) = parsed::<usize>(&lookup, "THREAD_DISPLAY_LIMIT") {
            config.thread_display_limit = Some(limit);
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

/// Parse a variable, warning and returning `None` when it does not parse.
fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Invalid value, using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = config_from(&[]);
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert_eq!(config.database_path, PathBuf::from("./coview.db"));
        assert_eq!(config.public_origin, "http://localhost:8080");
        assert_eq!(config.store_timeout, Duration::from_millis(5000));
        assert_eq!(config.thread_display_limit, None);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("HTTP_ADDR", "127.0.0.1:9000"),
            ("DATABASE_PATH", "/tmp/x.db"),
            ("PUBLIC_ORIGIN", "https://app.example.com/"),
            ("STORE_TIMEOUT_MS", "250"),
            ("RATE_LIMIT_BURST", "5"),
            ("THREAD_DISPLAY_LIMIT", "20"),
        ]);
        assert_eq!(config.http_addr, ([127, 0, 0, 1], 9000).into());
        assert_eq!(config.database_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(config.public_origin, "https://app.example.com");
        assert_eq!(config.store_timeout, Duration::from_millis(250));
        assert_eq!(config.rate_limit_burst, 5.0);
        assert_eq!(config.thread_display_limit, Some(20));
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config = config_from(&[
            ("HTTP_ADDR", "not an address"),
            ("STORE_TIMEOUT_MS", "0"),
            ("RATE_LIMIT_PER_SEC", "fast"),
        ]);
        let default = ServerConfig::default();
        assert_eq!(config.http_addr, default.http_addr);
        assert_eq!(config.store_timeout, default.store_timeout);
        assert_eq!(config.rate_limit_per_sec, default.rate_limit_per_sec);
    }
}
