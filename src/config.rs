use crate::favorites::FavoritesPolicy;
use anyhow::{anyhow, Context, Result};
use std::{env, net::SocketAddr, time::Duration};

pub const DEFAULT_BACKEND_URL: &str = "http://app:5000";
pub const DEFAULT_PROXY_BIND: &str = "0.0.0.0:3000";
pub const DEFAULT_POPULAR_COUNT: u32 = 20;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub backend_url: String,
    pub proxy_bind: SocketAddr,
    pub popular_count: u32,
    pub favorites_policy: FavoritesPolicy,
    pub http_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            proxy_bind: SocketAddr::from(([0, 0, 0, 0], 3000)),
            popular_count: DEFAULT_POPULAR_COUNT,
            favorites_policy: FavoritesPolicy::default(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup; unset or blank keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend_url = get("BACKEND_URL")
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        if !backend_url.starts_with("http://") && !backend_url.starts_with("https://") {
            return Err(anyhow!(
                "BACKEND_URL must start with http:// or https:// (got '{}')",
                backend_url
            ));
        }

        let proxy_bind = get("PROXY_BIND")
            .unwrap_or_else(|| DEFAULT_PROXY_BIND.to_string())
            .parse::<SocketAddr>()
            .context("PROXY_BIND is not a valid socket address")?;

        let popular_count = match get("POPULAR_COUNT") {
            Some(v) => v
                .trim()
                .parse::<u32>()
                .context("POPULAR_COUNT must be a positive integer")?,
            None => DEFAULT_POPULAR_COUNT,
        };
        if popular_count == 0 {
            return Err(anyhow!("POPULAR_COUNT must be at least 1"));
        }

        let favorites_policy = match get("FAVORITES_POLICY") {
            Some(v) => v.parse::<FavoritesPolicy>()?,
            None => FavoritesPolicy::default(),
        };

        let timeout_secs = match get("HTTP_TIMEOUT_SECS") {
            Some(v) => v
                .trim()
                .parse::<u64>()
                .context("HTTP_TIMEOUT_SECS must be an integer")?,
            None => DEFAULT_HTTP_TIMEOUT_SECS,
        };

        Ok(Self {
            backend_url,
            proxy_bind,
            popular_count,
            favorites_policy,
            http_timeout: Duration::from_secs(timeout_secs.max(1)),
        })
    }
}
