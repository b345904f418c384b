//! Defaults and environment overrides
//!
//! | variable                  | meaning                                   | default |
//! |---------------------------|-------------------------------------------|---------|
//! | `OCISIZE_CONNECT_TIMEOUT` | connect timeout in seconds                | 10      |
//! | `OCISIZE_TIMEOUT`         | whole request timeout in seconds          | 30      |
//! | `OCISIZE_CONCURRENCY`     | parallel platform manifest fetches        | 8       |

use std::{env, str::FromStr, time::Duration};

pub const PROJECT_NAME: &str = "ocisize";

/// Registry used when the image name does not start with a host
pub const DEFAULT_REGISTRY: &str = "registry-1.docker.io";

/// Upper bound of parallel platform manifest fetches in one query
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Settings of the HTTP transport and resolver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub connect_timeout: Duration,
    pub timeout: Duration,
    pub concurrency: usize,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            connect_timeout: Duration::from_secs(10),
            timeout: Duration::from_secs(30),
            concurrency: DEFAULT_CONCURRENCY,
            user_agent: format!("{}/{}", PROJECT_NAME, env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Config {
    /// Default config overridden by `OCISIZE_*` environment variables
    pub fn from_env() -> Self {
        let mut config = Config::default();
        if let Some(secs) = env_var::<u64>("OCISIZE_CONNECT_TIMEOUT") {
            config.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_var::<u64>("OCISIZE_TIMEOUT") {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(n) = env_var::<usize>("OCISIZE_CONCURRENCY") {
            config.concurrency = n.max(1);
        }
        config
    }
}

fn env_var<T: FromStr>(key: &str) -> Option<T> {
    let value = env::var(key).ok()?;
    match value.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("Ignore invalid value of {}: {:?}", key, value);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timeouts_are_bounded() {
        let config = Config::default();
        assert!(config.connect_timeout <= Duration::from_secs(10));
        assert!(config.timeout <= Duration::from_secs(30));
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
        assert!(config.user_agent.starts_with("ocisize/"));
    }
}
