//! Ring configuration (A2, ambient).

use std::time::Duration;

use crate::error::{Error, Result};
use crate::identifier::M_BITS;

/// Observability verbosity, mapped onto `tracing` at the call sites that
/// used to gate on it by hand in the canonical implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Null,
    Info,
    Debug,
}

impl LogLevel {
    pub fn as_tracing_level(self) -> Option<tracing::Level> {
        match self {
            LogLevel::Null => None,
            LogLevel::Info => Some(tracing::Level::INFO),
            LogLevel::Debug => Some(tracing::Level::DEBUG),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub hostname: String,
    pub num_vnodes: usize,
    pub stabilize_min: Duration,
    pub stabilize_max: Duration,
    pub num_successors: usize,
    pub replicas: usize,
    pub log_level: LogLevel,
    /// Per-RPC client timeout; promoted out of the transport and into config
    /// since every RPC in §4.5 is required to respect it.
    pub client_timeout: Duration,
    /// Forwarding hop cap for `find_successors`, default `3 * M_BITS`.
    pub hop_limit: usize,
}

impl Config {
    pub fn builder(hostname: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(hostname)
    }
}

/// Builder producing a validated [`Config`]; mirrors the canonical
/// `DefaultConfig(hostname)` defaults (3 vnodes, 1-3s jitter, 8 successors,
/// 2 replicas) while adding the ambient `client_timeout`/`hop_limit` knobs.
pub struct ConfigBuilder {
    hostname: String,
    num_vnodes: usize,
    stabilize_min: Duration,
    stabilize_max: Duration,
    num_successors: usize,
    replicas: usize,
    log_level: LogLevel,
    client_timeout: Duration,
    hop_limit: usize,
}

impl ConfigBuilder {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            num_vnodes: 3,
            stabilize_min: Duration::from_secs(1),
            stabilize_max: Duration::from_secs(3),
            num_successors: 8,
            replicas: 2,
            log_level: LogLevel::Info,
            client_timeout: Duration::from_secs(5),
            hop_limit: 3 * M_BITS,
        }
    }

    pub fn num_vnodes(mut self, n: usize) -> Self {
        self.num_vnodes = n;
        self
    }

    pub fn stabilize_interval(mut self, min: Duration, max: Duration) -> Self {
        self.stabilize_min = min;
        self.stabilize_max = max;
        self
    }

    pub fn num_successors(mut self, n: usize) -> Self {
        self.num_successors = n;
        self
    }

    pub fn replicas(mut self, n: usize) -> Self {
        self.replicas = n;
        self
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    pub fn client_timeout(mut self, timeout: Duration) -> Self {
        self.client_timeout = timeout;
        self
    }

    pub fn hop_limit(mut self, limit: usize) -> Self {
        self.hop_limit = limit;
        self
    }

    pub fn build(self) -> Result<Config> {
        if self.num_vnodes == 0 {
            return Err(Error::ConfigError("num_vnodes must be >= 1".into()));
        }
        if self.num_successors == 0 {
            return Err(Error::ConfigError("num_successors must be >= 1".into()));
        }
        if self.stabilize_min > self.stabilize_max {
            return Err(Error::ConfigError(
                "stabilize_min must be <= stabilize_max".into(),
            ));
        }
        if self.hostname.is_empty() {
            return Err(Error::ConfigError("hostname must not be empty".into()));
        }
        Ok(Config {
            hostname: self.hostname,
            num_vnodes: self.num_vnodes,
            stabilize_min: self.stabilize_min,
            stabilize_max: self.stabilize_max,
            num_successors: self.num_successors,
            replicas: self.replicas,
            log_level: self.log_level,
            client_timeout: self.client_timeout,
            hop_limit: self.hop_limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_canonical_dendrite_defaults() {
        let cfg = Config::builder("host-a").build().unwrap();
        assert_eq!(cfg.num_vnodes, 3);
        assert_eq!(cfg.num_successors, 8);
        assert_eq!(cfg.replicas, 2);
    }

    #[test]
    fn rejects_inverted_stabilize_bounds() {
        let err = Config::builder("host-a")
            .stabilize_interval(Duration::from_secs(5), Duration::from_secs(1))
            .build();
        assert!(matches!(err, Err(Error::ConfigError(_))));
    }

    #[test]
    fn rejects_zero_vnodes() {
        let err = Config::builder("host-a").num_vnodes(0).build();
        assert!(matches!(err, Err(Error::ConfigError(_))));
    }
}
