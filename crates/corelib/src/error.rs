//! Error taxonomy for the Chord core.
//!
//! One variant per kind in the error handling design: stabilization
//! failures are recovered locally and never surface here (they are logged
//! at `tracing::debug!` and retried next round); everything below is either
//! surfaced to a caller (`lookup`, `join_ring`) or returned across the
//! transport boundary.

use thiserror::Error;

/// Result type alias used throughout the core.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rpc timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("malformed frame: {0}")]
    DecodeError(String),

    #[error("unknown message tag: {0}")]
    UnknownMessageType(u8),

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("lookup exhausted hop limit ({0} hops)")]
    LookupExhausted(usize),

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("bootstrap failed: exhausted all remotes, last error: {source}")]
    BootstrapFailure {
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Stabilization recovery treats a timeout and a decode failure the same
    /// as an unreachable peer: drop the candidate and move on.
    pub fn is_liveness_failure(&self) -> bool {
        matches!(
            self,
            Error::NetworkUnreachable(_) | Error::Timeout(_) | Error::DecodeError(_)
        )
    }
}
