//! Third-party wire extension point (§4.5, §10).
//!
//! The core's nine message tags are closed — `MessageTag` is a fixed enum,
//! not an open registry. A `TransportHook` lets application code claim an
//! unused tag byte and handle its payload directly, without the core or
//! `chord-transport` needing to know anything about it. This mirrors the
//! original `RegisterHook`/`TransportHook` pair: decode-and-handle bundled
//! behind one tag.

use async_trait::async_trait;

use chord_core::error::Result;

#[async_trait]
pub trait TransportHook: Send + Sync {
    /// The tag byte this hook claims. Must not collide with a `MessageTag`
    /// discriminant (0-8); registering on a reserved tag is a logic error
    /// the registrant is responsible for avoiding.
    fn tag(&self) -> u8;

    /// Handle one request payload for this hook's tag, returning the raw
    /// reply payload to frame back under the same tag.
    async fn handle(&self, payload: &[u8]) -> Result<Vec<u8>>;
}
