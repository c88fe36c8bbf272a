//! Reference wire transport (A5).
//!
//! `TcpTransport` implements `chord_core::Transport` over length-prefixed,
//! tag-framed connections (`framing` + `protocol`); `InProcessTransport`
//! backs multi-host scenario tests without sockets.

pub mod framing;
pub mod hook;
pub mod in_process;
pub mod protocol;
pub mod tcp;

pub use hook::TransportHook;
pub use in_process::{InProcessNetwork, InProcessTransport};
pub use protocol::{Message, MessageTag};
pub use tcp::TcpTransport;
