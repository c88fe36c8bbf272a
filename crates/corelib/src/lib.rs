//! Core library for the Chord distributed hash table ring.
//!
//! This crate provides the fundamental abstractions for a Chord overlay:
//! - 160-bit ring identifier algebra (`identifier`)
//! - Vnode data model, local and remote (`vnode`)
//! - Ring configuration (`config`)
//! - The transport contract RPCs are defined against (`transport`)
//! - Lookup/forwarding logic (`lookup`)
//! - Periodic stabilization (`stabilize`)
//! - Ring lifecycle: create, join, shutdown (`ring`)
//! - Delegate hooks for ring-structure events (`hooks`)
//! - Read-only diagnostics over a running ring (`topology`)

pub mod config;
pub mod error;
pub mod hooks;
pub mod identifier;
pub mod lookup;
pub mod ring;
pub mod stabilize;
pub mod topology;
pub mod transport;
pub mod vnode;

pub use config::{Config, ConfigBuilder, LogLevel};
pub use error::{Error, Result};
pub use hooks::{DelegateHook, EventCtx, HookBus, RingEventType};
pub use identifier::{between, distance, hash, Distance, Identifier, IdentifierHasher, M_BITS};
pub use ring::Ring;
pub use topology::Topology;
pub use transport::{FindSuccessorsReply, LocalTransport, Transport, VnodeHandler};
pub use vnode::{LocalVnode, Vnode};
