//! Operator-facing CLI (A6, ambient).
//!
//! `chord-cli` wraps `chord-core` + `chord-transport` + `chord-replication`
//! into four subcommands: `create`/`join` stand up and serve a node until
//! interrupted; `topology`/`lookup` are read-only clients against an
//! already-running one.

pub mod commands;
pub mod config;
