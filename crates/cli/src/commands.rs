//! Subcommand argument parsing and dispatch.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;

use chord_core::identifier::{hash, Identifier};
use chord_core::transport::Transport;
use chord_core::{Config, LogLevel, Ring};
use chord_replication::ReplicaTracker;
use chord_transport::TcpTransport;

use crate::config::init_tracing;

#[derive(Parser)]
#[command(name = "chord-cli", about = "Operate a Chord ring node")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start a brand-new ring on this host and serve until interrupted.
    Create(CreateArgs),
    /// Join an existing ring through a bootstrap host and serve until interrupted.
    Join(JoinArgs),
    /// Print the local vnode topology of an already-running host.
    Topology(TopologyArgs),
    /// Resolve a key against an already-running host.
    Lookup(LookupArgs),
}

#[derive(Parser)]
pub struct CreateArgs {
    /// Address this node listens on and advertises to peers, e.g. 127.0.0.1:7000.
    #[arg(long)]
    pub hostname: String,
    #[arg(long, default_value_t = 3)]
    pub num_vnodes: usize,
    #[arg(long, default_value_t = 8)]
    pub num_successors: usize,
    #[arg(long, default_value_t = 2)]
    pub replicas: usize,
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: CliLogLevel,
}

#[derive(Parser)]
pub struct JoinArgs {
    #[arg(long)]
    pub hostname: String,
    /// Address of any already-running host in the ring to bootstrap from.
    #[arg(long)]
    pub existing: String,
    #[arg(long, default_value_t = 3)]
    pub num_vnodes: usize,
    #[arg(long, default_value_t = 8)]
    pub num_successors: usize,
    #[arg(long, default_value_t = 2)]
    pub replicas: usize,
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: CliLogLevel,
}

#[derive(Parser)]
pub struct TopologyArgs {
    /// Address of a running host to query.
    #[arg(long)]
    pub connect: String,
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser)]
pub struct LookupArgs {
    #[arg(long)]
    pub connect: String,
    /// Key to hash and resolve.
    #[arg(long)]
    pub key: String,
    #[arg(long, default_value_t = 1)]
    pub n: usize,
}

#[derive(Clone, Copy, clap::ValueEnum)]
pub enum CliLogLevel {
    Null,
    Info,
    Debug,
}

impl From<CliLogLevel> for LogLevel {
    fn from(level: CliLogLevel) -> Self {
        match level {
            CliLogLevel::Null => LogLevel::Null,
            CliLogLevel::Info => LogLevel::Info,
            CliLogLevel::Debug => LogLevel::Debug,
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Create(args) => run_create(args).await,
        Command::Join(args) => run_join(args).await,
        Command::Topology(args) => run_topology(args).await,
        Command::Lookup(args) => run_lookup(args).await,
    }
}

async fn run_create(args: CreateArgs) -> anyhow::Result<()> {
    init_tracing(args.log_level.into());
    let config = Config::builder(args.hostname.clone())
        .num_vnodes(args.num_vnodes)
        .num_successors(args.num_successors)
        .replicas(args.replicas)
        .log_level(args.log_level.into())
        .build()?;

    let transport = TcpTransport::new(args.hostname.clone(), config.client_timeout);
    transport.spawn_listener().await?;

    let ring = Ring::create_ring(config, transport);
    ring.register_hook(Arc::new(ReplicaTracker::new(
        ring.config().replicas,
        ring.hook_bus(),
    )));

    tracing::info!(hostname = %args.hostname, vnodes = args.num_vnodes, "ring created");
    serve_until_interrupted(ring).await
}

async fn run_join(args: JoinArgs) -> anyhow::Result<()> {
    init_tracing(args.log_level.into());
    let config = Config::builder(args.hostname.clone())
        .num_vnodes(args.num_vnodes)
        .num_successors(args.num_successors)
        .replicas(args.replicas)
        .log_level(args.log_level.into())
        .build()?;

    let transport = TcpTransport::new(args.hostname.clone(), config.client_timeout);
    transport.spawn_listener().await?;

    let ring = Ring::join_ring(config, transport, &args.existing).await?;
    ring.register_hook(Arc::new(ReplicaTracker::new(
        ring.config().replicas,
        ring.hook_bus(),
    )));

    tracing::info!(hostname = %args.hostname, existing = %args.existing, "joined ring");
    serve_until_interrupted(ring).await
}

async fn serve_until_interrupted(ring: Arc<Ring>) -> anyhow::Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    ring.shutdown();
    Ok(())
}

#[derive(Serialize)]
struct VnodeReport {
    id: String,
    host: String,
    predecessor: Option<String>,
    successors: Vec<String>,
}

async fn run_topology(args: TopologyArgs) -> anyhow::Result<()> {
    let transport = TcpTransport::new(format!("{}-cli", args.connect), Duration::from_secs(5));
    let vnodes = transport.list_vnodes(&args.connect).await?;

    let mut reports = Vec::with_capacity(vnodes.len());
    for vnode in &vnodes {
        let predecessor = transport.get_predecessor(vnode).await.unwrap_or(None);
        let successors = transport
            .find_successors(vnode, 8, vnode.id, 3 * chord_core::identifier::M_BITS)
            .await
            .unwrap_or_default();
        reports.push(VnodeReport {
            id: vnode.id.to_string(),
            host: vnode.host.clone(),
            predecessor: predecessor.map(|p| p.id.to_string()),
            successors: successors.iter().map(|s| s.id.to_string()).collect(),
        });
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        println!("topology of {} ({} vnodes):", args.connect, reports.len());
        for r in &reports {
            println!("  vnode {} @ {}", r.id, r.host);
            println!(
                "    predecessor: {}",
                r.predecessor.as_deref().unwrap_or("<none>")
            );
            println!("    successors:  {}", r.successors.join(", "));
        }
    }
    Ok(())
}

async fn run_lookup(args: LookupArgs) -> anyhow::Result<()> {
    let transport = TcpTransport::new(format!("{}-cli", args.connect), Duration::from_secs(5));
    let vnodes = transport.list_vnodes(&args.connect).await?;
    let start = vnodes
        .first()
        .ok_or_else(|| anyhow::anyhow!("{} reports no vnodes", args.connect))?;

    let key: Identifier = hash(args.key.as_bytes());
    let result = transport
        .find_successors(start, args.n, key, 3 * chord_core::identifier::M_BITS)
        .await?;

    println!("key {:?} ({}) resolves to:", args.key, key);
    for v in &result {
        println!("  {} @ {}", v.id, v.host);
    }
    Ok(())
}
