//! CLI entry point for chord-cli.

use clap::Parser;

use chord_cli::commands::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    commands::run(cli).await
}
