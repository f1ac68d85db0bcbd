//! crushd: serves CRUSH rule sets per cluster over HTTP.
//!
//! # Architecture Overview
//!
//! ```text
//!   crush dump files (one per fsid)
//!          │
//!          ▼
//!   ┌──────────────┐   refresh    ┌──────────────────┐
//!   │   cluster    │◀─────────────│ RefreshMonitor   │
//!   │   registry   │              └──────────────────┘
//!   └──────┬───────┘
//!          │ snapshots (RuleSet / Rule)
//!          ▼
//!   ┌──────────────┐    ┌──────────────┐
//!   │ http server  │───▶│  handlers    │──▶ GET /api/v2/cluster/{fsid}/crush_rule_set
//!   │ + middleware │    │  admin       │
//!   └──────────────┘    └──────────────┘
//!
//!   config (TOML) ──watcher──▶ live config swap + registry.apply
//! ```

use std::path::PathBuf;

use clap::Parser;

use crushd::config::{load_config, ServiceConfig};
use crushd::lifecycle::startup;

#[derive(Parser)]
#[command(name = "crushd")]
#[command(about = "REST service exposing CRUSH rule sets per cluster", long_about = None)]
struct Args {
    /// Path to the TOML configuration file; hot-reloaded on change.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };

    startup::run(config, args.config).await?;
    Ok(())
}
