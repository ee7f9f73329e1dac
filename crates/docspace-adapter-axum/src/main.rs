use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use docspace_adapter_axum::{run_app, AxumDevServerConfig};
use docspace_core::config::ConfigLoader;
use docspace_core::handlers::DocSpaceApp;

const DEFAULT_CONFIG: &str = include_str!("../docspace.toml");

/// Serve the DocSpace edge workload locally.
#[derive(Debug, Parser)]
#[command(name = "docspace", version, about)]
struct Args {
    /// Configuration file; the bundled `docspace.toml` when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address.
    #[arg(long, default_value = "127.0.0.1:8787")]
    addr: SocketAddr,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("docspace failed: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    let loader = match &args.config {
        Some(path) => ConfigLoader::from_path(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => ConfigLoader::load_from_str(DEFAULT_CONFIG).context("bundled docspace.toml")?,
    };

    let server = AxumDevServerConfig {
        addr: args.addr,
        ..AxumDevServerConfig::default()
    };
    run_app::<DocSpaceApp>(loader.config(), server)
}
