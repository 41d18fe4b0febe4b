//! Terraform Provider for Strato
//!
//! This provider manages Strato clusters and node pools. Mutations are
//! asynchronous on the Strato side, so resource operations poll for status
//! convergence after each accepted change.

mod client;
mod convergence;
mod datasources;
mod provider;
mod resources;
mod schema;

use clap::Parser;
use provider::StratoProvider;
use std::io::{self, BufRead, Write};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Terraform Provider for Strato
#[derive(Parser, Debug)]
#[command(name = "terraform-provider-strato")]
#[command(about = "Terraform provider for the Strato managed Kubernetes service")]
struct Args {
    /// Enable debug mode
    #[arg(long, env = "TF_LOG")]
    debug: bool,
}

fn main() {
    // Initialize logging; stdout carries the plugin protocol, so all
    // diagnostics go to stderr.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let _args = Args::parse();

    tracing::info!("Starting Terraform Provider for Strato");

    // Terraform plugin protocol uses stdin/stdout for communication,
    // one JSON-RPC message per line.
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut stdout_lock = stdout.lock();

    let provider = StratoProvider::new();

    for line in stdin.lock().lines() {
        match line {
            Ok(input) => {
                let response = provider.handle_request(&input);
                if let Err(e) = writeln!(stdout_lock, "{}", response) {
                    tracing::error!("Failed to write response: {}", e);
                    break;
                }
                if let Err(e) = stdout_lock.flush() {
                    tracing::error!("Failed to flush stdout: {}", e);
                    break;
                }
            }
            Err(e) => {
                tracing::error!("Failed to read input: {}", e);
                break;
            }
        }
    }

    tracing::info!("Terraform Provider shutting down");
}
