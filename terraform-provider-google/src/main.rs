//! Terraform Provider for Google Cloud
//!
//! Serves the plugin protocol on stdin/stdout.

use clap::Parser;
use provider_common::{serve, LoggingConfig, Provider};
use terraform_provider_google::GoogleProvider;

/// Terraform Provider for Google Cloud
#[derive(Parser, Debug)]
#[command(name = "terraform-provider-google")]
#[command(about = "Terraform provider for Google Compute Engine snapshots")]
struct Args {
    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut logging = LoggingConfig::from_env();
    if args.debug {
        logging = logging.with_level("debug");
    }
    if args.log_json {
        logging = logging.with_json(true);
    }
    let _guard = logging.init().map_err(|e| anyhow::anyhow!(e))?;

    tracing::info!("Starting Terraform Provider for Google Cloud");

    let provider = Provider::new(GoogleProvider)?;
    serve(&provider);

    Ok(())
}
