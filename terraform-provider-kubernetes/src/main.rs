//! Terraform Provider for Kubernetes
//!
//! Serves the plugin protocol on stdin/stdout.

use clap::Parser;
use provider_common::{serve, LoggingConfig, Provider};
use terraform_provider_kubernetes::KubernetesProvider;

/// Terraform Provider for Kubernetes
#[derive(Parser, Debug)]
#[command(name = "terraform-provider-kubernetes")]
#[command(about = "Terraform provider for Kubernetes RBAC resources")]
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

    tracing::info!("Starting Terraform Provider for Kubernetes");

    let provider = Provider::new(KubernetesProvider)?;
    serve(&provider);

    Ok(())
}
