//! LoanGraph
//!
//! Command-line runner for declarative credit policies.
//!
//! Loads a policy graph, evaluates applicant records against it, and
//! exports the graph for rendering. Logs go to stderr so that decisions
//! and exports on stdout stay machine-readable.

use anyhow::Result;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::{debug, info};

mod cli;
mod commands;
mod config;

use cli::{Cli, Commands};
use config::{CliConfig, LogFormat};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = CliConfig::load(&cli.config, &cli.overrides())?;

    init_tracing(cli.verbose, config.logging.format);
    debug!(config = %cli.config, policy = %config.policy_path, "Configuration loaded");

    match cli.command {
        Commands::Evaluate { applicant, .. } => commands::evaluate(&config, &applicant).await,
        Commands::Batch {
            applicants,
            output,
            metrics,
            ..
        } => {
            let metrics_handle = if metrics { Some(init_metrics()?) } else { None };
            commands::batch(&config, &applicants, output.as_deref()).await?;

            if let Some(handle) = metrics_handle {
                eprintln!("{}", handle.render());
            }
            Ok(())
        }
        Commands::Visualize { output, .. } => commands::visualize(&config, output.as_deref()),
        Commands::Validate { .. } => commands::validate(&config),
    }
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool, format: LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("loangraph=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("loangraph=info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

/// Initialize metrics exporter and return handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    loangraph_core::instrumentation::describe_metrics();

    info!("Metrics recorder installed");
    Ok(handle)
}
