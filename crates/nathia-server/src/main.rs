//! NAT-IA Server
//!
//! Chat, triage, moderation, SOS and report endpoints for the NAT-IA
//! maternity-support app.

use anyhow::Result;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusHandle;
use nathia_server::{create_router, AppState, ConfigOverrides, ServerConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "nathia-server")]
#[command(about = "NAT-IA safety core HTTP server", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "NATHIA_CONFIG", default_value = "nathia.yaml")]
    config: PathBuf,

    /// Listen address
    #[arg(short = 'l', long, env = "NATHIA_LISTEN", default_value = "0.0.0.0")]
    listen: String,

    /// Listen port
    #[arg(short = 'P', long, env = "NATHIA_PORT", default_value = "8080")]
    port: u16,

    /// Generative provider endpoint
    #[arg(long, env = "NATHIA_GENERATOR_ENDPOINT")]
    generator_endpoint: Option<String>,

    /// Generative provider API key
    #[arg(long, env = "NATHIA_GENERATOR_API_KEY", hide_env_values = true)]
    generator_api_key: Option<String>,

    /// Q&A provider endpoint
    #[arg(long, env = "NATHIA_QA_ENDPOINT")]
    qa_endpoint: Option<String>,

    /// Q&A provider API key
    #[arg(long, env = "NATHIA_QA_API_KEY", hide_env_values = true)]
    qa_api_key: Option<String>,

    /// Mirror the audit trail to this JSON-lines file
    #[arg(long, env = "NATHIA_AUDIT_PATH")]
    audit_path: Option<PathBuf>,

    /// Allow plain-HTTP and loopback provider endpoints
    #[arg(long)]
    development: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            generator_endpoint: self.generator_endpoint.clone(),
            generator_api_key: self.generator_api_key.clone(),
            qa_endpoint: self.qa_endpoint.clone(),
            qa_api_key: self.qa_api_key.clone(),
            audit_path: self.audit_path.clone(),
            development: self.development,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);
    info!("Starting NAT-IA server");

    let config = ServerConfig::load(&cli.config, &cli.overrides())?;
    info!(
        config = %cli.config.display(),
        generator = %config.generator.endpoint,
        qa = config.qa.is_some(),
        development = config.development,
        "Configuration loaded"
    );
    if config.development {
        warn!("Development mode: local provider endpoints are accepted");
    }

    let metrics_handle = init_metrics()?;

    let config_path = cli.config.exists().then(|| cli.config.clone());
    let state = AppState::new(config, config_path, metrics_handle)?;
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", cli.listen, cli.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    warn!("Shutdown signal received, draining connections");
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("nathia=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nathia=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Install the Prometheus recorder and describe the safety metrics
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics recorder: {}", e))?;

    metrics::describe_counter!("nathia_turns_total", "Chat turns handled");
    metrics::describe_counter!(
        "nathia_risk_assessments_total",
        "Risk assessments by level"
    );
    metrics::describe_counter!(
        "nathia_moderation_decisions_total",
        "Moderation decisions by outcome"
    );
    metrics::describe_counter!("nathia_sos_total", "SOS protocol activations");
    metrics::describe_counter!(
        "nathia_fallback_replies_total",
        "Turns answered with the fallback reply"
    );
    metrics::describe_counter!("nathia_retry_attempts_total", "Retries of outbound calls");
    metrics::describe_counter!(
        "nathia_circuit_transitions_total",
        "Circuit breaker state changes by dependency"
    );
    metrics::describe_counter!(
        "nathia_circuit_rejections_total",
        "Calls refused by an open circuit"
    );

    info!("Metrics exporter initialized");
    Ok(handle)
}
