use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use proxyhook::{resolve, Cli, ClientConfig, ConnectionSupervisor, WebhookForwarder};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Install rustls crypto provider before any TLS operations
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("proxyhook=info")),
        )
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(report) => {
            eprintln!("{:?}", report);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> miette::Result<()> {
    let config = ClientConfig::resolve(&cli)?;

    resolve::validate_targets(&config.targets).await?;

    let forwarder = WebhookForwarder::new(config.targets.into())
        .map_err(proxyhook::ConfigError::from)?;

    let supervisor =
        ConnectionSupervisor::new(Arc::new(config.endpoint), forwarder, config.password_env);

    supervisor.run_until(shutdown_signal()).await?;

    tracing::info!("Client shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
