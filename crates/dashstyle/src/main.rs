use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use dashstyle::api;
use dashstyle::api::AppState;
use dashstyle::config::Diagnostic;
use dashstyle::config::LoggingConfig;
use dashstyle::format_diagnostics;
use dashstyle::host::HomeAssistantClient;
use dashstyle::identity::TokenIdentityResolver;
use dashstyle::store::ConfigStore;
use dashstyle::store::DiscardStore;
use dashstyle::store::FileStore;
use dashstyle::Config;

#[derive(Debug, Parser)]
#[command(version, about = "Dashboard backend for Home Assistant")]
struct Args {
    /// Configuration file; may be given more than once
    #[arg(short, long = "config", value_name = "FILE", default_value = "dashstyle.toml")]
    config: Vec<PathBuf>,

    /// Load and validate the configuration, then exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let (config, warnings) = Config::from_files(&args.config)?;
    print_warnings(&warnings);

    if args.check {
        println!(
            "Configuration OK ({} floor(s), {} user(s))",
            config.topology.floors().len(),
            config.users.len()
        );
        return Ok(());
    }

    init_logging(&config.logging);

    tracing::info!("dashstyle starting");
    tracing::info!(
        "Loaded config from: {}",
        args.config
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    tracing::info!("Home Assistant at {}", config.home_assistant.url);

    let host = Arc::new(
        HomeAssistantClient::new(&config.home_assistant)
            .context("Failed to create Home Assistant client")?,
    );

    let store: Arc<dyn ConfigStore> = match &config.storage.path {
        Some(path) => {
            tracing::info!("Persisting dashboard configuration to {}", path.display());
            Arc::new(FileStore::new(path))
        }
        None => Arc::new(DiscardStore),
    };

    if config.users.is_empty() {
        tracing::warn!("No users configured, configuration updates will be rejected");
    }

    let state = Arc::new(AppState {
        topology: Arc::new(config.topology),
        states: host.clone(),
        services: host,
        identities: Arc::new(TokenIdentityResolver::from_users(&config.users)),
        store,
    });

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let mut server = tokio::spawn({
        let listen = config.server.listen.clone();
        let port = config.server.port;
        async move { api::serve(&listen, port, state, shutdown_rx).await }
    });

    tracing::info!("Press Ctrl+C to exit");
    tokio::select! {
        // Server exited on its own, e.g. the address could not be bound
        result = &mut server => {
            return result.context("HTTP API server task panicked")?;
        }
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => {
                tracing::info!("Received shutdown signal");
            }
            Err(e) => {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
        },
    }

    shutdown_tx.send(()).ok();
    server.await.context("HTTP API server task panicked")??;

    tracing::info!("dashstyle shutdown complete");

    Ok(())
}

fn print_warnings(warnings: &[Diagnostic]) {
    if !warnings.is_empty() {
        eprint!("{}", format_diagnostics(warnings));
    }
}

fn init_logging(logging: &LoggingConfig) {
    let filter = logging
        .overrides
        .iter()
        .fold(
            Targets::new().with_default(LevelFilter::from(logging.level)),
            |targets, (target, level)| targets.with_target(target.clone(), LevelFilter::from(*level)),
        );

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();
}
