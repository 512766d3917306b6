use std::{path::PathBuf, sync::Arc};

use {
    clap::{Parser, Subcommand},
    courier_agent::{Agent, Downloader},
    courier_client::{ClientSettings, ConnectionManager, CsdsClient},
    courier_config::CourierConfig,
    tokio::sync::mpsc,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(
    name = "courier",
    about = "Courier: accepts routed conversations and saves attached files"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (default: ./courier.toml, then ~/.config/courier/courier.toml).
    #[arg(long, global = true, env = "COURIER_CONFIG")]
    config: Option<PathBuf>,

    /// Directory attachments are written to (overrides config value).
    #[arg(long, global = true, env = "COURIER_DOWNLOAD_DIR")]
    download_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and handle conversations (default when no subcommand is provided).
    Run,
    /// Load and validate the configuration, then exit.
    Check,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<CourierConfig> {
    let mut config = courier_config::discover_and_load(cli.config.as_deref())?;
    if let Some(ref dir) = cli.download_dir {
        config.agent.download_dir = dir.clone();
    }
    courier_config::validate(&config)?;
    Ok(config)
}

async fn run(config: CourierConfig) -> anyhow::Result<()> {
    let http = reqwest::Client::new();
    let account_id = config.credentials.account_id.clone();

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let connection = Arc::new(ConnectionManager::spawn(
        ClientSettings::from_config(&config),
        http.clone(),
        event_tx,
    ));
    let directory = Arc::new(CsdsClient::new(
        http.clone(),
        &config.agent.csds_url,
        &account_id,
    ));
    let downloader = Downloader::new(
        http,
        &config.agent.download_dir,
        &account_id,
        config.agent.download_timeout(),
    );
    info!(
        account_id,
        download_dir = %config.agent.download_dir.display(),
        "starting agent"
    );

    let agent = Agent::new(&config, connection, directory, downloader);
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    agent.run(event_rx, shutdown).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "courier starting");

    let config = load_config(&cli)?;

    match cli.command {
        None | Some(Commands::Run) => run(config).await,
        Some(Commands::Check) => {
            println!("configuration OK for account {}", config.credentials.account_id);
            println!("{config:#?}");
            Ok(())
        },
    }
}
