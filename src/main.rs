//! loggerd
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http server ──▶ record extractor
//!                                         │
//!                         ok ◀────────────┴───────────▶ err
//!                         │                             │
//!                   info logger                    error logger
//!                ┌────────┴────────┐            ┌──────┴───────┐
//!          stdout (JSON)    Loki (opt.)   stderr (text)   Loki (opt.)
//!                         │                             │
//!     ◀── 204 No Content ─┘                             └─ 500 ──▶
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use loggerd::config::{load_config, validate_config, ConfigError, LoggerdConfig};
use loggerd::fields;
use loggerd::lifecycle::{self, signals, Shutdown};
use loggerd::observability::{logging, Loggers, Severity};

const LONG_ABOUT: &str = "\
Loggerd is a web server that logs all requests to stdout and optionally to Loki. All requests are \
logged as JSON to stdout, separated by a newline. Any errors or other messages are printed to \
stderr. When logging to Loki, errors are also sent to Loki in addition to stderr.";

#[derive(Parser)]
#[command(name = "loggerd", version)]
#[command(about = "Log every HTTP request as JSON", long_about = LONG_ABOUT)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on, e.g. 8080 or :8080 [default: 8080]
    #[arg(short, long)]
    port: Option<String>,

    /// Loki API base URL such as http://localhost:3100. Enables logging to Loki
    #[arg(short, long)]
    loki_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => LoggerdConfig::default(),
    };
    if let Some(port) = &cli.port {
        config.set_port(port);
    }
    if let Some(url) = cli.loki_url {
        config.remote.loki_url = Some(url);
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init(&config.observability.log_filter);
    tracing::info!(
        bind_address = %config.listener.bind_address,
        remote = config.remote.loki_url.is_some(),
        "loggerd v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let loggers = Arc::new(Loggers::from_config(&config.remote)?);

    let shutdown = Arc::new(Shutdown::new());
    let server_shutdown = shutdown.subscribe();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        signals::wait_for_shutdown().await;
        trigger.trigger();
    });

    let address = config.listener.bind_address.clone();
    if let Err(e) = lifecycle::serve(config, loggers.clone(), server_shutdown).await {
        loggers
            .error
            .log(
                Severity::Error,
                "Failed to listen and serve",
                fields!("address" => address, "error" => e.to_string()),
            )
            .await;
        std::process::exit(2);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
