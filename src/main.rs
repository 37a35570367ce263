use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tenki::{AppState, ForecastSource, JmaClient, RegionCode, TenkiConfig, telemetry, web};

#[derive(Parser, Debug)]
#[command(
    name = "tenki",
    version,
    about = "Server-rendered viewer for JMA overview weather forecasts"
)]
struct Cli {
    /// Configuration file (defaults to the user config dir, then ./config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the web server (default)
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Fetch one forecast and print it
    Fetch {
        code: RegionCode,
        /// Print the raw report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the configured regions
    Regions,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = TenkiConfig::load_from_path(cli.config.clone())?;
    let command = cli.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
    });

    if let Command::Regions = command {
        for link in config.catalog().links() {
            println!("{}\t{}\t{}", link.code, link.name, link.href);
        }
        return Ok(());
    }

    let _telemetry = telemetry::init(&config.logging, cli.verbose)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .with_context(|| "Failed to start tokio runtime")?;

    match command {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            config.validate()?;
            runtime.block_on(serve(config))
        }
        Command::Fetch { code, json } => runtime.block_on(fetch(&config, code, json)),
        Command::Regions => Ok(()),
    }
}

async fn serve(config: TenkiConfig) -> Result<()> {
    let state = AppState::from_config(&config)?;
    tracing::info!(
        "Serving {} regions, forecasts from {}",
        state.regions.len(),
        config.forecast.base_url
    );

    if config.forecast.prefetch {
        state.store.prefetch(state.regions.codes());
    }

    web::run(&config.server, state).await
}

async fn fetch(config: &TenkiConfig, code: RegionCode, json: bool) -> Result<()> {
    let client = JmaClient::new(&config.forecast)?;
    let report = client
        .fetch(code)
        .await
        .with_context(|| format!("Failed to fetch forecast for region {code}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let timezone = config.forecast.timezone()?;
    println!("{}", report.target_area);
    println!("{}", report.format_report_datetime(timezone));
    println!("{}", report.headline_text);
    println!();
    println!("{}", report.text);
    Ok(())
}
