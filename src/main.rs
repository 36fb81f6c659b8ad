use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use trak_o_mat::config::Config;
use trak_o_mat::tnc::{Session, SessionSettings};
use trak_o_mat::web::{self, auth::AppState};

#[derive(Parser)]
#[command(name = "trak-o-mat")]
#[command(about = "APRS balloon tracking through a KISS TNC")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration file
    Check { config: String },
    /// Connect to the TNC and track until interrupted
    Run { config: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { config } => check(&config),
        Commands::Run { config } => run(&config).await,
    }
}

fn load(path: &str) -> Option<(Config, SessionSettings)> {
    let config = match Config::from_file(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error reading config: {}", e);
            return None;
        }
    };
    match config.session_settings() {
        Ok(settings) => Some((config, settings)),
        Err(e) => {
            eprintln!("Invalid config: {}", e);
            None
        }
    }
}

fn check(path: &str) -> ExitCode {
    let Some((config, settings)) = load(path) else {
        return ExitCode::FAILURE;
    };

    println!(
        "Config is valid: {} via TNC {}",
        settings.station.address, settings.address
    );
    println!("  messages go to {}", settings.recipient);
    println!("  concerned stations ({}):", settings.concerned.len());
    for station in settings.concerned.sorted() {
        println!("    {}", station);
    }
    match &config.web {
        Some(web) => println!("  web API on {} ({} keys)", web.bind, config.api_keys.len()),
        None => println!("  web API disabled"),
    }
    ExitCode::SUCCESS
}

async fn run(path: &str) -> ExitCode {
    let Some((config, settings)) = load(path) else {
        return ExitCode::FAILURE;
    };

    let session = Session::spawn(settings);
    let stop = CancellationToken::new();

    let server = config.web.clone().map(|web_config| {
        let state = AppState {
            config: Arc::new(config.clone()),
            tnc: session.handle(),
        };
        let stop = stop.clone();
        tokio::spawn(async move {
            if let Err(e) =
                web::run_server(&web_config.bind, state, stop.cancelled_owned()).await
            {
                log::error!("Web server failed: {}", e);
            }
        })
    });

    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Could not listen for Ctrl-C: {}", e);
    }
    log::info!("Interrupted, shutting down");

    stop.cancel();
    if let Some(server) = server {
        let _ = server.await;
    }
    session.shutdown().await;
    ExitCode::SUCCESS
}
