//! # sdctl
//!
//! Administration tool for the staff directory.

#![forbid(unsafe_code)]

use clap::Parser;
use sd_cli::{
    cli::{Cli, Command},
    commands::{run_group, run_listing, run_report, run_status, run_user, Session},
    config::CliConfig,
    output::error,
    CliResult,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn run(cli: Cli, config: &CliConfig) -> CliResult<()> {
    let format = cli.output.unwrap_or(config.output_format);
    let session = Session::open(config)?;
    if matches!(cli.command, Command::Status) {
        return run_status(&session.pool).await;
    }

    let mut conn = session.pool.get().await?;
    let service = &session.service;
    match cli.command {
        Command::User(cmd) => run_user(cmd, service, &mut conn, format).await,
        Command::Group(cmd) => run_group(cmd, service, &mut conn, format).await,
        Command::Report(cmd) => run_report(cmd, service, &mut conn, &config.report, format).await,
        Command::Listing { kind } => run_listing(kind, service, &mut conn, format).await,
        Command::Status => Ok(()),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match CliConfig::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error(&format!("Failed to load configuration: {e}"));
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cli, &config).await {
        error(&e.to_string());
        std::process::exit(1);
    }
}
