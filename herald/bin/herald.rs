#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

use std::process::ExitCode;

use clap::Parser;
use herald::{
    cli::Cli,
    commands::{self, config_origin},
    config::Herald,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.verbose || std::env::var_os("LOG_LEVEL").is_some() {
        herald_common::logging::init();
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let (config, origin) = match &cli.config {
        Some(path) => (Herald::from_file(path)?, Some(path.clone())),
        None => Herald::load()?,
    };

    if cli.verbose {
        eprintln!("Configuration: {}", config_origin(origin.as_deref()));
    }

    commands::execute(cli, config).await
}
