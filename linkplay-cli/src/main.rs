mod cli;
mod commands;

use anyhow::Context;
use clap::Parser;
use linkplay_fleet::logging;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init_logging(cli.global.log_mode.into()).context("failed to initialize logging")?;

    commands::run(cli).await
}
