use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use depdetect_cli::{Cli, Commands};

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Train(cmd) => cmd.run(),
        Commands::Predict(cmd) => cmd.run(),
    }
}
