use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod summarize;

/// Write a JSONL manifest describing every array file in a data directory.
#[derive(Parser, Debug)]
#[command(name = "depdetect-summarize", version)]
struct Args {
    #[arg(long, short = 'd', env = "DEPDETECT_DATA_DIR", default_value = "data/processed")]
    data_dir: PathBuf,

    #[arg(long, short = 'o', default_value = "manifests/arrays.jsonl")]
    out: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();
    summarize::summarize(&args.data_dir, &args.out)?;
    Ok(())
}
