use std::env;

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Vision-driven desktop control agent", long_about = None)]
pub struct Args {
    /// Natural-language task to carry out, e.g. "open Safari and search for rust tutorials"
    pub task: Option<String>,

    /// Measure the pointer offset of this display setup and store it in .env
    #[arg(long)]
    pub calibrate: bool,

    /// Disable spoken narration
    #[arg(short, long)]
    pub quiet: bool,
}

pub fn init_logging() -> Result<()> {
    let log_level = env::var("LOG_LEVEL")
        .map(|level| match level.to_lowercase().as_str() {
            "error" => Level::ERROR,
            "warn" => Level::WARN,
            "debug" => Level::DEBUG,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    Ok(())
}
