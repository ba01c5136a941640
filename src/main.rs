use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use glassworks::{AppConfig, Demo};

/// Glass subjects refracting a live scene, rendered in several passes per frame.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// TOML file with window and demo settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Demo to run, overriding the config file.
    #[arg(long, value_enum)]
    demo: Option<Demo>,

    /// Window size as WIDTHxHEIGHT, overriding the config file.
    #[arg(long, value_parser = glassworks::config::parse_size)]
    size: Option<(u32, u32)>,

    /// Print the pass trace of one frame and exit without opening a window.
    #[arg(long)]
    dump_plan: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AppConfig::default(),
    };
    if let Some(demo) = cli.demo {
        config = config.demo(demo);
    }
    if let Some((width, height)) = cli.size {
        config = config.size(width, height);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .init();

    if cli.dump_plan {
        print!("{}", glassworks::dump_plan(&config)?);
        return Ok(());
    }

    glassworks::run(config).context("glassworks stopped with an error")
}
