//! Senpai CLI entry point.

use clap::Parser;
use color_eyre::eyre::Result;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

use senpai::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = if cli.json {
        fmt::layer().json().boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(EnvFilter::from_default_env().add_directive("senpai=info".parse()?))
        .init();

    // Run the control loop
    cli.execute().await
}
