mod cli;
mod logging;

use clap::Parser;
use cli::Cli;
use eyre::{Context, Result};
use mapcopy_core::logger::LogLogger;
use mapcopy_core::{CopyConfig, CopyEngine};

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = CopyConfig {
        small_file_threshold: cli.small_file_threshold,
        max_window: cli.window_size,
        buffer_size: cli.buffer_size,
        ..CopyConfig::default()
    };
    let engine = CopyEngine::new(config).with_logger(LogLogger);

    let outcome = engine
        .copy_file(&cli.source, &cli.destination)
        .wrap_err_with(|| {
            format!(
                "copying {} to {}",
                cli.source.display(),
                cli.destination.display()
            )
        })?;

    if !cli.quiet {
        println!(
            "copied {} -> {} ({} bytes, {})",
            cli.source.display(),
            cli.destination.display(),
            outcome.bytes_copied,
            outcome.strategy
        );
    }
    Ok(())
}
