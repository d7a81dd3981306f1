use crate::error::{CliError, Result};
use std::fs::File;
use std::path::PathBuf;
use tracing_subscriber::{
    EnvFilter,
    filter::LevelFilter,
    fmt::{self},
    prelude::*,
};

fn level_for(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        LevelFilter::OFF
    } else {
        match verbosity {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }
}

/// Builds the event filter. `RUST_LOG` wins over `-v` unless `--quiet` is set.
fn build_filter(verbosity: u8, quiet: bool) -> Result<EnvFilter> {
    let level = level_for(verbosity, quiet);
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !quiet && !directives.trim().is_empty() => EnvFilter::try_new(&directives)
            .map_err(|e| CliError::Config(format!("invalid {}: {}", EnvFilter::DEFAULT_ENV, e))),
        _ => Ok(EnvFilter::default().add_directive(level.into())),
    }
}

pub fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<PathBuf>) -> Result<()> {
    let filter = build_filter(verbosity, quiet)?;

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .compact();

    let subscriber = tracing_subscriber::registry().with(filter).with(stderr_layer);

    if let Some(path) = log_file {
        let file = File::create(&path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_thread_ids(true)
            .with_target(true);

        subscriber.with(file_layer).init();
    } else {
        subscriber.init();
    }

    Ok(())
}
