use crate::cli::SplitArgs;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use atoml::core::io::split_csv::{write_split, write_split_to_path};
use atoml::engine::config::SplitConfig;
use atoml::engine::progress::ProgressReporter;
use atoml::workflows::prepare::load_and_split;
use tracing::info;

pub fn run(args: SplitArgs) -> Result<()> {
    let config = SplitConfig {
        key: args.key,
        test_size: args.test_size,
        train_size: args.train_size,
        seed: args.seed,
        use_extinct: args.use_extinct,
    };

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());
    let prepared = load_and_split(&args.database, &config, None, &reporter)?;
    let records = prepared.split.records();
    info!(rows = records.len(), "Writing split assignment.");

    match &args.output {
        Some(path) => {
            write_split_to_path(path, records).map_err(|e| CliError::Output {
                target: path.display().to_string(),
                source: e.into(),
            })?;
            eprintln!(
                "Wrote {} test and {} train assignments to {}",
                prepared.split.test.len(),
                prepared.split.train.len(),
                path.display()
            );
        }
        None => {
            write_split(std::io::stdout().lock(), records).map_err(|e| CliError::Output {
                target: "standard output".to_string(),
                source: e.into(),
            })?;
        }
    }

    Ok(())
}
