use crate::cli::ScreenArgs;
use crate::config::PartialConfig;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use atoml::engine::progress::ProgressReporter;
use atoml::workflows;
use tracing::info;

pub fn run(args: ScreenArgs) -> Result<()> {
    let partial_config = PartialConfig::from_file(&args.config)?;
    info!("Merging configuration from file and CLI arguments...");
    let final_config = partial_config.merge_for_screening(&args)?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    let report = workflows::screening::run(&final_config, &reporter)?;

    println!(
        "Screened {} features over {} train / {} test candidates ({} in pool).",
        report.feature_names.len(),
        report.train_size,
        report.test_size,
        report.pool_size
    );
    for outcome in &report.outcomes {
        println!(
            "  {:<24} train {:>3}  test {:>3}  {}",
            outcome.method,
            outcome.train_width,
            outcome.test_width,
            outcome.kept_features.join(", ")
        );
    }
    let ratios: Vec<String> = report
        .explained_variance_ratio
        .iter()
        .map(|r| format!("{:.3}", r))
        .collect();
    println!("  explained variance ratio: [{}]", ratios.join(", "));

    Ok(())
}
