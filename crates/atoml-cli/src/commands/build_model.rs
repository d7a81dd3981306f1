use crate::cli::BuildModelArgs;
use crate::config::PartialConfig;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use atoml::engine::model::ModelReport;
use atoml::engine::progress::ProgressReporter;
use atoml::workflows;
use tracing::info;

fn print_model(label: &str, report: &ModelReport) {
    println!(
        "{}: {} features, {} train / {} test candidates",
        label,
        report.feature_names.len(),
        report.train_size,
        report.test_size
    );
    let hp = &report.hyperparameters;
    println!(
        "  lengthscale {:.4}, noise {:.4}, signal variance {:.4}, log marginal likelihood {:.4}",
        hp.lengthscale, hp.noise, hp.signal_variance, report.log_marginal_likelihood
    );
    match (report.rmse, report.mae) {
        (Some(rmse), Some(mae)) => println!("  test RMSE {:.4}, MAE {:.4}", rmse, mae),
        _ => println!("  no test candidates to evaluate"),
    }
}

pub fn run(args: BuildModelArgs) -> Result<()> {
    let partial_config = PartialConfig::from_file(&args.config)?;
    info!("Merging configuration from file and CLI arguments...");
    let final_config = partial_config.merge_for_build_model(&args)?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Building model from {} ...",
        final_config.database_path.display()
    );
    let report = workflows::build_model::run(&final_config, &reporter)?;

    if let Some(pool_size) = report.pool_size {
        println!("Loaded {} relaxed candidates.", pool_size);
    }
    if let Some(built) = &report.built {
        print_model("Model", built);
    }
    if let Some(tested) = &report.tested {
        print_model("Model from descriptor stores", tested);
    }
    for path in &report.removed_stores {
        println!("Removed {}", path.display());
    }

    Ok(())
}
