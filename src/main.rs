//! Activity Tuner CLI
//!
//! Window-size and feature-subset search for accelerometer activity recognition.

use activity_tuner::{
    classify::ClassifierKind,
    config::Config,
    core::FeatureSet,
    optimize::SfsResult,
    pipeline::{CustomExperiment, Pipeline},
    progress::{Fanout, RunStats, TracingSink},
    report::best_performer,
    VERSION,
};
use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "activity-tuner")]
#[command(version = VERSION)]
#[command(
    about = "Tune window sizes and feature subsets for activity recognition",
    long_about = None
)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Experiment directory holding raw_data/ (overrides the config file)
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Seed for fold assignment and model randomness
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Cross-validation folds
    #[arg(long, global = true)]
    folds: Option<usize>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Format raw sensor exports into formatted_data/
    Format,

    /// Extract one feature set at one window size
    Extract {
        /// Window length in milliseconds
        #[arg(long, default_value = "1000")]
        window: u32,

        /// Feature set (basic or expanded)
        #[arg(long, default_value = "basic")]
        features: FeatureSet,
    },

    /// Evaluate every classifier on basic features with a 1s window
    Baseline,

    /// Find the best window size per classifier
    Optimize,

    /// Run forward feature selection per classifier
    Select,

    /// Run baseline, window optimization and feature selection end to end
    Experiment,

    /// Evaluate a single configuration
    Custom {
        /// Feature set (basic or expanded)
        #[arg(long, default_value = "expanded")]
        features: FeatureSet,

        /// Window length in milliseconds
        #[arg(long, default_value = "1000")]
        window: u32,

        /// Classifier (tree, forest or margin)
        #[arg(long, default_value = "forest")]
        classifier: ClassifierKind,

        /// Run forward feature selection on the extracted features
        #[arg(long)]
        sfs: bool,
    },

    /// Compare feature selection results across classifiers
    Compare,

    /// Convert a feature CSV to ARFF
    Arff {
        /// Feature CSV with the label in the last column
        input: PathBuf,

        /// Output path (defaults to the input with an .arff extension)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Show configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        save: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Config { save } => return cmd_config(cli.config.as_deref(), &config, save),
        Commands::Arff {
            ref input,
            ref output,
        } => return cmd_arff(&config, input, output.as_deref()),
        _ => {}
    }

    config.ensure_directories()?;
    let log_path = init_logging(&config, cli.verbose)?;
    info!(
        version = VERSION,
        log = ?log_path,
        base_dir = ?config.base_dir,
        "activity-tuner starting"
    );

    let stats = Arc::new(RunStats::with_persistence(
        config.logs_dir().join("run_stats.json"),
    ));
    let pipeline = Pipeline::new(config)
        .with_sink(Fanout::new().with(TracingSink).with(Arc::clone(&stats)));

    let result = match cli.command {
        Commands::Format => cmd_format(&pipeline),
        Commands::Extract { window, features } => cmd_extract(&pipeline, window, features),
        Commands::Baseline => cmd_baseline(&pipeline),
        Commands::Optimize => cmd_optimize(&pipeline),
        Commands::Select => cmd_select(&pipeline),
        Commands::Experiment => cmd_experiment(&pipeline),
        Commands::Custom {
            features,
            window,
            classifier,
            sfs,
        } => cmd_custom(
            &pipeline,
            CustomExperiment {
                feature_set: features,
                window_ms: window,
                classifier,
                sfs,
            },
        ),
        Commands::Compare => cmd_compare(&pipeline),
        Commands::Config { .. } | Commands::Arff { .. } => Ok(()),
    };

    if let Err(e) = stats.save() {
        eprintln!("Warning: failed to save run statistics: {e}");
    }
    println!();
    println!("{}", stats.summary());
    println!("Log file: {log_path:?}");

    result
}

/// Load the config file and apply command-line overrides.
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    if let Some(base_dir) = &cli.base_dir {
        config.base_dir = base_dir.clone();
    }
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if let Some(folds) = cli.folds {
        config.cv_folds = folds;
    }
    config.validate()?;
    Ok(config)
}

/// Log to stdout and to a fresh file under `results/logs/`.
fn init_logging(config: &Config, verbose: bool) -> anyhow::Result<PathBuf> {
    let path = config.logs_dir().join(format!(
        "run_{}.log",
        Utc::now().format("%Y%m%d_%H%M%S")
    ));
    let file = File::create(&path).with_context(|| format!("creating log file {path:?}"))?;

    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()?;

    Ok(path)
}

fn cmd_format(pipeline: &Pipeline) -> anyhow::Result<()> {
    let count = pipeline.format()?;
    println!(
        "Formatted {count} file(s) into {:?}",
        pipeline.config().formatted_data_dir()
    );
    Ok(())
}

fn cmd_extract(pipeline: &Pipeline, window_ms: u32, features: FeatureSet) -> anyhow::Result<()> {
    let (path, rows) = pipeline.extract(window_ms, features)?;
    println!(
        "Extracted {rows} rows of {} {features} features ({window_ms} ms windows)",
        features.len()
    );
    println!("Saved to {path:?}");
    Ok(())
}

fn cmd_baseline(pipeline: &Pipeline) -> anyhow::Result<()> {
    let entries = pipeline.baseline()?;

    println!("Baseline Results");
    println!("================");
    for entry in &entries {
        println!(
            "  {:<15} {:.4} ({:.2}%)",
            entry.classifier.display_name(),
            entry.accuracy,
            entry.accuracy * 100.0
        );
    }
    Ok(())
}

fn cmd_optimize(pipeline: &Pipeline) -> anyhow::Result<()> {
    let result = pipeline.optimize_windows()?;

    println!("Optimal Window Sizes");
    println!("====================");
    for (kind, choice) in result.iter() {
        println!(
            "  {:<15} {:>5} ms  accuracy {:.4}",
            kind.display_name(),
            choice.window_ms,
            choice.accuracy
        );
    }
    println!();
    println!("Stored in {:?}", pipeline.window_config_path());
    Ok(())
}

fn print_selections(selections: &[SfsResult]) {
    println!(
        "  {:<15} {:>8} {:>10}  Features",
        "Classifier", "Count", "Accuracy"
    );
    for result in selections {
        println!(
            "  {:<15} {:>8} {:>10.4}  {}",
            result.classifier().display_name(),
            result.feature_count(),
            result.accuracy(),
            result.selected_names().join(", ")
        );
    }
}

fn cmd_select(pipeline: &Pipeline) -> anyhow::Result<()> {
    let selections = pipeline.run_selection()?;

    println!("Feature Selection");
    println!("=================");
    print_selections(&selections);
    Ok(())
}

fn cmd_experiment(pipeline: &Pipeline) -> anyhow::Result<()> {
    let summary = pipeline.run_experiment()?;

    println!("Experiment {}", summary.run_id);
    println!("==========");
    print_selections(&summary.selections);
    if let Some(best) = summary.best_performer() {
        println!();
        println!(
            "Best performer: {} (accuracy: {:.4})",
            best.classifier().display_name(),
            best.accuracy()
        );
    }
    println!();
    println!(
        "Report: {:?}",
        pipeline
            .results_dir(activity_tuner::pipeline::FINAL_DIR)
            .join("experiment_report.txt")
    );
    Ok(())
}

fn cmd_custom(pipeline: &Pipeline, experiment: CustomExperiment) -> anyhow::Result<()> {
    let outcome = pipeline.run_custom(experiment)?;

    println!("Custom experiment: {}", outcome.experiment);
    println!("  Rows:     {}", outcome.rows);
    println!("  Accuracy: {:.4}", outcome.accuracy);
    if let Some(selection) = &outcome.selection {
        println!("  Selected: {}", selection.selected_names().join(", "));
    }
    println!("  Output:   {:?}", outcome.output_dir);
    Ok(())
}

fn cmd_compare(pipeline: &Pipeline) -> anyhow::Result<()> {
    let selections = pipeline.run_selection()?;
    let windows = pipeline.stored_windows().unwrap_or_default();

    println!("Classifier Comparison");
    println!("=====================");
    println!(
        "  {:<15} {:>8} {:>10} {:>10}",
        "Classifier", "Window", "Window acc", "SFS acc"
    );
    for result in &selections {
        let kind = result.classifier();
        let window = windows.get(kind);
        println!(
            "  {:<15} {:>6}ms {:>10.4} {:>10.4}",
            kind.display_name(),
            windows.window_for(kind),
            window.map_or(0.0, |w| w.accuracy),
            result.accuracy()
        );
    }

    if let Some(best) = best_performer(&selections) {
        println!();
        println!(
            "Best performer: {} (accuracy: {:.4})",
            best.classifier().display_name(),
            best.accuracy()
        );
    }
    Ok(())
}

fn cmd_arff(config: &Config, input: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let path = Pipeline::new(config.clone()).export_arff(input, output)?;
    println!("Wrote {path:?}");
    Ok(())
}

fn cmd_config(path: Option<&Path>, config: &Config, save: bool) -> anyhow::Result<()> {
    let path = path.map_or_else(Config::config_path, Path::to_path_buf);

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {path:?}");
    println!();
    println!("{}", serde_json::to_string_pretty(config)?);

    if save {
        config.save_to(&path)?;
        println!();
        println!("Saved to {path:?}");
    }
    Ok(())
}
