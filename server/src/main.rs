//! CLI entry point: run a single stage or serve the REST API.

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use dotenv::dotenv;
use italiclas_data::{Cleaner, FetchOutcome, Fetcher};
use italiclas_learning::{
    DEFAULT_CV_FOLDS, Optimizer, OptimizerConfig, Predictor, Scoring, SearchStrategy, TrainOptions, Trainer,
    TrainerConfig,
};
use italiclas_server::{AppState, ArtifactPipeline, Settings, app};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// CLI-compatible search strategy enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliSearchStrategy {
    /// Cross-validate every candidate on the full dataset
    Exhaustive,
    /// Successive halving: many candidates on few samples, then fewer on more
    Halving,
}

impl From<CliSearchStrategy> for SearchStrategy {
    fn from(cli: CliSearchStrategy) -> Self {
        match cli {
            CliSearchStrategy::Exhaustive => SearchStrategy::Exhaustive,
            CliSearchStrategy::Halving => SearchStrategy::SuccessiveHalving,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Italian text classifier",
    long_about = "Detect whether a text is written in Italian.\n\n\
                  Every stage caches its output and reuses it unless --force is given.\n\
                  Paths default to the settings read from the environment (and .env).\n\n\
                  EXAMPLES:\n  \
                  # Build every artifact, then serve\n  \
                  italiclas fetch && italiclas clean && italiclas train && italiclas serve\n\n  \
                  # Rerun the hyperparameter search with another metric\n  \
                  italiclas optimize --force --scoring roc_auc\n\n  \
                  # One-off prediction\n  \
                  italiclas predict \"ciao mondo\""
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error); defaults to LOG_LEVEL
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Only show warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download the raw dataset
    Fetch {
        /// Download even if the raw file exists
        #[arg(short, long)]
        force: bool,

        /// Archive URL (defaults to RAW_DATA_SOURCE)
        #[arg(long)]
        url: Option<String>,

        /// Destination of the extracted CSV
        #[arg(long)]
        raw: Option<PathBuf>,
    },

    /// Turn the raw CSV into the clean dataset
    Clean {
        #[arg(short, long)]
        force: bool,

        #[arg(long)]
        raw: Option<PathBuf>,

        #[arg(long)]
        clean: Option<PathBuf>,
    },

    /// Search the pipeline hyperparameters
    Optimize {
        #[arg(short, long)]
        force: bool,

        /// Metric to maximize
        #[arg(long, default_value = "f1")]
        scoring: Scoring,

        /// Cross-validation folds
        #[arg(long, default_value_t = DEFAULT_CV_FOLDS)]
        cv_folds: usize,

        #[arg(long, value_enum, default_value = "halving")]
        strategy: CliSearchStrategy,

        #[arg(long)]
        clean: Option<PathBuf>,

        #[arg(long)]
        params: Option<PathBuf>,
    },

    /// Fit the model pipeline
    Train {
        /// Refit even if the pipeline exists
        #[arg(short, long)]
        force: bool,

        /// Rerun the hyperparameter search
        #[arg(long)]
        optimize: bool,

        /// Log cross-validated scores of the final configuration
        #[arg(long)]
        scores: bool,

        #[arg(long)]
        clean: Option<PathBuf>,

        #[arg(long)]
        params: Option<PathBuf>,

        #[arg(long)]
        pipeline: Option<PathBuf>,
    },

    /// Classify a single text
    Predict {
        text: String,

        #[arg(long)]
        pipeline: Option<PathBuf>,
    },

    /// Serve the REST API
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,
    },
}

/// Initialize the tracing subscriber for logging.
fn init_logging(level: &str, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let args = Args::parse();
    let mut settings = Settings::from_env().context("Failed to load settings")?;

    let level = args.log_level.clone().unwrap_or_else(|| settings.log_level.clone());
    init_logging(&level, args.quiet);

    let store = settings.store();
    match args.command {
        Command::Fetch { force, url, raw } => {
            let url = url.unwrap_or_else(|| settings.raw_data_source.clone());
            let raw = raw.unwrap_or_else(|| settings.raw_path());
            let fetcher = Fetcher::with_timeout(settings.raw_data_source_filename.as_str(), settings.fetch_timeout_secs)?;
            match fetcher.fetch(&url, &raw, force)? {
                FetchOutcome::Unavailable { status } => {
                    return Err(anyhow!("Raw data source {} answered HTTP {}", url, status));
                }
                outcome => info!("[ETL] Raw data at '{}'", outcome.path().unwrap_or(raw.as_path()).display()),
            }
        }

        Command::Clean { force, raw, clean } => {
            let raw = raw.unwrap_or_else(|| settings.raw_path());
            let clean = clean.unwrap_or_else(|| settings.clean_path());
            Cleaner::new(store).clean(&raw, &clean, force)?;
        }

        Command::Optimize {
            force,
            scoring,
            cv_folds,
            strategy,
            clean,
            params,
        } => {
            let clean = clean.unwrap_or_else(|| settings.clean_path());
            let params = params.unwrap_or_else(|| settings.params_path());
            let config = OptimizerConfig::builder()
                .scoring(scoring)
                .cv_folds(cv_folds)
                .strategy(strategy.into())
                .build()?;
            Optimizer::new(store, config).optimize(&clean, &params, force)?;
        }

        Command::Train {
            force,
            optimize,
            scores,
            clean,
            params,
            pipeline,
        } => {
            let clean = clean.unwrap_or_else(|| settings.clean_path());
            let params = params.unwrap_or_else(|| settings.params_path());
            let pipeline = pipeline.unwrap_or_else(|| settings.pipeline_path());
            let options = TrainOptions {
                optimize,
                compute_scores: scores,
                force,
            };
            Trainer::new(store, TrainerConfig::builder().build()?).train(&clean, &pipeline, &params, options)?;
        }

        Command::Predict { text, pipeline } => {
            let pipeline = pipeline.unwrap_or_else(|| settings.pipeline_path());
            let is_italian = Predictor::new(store)
                .predict(&text, &pipeline)
                .map_err(|e| {
                    if e.is_artifact_not_found() {
                        anyhow!("{e}. Run `italiclas train` first")
                    } else {
                        anyhow!(e)
                    }
                })?;
            println!("{is_italian}");
        }

        Command::Serve { host, port } => {
            if let Some(host) = host {
                settings.host = host;
            }
            if let Some(port) = port {
                settings.port = port;
            }
            settings.validate()?;
            tokio::runtime::Runtime::new()?.block_on(serve(settings))?;
        }
    }

    Ok(())
}

async fn serve(settings: Settings) -> Result<()> {
    let addr = settings.bind_address();
    let base = settings.api_base_endpoint();
    let retrainer = Arc::new(ArtifactPipeline::from_settings(&settings));
    let state = AppState::new(settings, retrainer);

    // Predictions answer 503 until the first artifacts exist
    let pipeline_path = state.coordinator.pipeline_path().to_path_buf();
    state.coordinator.trigger_retrain(&pipeline_path);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(
        "[API] italiclas v{} listening on http://{}{}",
        env!("CARGO_PKG_VERSION"),
        addr,
        base
    );

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("[API] Shutting down"),
        Err(e) => error!("[API] Failed to listen for shutdown signal: {}", e),
    }
}
