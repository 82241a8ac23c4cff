//! Trip-duration pipeline CLI.
//!
//! Trains and registers models, promotes registered versions, and runs batch
//! or single-trip prediction. Summaries go to stdout as JSON, logs to stderr.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use trip_duration::{
    artifact::ArtifactBundle,
    config::PipelineConfig,
    pipeline::{self, TripFeatures},
    registry::{FsRegistry, RunRegistry, Stage},
};

#[derive(Parser)]
#[command(name = "trip-duration", about = "Taxi trip-duration training and prediction")]
struct Cli {
    /// Path to a pipeline TOML config (defaults apply when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Where to take the bundle from.
#[derive(Args)]
struct BundleSource {
    /// Bundle file written by `train`
    #[arg(long, conflicts_with = "stage")]
    bundle: Option<PathBuf>,

    /// Registry stage to resolve the bundle from (e.g. production)
    #[arg(long)]
    stage: Option<Stage>,
}

#[derive(Subcommand)]
enum Commands {
    /// Train on one file, evaluate on another, and save the bundle
    Train {
        /// Training data (Parquet, or CSV by extension)
        #[arg(long)]
        train: PathBuf,

        /// Held-out evaluation data
        #[arg(long)]
        eval: PathBuf,

        /// Skip writing the bundle
        #[arg(long, conflicts_with = "register")]
        no_save: bool,

        /// Log the run to the registry
        #[arg(long)]
        register: bool,
    },

    /// Predict every row of a file
    Predict {
        /// Input data (Parquet, or CSV by extension)
        #[arg(long)]
        input: PathBuf,

        #[command(flatten)]
        source: BundleSource,
    },

    /// Predict a single trip
    PredictOne {
        #[arg(long, default_value_t = 264)]
        pu_location_id: i64,

        #[arg(long, default_value_t = 264)]
        do_location_id: i64,

        #[arg(long, default_value_t = 1)]
        passenger_count: i64,

        #[command(flatten)]
        source: BundleSource,
    },

    /// Move a registered version to another stage
    Promote {
        #[arg(long)]
        version: u32,

        #[arg(long)]
        stage: Stage,

        /// Archive versions currently holding the stage
        #[arg(long)]
        archive_existing: bool,
    },

    /// List registered versions
    Versions,
}

fn load_bundle(
    source: &BundleSource,
    config: &PipelineConfig,
) -> Result<ArtifactBundle, Box<dyn std::error::Error>> {
    let bundle = match (&source.bundle, source.stage) {
        (Some(path), _) => ArtifactBundle::load_from_file(path)?,
        (None, Some(stage)) => {
            let registry = FsRegistry::open(&config.registry.dir)?;
            registry.load_bundle(&registry.resolve(stage)?)?
        }
        (None, None) => ArtifactBundle::load_from_file(config.bundle_path())?,
    };
    Ok(bundle)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(tracing::Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Train {
            train,
            eval,
            no_save,
            register,
        } => {
            let (outcome, version) = if register {
                let mut registry = FsRegistry::open(&config.registry.dir)?;
                let (outcome, version) =
                    pipeline::train_and_register(&train, &eval, &config, &mut registry)?;
                (outcome, Some(version.version))
            } else {
                (pipeline::train_workflow(&train, &eval, &config, !no_save)?, None)
            };
            let summary = json!({
                "train_rmse": outcome.train_rmse,
                "eval_rmse": outcome.eval_rmse,
                "features": outcome.bundle.model().n_features(),
                "bundle_path": outcome.bundle_path,
                "registered_version": version,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Commands::Predict { input, source } => {
            let bundle = load_bundle(&source, &config)?;
            let predictions = pipeline::batch_predict(&bundle, &input)?;
            println!("{}", serde_json::to_string(&predictions.to_vec())?);
        }

        Commands::PredictOne {
            pu_location_id,
            do_location_id,
            passenger_count,
            source,
        } => {
            let bundle = load_bundle(&source, &config)?;
            let out = pipeline::predict_single(
                &bundle,
                TripFeatures {
                    pu_location_id,
                    do_location_id,
                    passenger_count,
                },
            )?;
            println!("{}", serde_json::to_string(&out)?);
        }

        Commands::Promote {
            version,
            stage,
            archive_existing,
        } => {
            let mut registry = FsRegistry::open(&config.registry.dir)?;
            let updated = registry.transition(version, stage, archive_existing)?;
            println!("{}", serde_json::to_string_pretty(&updated)?);
        }

        Commands::Versions => {
            let registry = FsRegistry::open(&config.registry.dir)?;
            println!("{}", serde_json::to_string_pretty(&registry.list()?)?);
        }
    }

    Ok(())
}
