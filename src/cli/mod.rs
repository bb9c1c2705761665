// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user and orchestrator interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Every command maps to one use case:
//   stage       → StageUseCase
//   train-cnn   → TrainCnnUseCase
//   train-tree  → TrainTreeUseCase
//   inspect     → InspectUseCase
//   ranges      → HyperparameterSpace, printed as JSON
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use commands::{Commands, InspectArgs, RangesArgs, SourceKind, StageArgs, TrainCnnArgs, TrainTreeArgs, Variant};

use crate::application::{
    inspect_use_case::InspectUseCase,
    job::{resolve_hyperparameters, JobPaths},
    stage_use_case::{StageUseCase, StagingContext},
    train_cnn_use_case::{CnnTrainConfig, TrainCnnUseCase},
    train_tree_use_case::{TrainTreeUseCase, TreeTrainConfig},
};
use crate::data::source::{HttpMirrorSource, IdxDirSource, SyntheticSource};
use crate::domain::error::ConfigError;
use crate::domain::hyperparams::HyperparameterSpace;
use crate::domain::traits::DatasetSource;
use crate::infra::{metrics::MetricReporter, object_store::LocalObjectStore};

#[derive(Parser, Debug)]
#[command(
    name = "mnist-trainer",
    version,
    about = "Stage MNIST-style digit datasets and train CNN or boosted-tree classifiers on them."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Stage(args)     => run_stage(args),
            Commands::TrainCnn(args)  => run_train_cnn(args),
            Commands::TrainTree(args) => run_train_tree(args),
            Commands::Inspect(args)   => run_inspect(args),
            Commands::Ranges(args)    => run_ranges(args),
        }
    }
}

fn run_stage(args: StageArgs) -> Result<()> {
    let source: Box<dyn DatasetSource> = match args.source {
        SourceKind::Download => Box::new(HttpMirrorSource::new(args.mirror, args.cache_dir)),
        SourceKind::IdxDir => {
            let dir = args
                .idx_dir
                .ok_or_else(|| ConfigError::Invalid("--source idx-dir needs --idx-dir".to_string()))?;
            Box::new(IdxDirSource::new(dir))
        }
        SourceKind::Synthetic => {
            if args.samples < 2 {
                return Err(ConfigError::Invalid(format!(
                    "--samples must be at least 2, got {}",
                    args.samples
                ))
                .into());
            }
            if !(args.train_fraction > 0.0 && args.train_fraction < 1.0) {
                return Err(ConfigError::Invalid(format!(
                    "--train-fraction must lie strictly between 0 and 1, got {}",
                    args.train_fraction
                ))
                .into());
            }
            Box::new(SyntheticSource::new(args.samples, args.train_fraction, args.seed))
        }
    };

    let ctx = StagingContext {
        store:    Box::new(LocalObjectStore::from_destination(&args.destination)?),
        prefix:   args.prefix,
        work_dir: args.work_dir,
    };

    let report = StageUseCase::new(source).execute(&ctx)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_train_cnn(args: TrainCnnArgs) -> Result<()> {
    let values = resolve_hyperparameters(
        &HyperparameterSpace::cnn(),
        args.job.hps.as_deref(),
        args.overrides(),
    )
    .context("invalid CNN hyperparameters")?;
    let config = CnnTrainConfig::from_hyperparameters(&values, args.seed, args.checkpoint_policy)?;

    let mut reporter = MetricReporter::stdout();
    let outcome      = TrainCnnUseCase::new(JobPaths::from(&args.job), config).execute(&mut reporter)?;
    tracing::info!(
        "CNN job done: {} parameters, {} epochs trained, epoch {} saved",
        outcome.num_params,
        outcome.history.len(),
        outcome.saved_epoch
    );
    Ok(())
}

fn run_train_tree(args: TrainTreeArgs) -> Result<()> {
    let values = resolve_hyperparameters(
        &HyperparameterSpace::tree(),
        args.job.hps.as_deref(),
        args.overrides(),
    )
    .context("invalid tree hyperparameters")?;
    let config = TreeTrainConfig::from_hyperparameters(&values, args.export_formats.clone())?;

    let mut reporter = MetricReporter::stdout();
    let outcome      = TrainTreeUseCase::new(JobPaths::from(&args.job), config).execute(&mut reporter)?;
    tracing::info!(
        "Tree job done: {} trees over {} rounds, {:.2}% validation accuracy",
        outcome.booster.trees.len(),
        outcome.booster.num_rounds(),
        outcome.validation_accuracy * 100.0
    );
    Ok(())
}

fn run_inspect(args: InspectArgs) -> Result<()> {
    let report = InspectUseCase::new(args.model_dir, args.validation).execute()?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_ranges(args: RangesArgs) -> Result<()> {
    let space = match args.variant {
        Variant::Cnn  => HyperparameterSpace::cnn(),
        Variant::Tree => HyperparameterSpace::tree(),
    };
    println!("{}", serde_json::to_string_pretty(&space)?);
    Ok(())
}
