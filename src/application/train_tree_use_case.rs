// ============================================================
// Layer 2 — TrainTreeUseCase
// ============================================================
// One gradient-boosted tree training job:
//
//   Step 1: Prepare the model directory      (Layer 6 - infra)
//   Step 2: Load both channels, flattened     (Layer 4 - data)
//   Step 3: Save the resolved config          (Layer 6 - infra)
//   Step 4: Boost, printing the evaluation
//           line of every round               (Layer 5 - ml)
//   Step 5: Score the validation split
//   Step 6: Save model.json (+ adapters)      (Layer 6 - infra)
//   Step 7: Report validation accuracy once   (Layer 6 - infra)

use std::io::Write;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::application::job::JobPaths;
use crate::data::loader::load_splits;
use crate::domain::error::ConfigError;
use crate::domain::hyperparams::HyperparameterSet;
use crate::domain::split::accuracy;
use crate::infra::{
    artifact_format::ExportFormat,
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricReporter, MetricsLogger},
};
use crate::ml::gbt::{self, Booster, BoosterParams};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeTrainConfig {
    pub max_depth:      usize,
    pub eta:            f64,
    pub num_round:      usize,
    pub export_formats: Vec<ExportFormat>,
}

impl TreeTrainConfig {
    pub fn from_hyperparameters(
        values:         &HyperparameterSet,
        export_formats: Vec<ExportFormat>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            max_depth: values.require_usize("max_depth")?,
            eta:       values.require_float("eta")?,
            num_round: values.require_usize("num_round")?,
            export_formats,
        })
    }

    pub fn booster_params(&self) -> BoosterParams {
        BoosterParams::new(self.max_depth, self.eta, self.num_round)
    }
}

/// What a finished tree run produced.
#[derive(Debug, Clone)]
pub struct TreeOutcome {
    pub booster:             Booster,
    pub validation_accuracy: f64,
}

pub struct TrainTreeUseCase {
    paths:  JobPaths,
    config: TreeTrainConfig,
}

impl TrainTreeUseCase {
    pub fn new(paths: JobPaths, config: TreeTrainConfig) -> Self {
        Self { paths, config }
    }

    pub fn execute<W: Write>(&self, reporter: &mut MetricReporter<W>) -> Result<TreeOutcome> {
        let cfg = &self.config;

        // ── Step 1: Model directory ───────────────────────────────────────────
        let ckpt = CheckpointManager::new(&self.paths.model_dir)
            .with_context(|| format!("model directory '{}' is not writable", self.paths.model_dir.display()))?;
        ckpt.clear_stale()?;

        // ── Step 2: Load channels ─────────────────────────────────────────────
        // Split keeps features flat, one row of feature_len() values per sample
        let (train, validation) = load_splits(&self.paths.train, &self.paths.validation)
            .context("cannot load the training data channels")?;

        // ── Step 3: Save the config ───────────────────────────────────────────
        ckpt.save_config(cfg)?;

        let metrics = self
            .paths
            .output_data_dir
            .as_deref()
            .map(MetricsLogger::new)
            .transpose()
            .context("cannot create the metrics CSV")?;

        // ── Step 4: Boost ─────────────────────────────────────────────────────
        tracing::info!(
            "Training trees: {} rounds, max_depth {}, eta {} on {} x {} features",
            cfg.num_round,
            cfg.max_depth,
            cfg.eta,
            train.len(),
            train.feature_len()
        );
        let booster = gbt::train(&cfg.booster_params(), &train, &validation, |eval| {
            println!("{}", eval.log_line());
            if let Some(logger) = &metrics {
                logger.log(&EpochMetrics::new(
                    eval.round + 1,
                    eval.train_mlogloss,
                    eval.validation_mlogloss,
                    eval.validation_accuracy,
                ))?;
            }
            Ok(())
        })?;

        // ── Step 5: Score ─────────────────────────────────────────────────────
        let predictions         = booster.predict(&validation)?;
        let validation_accuracy = accuracy(&predictions, validation.labels());

        // ── Step 6: Save ──────────────────────────────────────────────────────
        let written = ckpt.save_tree(&booster, &cfg.export_formats)?;
        for path in &written {
            tracing::info!("Wrote '{}'", path.display());
        }

        // ── Step 7: Report ────────────────────────────────────────────────────
        reporter.report(validation_accuracy)?;

        Ok(TreeOutcome { booster, validation_accuracy })
    }
}
