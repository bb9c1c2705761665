// ============================================================
// Layer 2 — TrainCnnUseCase
// ============================================================
// One CNN training job, start to finish:
//
//   Step 1: Prepare the model directory      (Layer 6 - infra)
//           create it, remove stale artifacts
//   Step 2: Load both channels                (Layer 4 - data)
//   Step 3: Save the resolved config          (Layer 6 - infra)
//   Step 4: Run the training loop             (Layer 5 - ml)
//   Step 5: Report validation accuracy once   (Layer 6 - infra)
//
// Reference: Burn Book §5 (Training)

use std::io::Write;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::application::job::JobPaths;
use crate::data::loader::load_splits;
use crate::domain::error::ConfigError;
use crate::domain::hyperparams::HyperparameterSet;
use crate::infra::{
    checkpoint::{CheckpointManager, CheckpointPolicy},
    metrics::{MetricReporter, MetricsLogger},
};
use crate::ml::trainer::{run_training, CnnOutcome};

// ─── Training Configuration ──────────────────────────────────────────────────
// Written to train_config.json next to model.mpk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CnnTrainConfig {
    pub batch_size:        usize,
    pub epochs:            usize,
    pub lr:                f64,
    pub seed:              u64,
    pub checkpoint_policy: CheckpointPolicy,
}

impl Default for CnnTrainConfig {
    fn default() -> Self {
        Self {
            batch_size:        64,
            epochs:            10,
            lr:                0.001,
            seed:              42,
            checkpoint_policy: CheckpointPolicy::Final,
        }
    }
}

impl CnnTrainConfig {
    /// Build from a resolved hyperparameter set.
    pub fn from_hyperparameters(
        values: &HyperparameterSet,
        seed:   u64,
        policy: CheckpointPolicy,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            batch_size:        values.require_usize("batch-size")?,
            epochs:            values.require_usize("epochs")?,
            lr:                values.require_float("lr")?,
            seed,
            checkpoint_policy: policy,
        })
    }
}

// ─── TrainCnnUseCase ──────────────────────────────────────────────────────────
pub struct TrainCnnUseCase {
    paths:  JobPaths,
    config: CnnTrainConfig,
}

impl TrainCnnUseCase {
    pub fn new(paths: JobPaths, config: CnnTrainConfig) -> Self {
        Self { paths, config }
    }

    pub fn execute<W: Write>(&self, reporter: &mut MetricReporter<W>) -> Result<CnnOutcome> {
        let cfg = &self.config;

        // ── Step 1: Model directory ───────────────────────────────────────────
        let ckpt = CheckpointManager::new(&self.paths.model_dir)
            .with_context(|| format!("model directory '{}' is not writable", self.paths.model_dir.display()))?;
        ckpt.clear_stale()?;

        // ── Step 2: Load the train and validation channels ────────────────────
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

        // ── Step 4: Train ─────────────────────────────────────────────────────
        tracing::info!(
            "Training CNN: {} epochs, batch size {}, lr {}, {:?} checkpoints",
            cfg.epochs,
            cfg.batch_size,
            cfg.lr,
            cfg.checkpoint_policy
        );
        let outcome = run_training(cfg, &train, &validation, &ckpt, metrics.as_ref())?;

        // ── Step 5: Report ────────────────────────────────────────────────────
        tracing::info!(
            "Artifact holds epoch {} of {} ({:.2}% validation accuracy)",
            outcome.saved_epoch,
            cfg.epochs,
            outcome.validation_accuracy * 100.0
        );
        reporter.report(outcome.validation_accuracy)?;

        Ok(outcome)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::stage_use_case::{StageUseCase, StagingContext};
    use crate::data::source::SyntheticSource;
    use crate::domain::hyperparams::HyperparameterSpace;
    use crate::infra::object_store::LocalObjectStore;
    use tempfile::TempDir;

    #[test]
    fn test_config_from_default_hyperparameters() {
        let values = HyperparameterSpace::cnn().defaults();
        let cfg    = CnnTrainConfig::from_hyperparameters(&values, 42, CheckpointPolicy::Final).unwrap();
        assert_eq!(cfg, CnnTrainConfig::default());
    }

    #[test]
    fn test_config_json_uses_kebab_case_policy() {
        let cfg  = CnnTrainConfig { checkpoint_policy: CheckpointPolicy::EveryEpoch, ..Default::default() };
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains(r#""checkpoint_policy":"every-epoch""#));
    }

    #[test]
    fn test_one_epoch_replaces_stale_tree_artifact() {
        let _rng = crate::ml::backend_rng_guard();
        let dir = TempDir::new().unwrap();
        let ctx = StagingContext {
            store:    Box::new(LocalObjectStore::new(dir.path().join("bucket"))),
            prefix:   "mnist".to_string(),
            work_dir: dir.path().join("work"),
        };
        StageUseCase::new(Box::new(SyntheticSource::new(20, 0.5, 3))).execute(&ctx).unwrap();

        let root  = dir.path().join("bucket").join("mnist");
        let paths = JobPaths {
            model_dir:       dir.path().join("model"),
            train:           root.join("train"),
            validation:      root.join("validation"),
            output_data_dir: None,
        };
        std::fs::create_dir_all(&paths.model_dir).unwrap();
        std::fs::write(paths.model_dir.join("model.json"), b"{}").unwrap();

        let cfg          = CnnTrainConfig { batch_size: 4, epochs: 1, ..Default::default() };
        let mut reporter = MetricReporter::new(Vec::new());
        let outcome      = TrainCnnUseCase::new(paths.clone(), cfg).execute(&mut reporter).unwrap();

        let printed = String::from_utf8(reporter.into_inner()).unwrap();
        let lines: Vec<&str> = printed.lines().filter(|l| l.starts_with("validation-accuracy:")).collect();
        assert_eq!(lines.len(), 1);
        assert_eq!(outcome.history.len(), 1);

        assert!(paths.model_dir.join("model.mpk").is_file());
        assert!(paths.model_dir.join("train_config.json").is_file());
        assert!(!paths.model_dir.join("model.json").exists());
        assert!(!paths.model_dir.join("model-partial.mpk").exists());
    }
}
