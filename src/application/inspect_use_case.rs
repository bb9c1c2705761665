// ============================================================
// Layer 2 — InspectUseCase
// ============================================================
// Loads whatever artifact a model directory holds and
// describes it, together with the training configuration
// saved next to it; optionally scores it on a validation
// channel.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::data::loader::ChannelLoader;
use crate::domain::split::{accuracy, SplitName};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::inferencer::{LoadedModel, ModelSummary};

#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    pub model_dir:           PathBuf,
    pub model:               ModelSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub training_config:     Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_samples:  Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_accuracy: Option<f64>,
}

pub struct InspectUseCase {
    model_dir:  PathBuf,
    validation: Option<PathBuf>,
}

impl InspectUseCase {
    pub fn new(model_dir: PathBuf, validation: Option<PathBuf>) -> Self {
        Self { model_dir, validation }
    }

    pub fn execute(&self) -> Result<InspectReport> {
        let model = LoadedModel::from_dir(&self.model_dir)
            .with_context(|| format!("cannot load a model from '{}'", self.model_dir.display()))?;

        // Artifacts written by hand have no config next to them
        let training_config = match CheckpointManager::open(&self.model_dir).load_config::<serde_json::Value>() {
            Ok(cfg) => Some(cfg),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e).context("cannot read the saved training configuration"),
        };

        let mut report = InspectReport {
            model_dir:           self.model_dir.clone(),
            model:               model.summary(),
            training_config,
            validation_samples:  None,
            validation_accuracy: None,
        };

        if let Some(dir) = &self.validation {
            let split       = ChannelLoader::new(dir).load(SplitName::Validation)?;
            let predictions = model.predict(&split)?;
            report.validation_samples  = Some(split.len());
            report.validation_accuracy = Some(accuracy(&predictions, split.labels()));
        }

        Ok(report)
    }
}
