// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Rebuilds an inference-ready model from a model directory.
//
// The directory is probed in a fixed order:
//   model.mpk                  → CNN
//   model.json / adapter files → tree ensemble
//   neither                    → ArtifactError::NotFound
//
// Both variants then predict class labels for a loaded split.

use std::path::Path;

use burn::{data::dataloader::batcher::Batcher, prelude::*};
use serde::Serialize;

use crate::data::{batcher::DigitBatcher, dataset::DigitItem};
use crate::domain::error::ArtifactError;
use crate::domain::split::Split;
use crate::infra::artifact_format::CANONICAL_TREE_FILE;
use crate::infra::checkpoint::{CheckpointManager, CNN_FILE};
use crate::ml::gbt::Booster;
use crate::ml::model::{ConvNet, INPUT_FEATURES};
use crate::ml::{Device, InnerBackend};

const PREDICT_BATCH: usize = 256;

// ─── CNN ──────────────────────────────────────────────────────────────────────
pub struct CnnInferencer<B: Backend = InnerBackend> {
    model:  ConvNet<B>,
    device: B::Device,
}

impl<B: Backend> CnnInferencer<B> {
    pub fn from_dir(dir: &Path, device: B::Device) -> Result<Self, ArtifactError> {
        let model = CheckpointManager::open(dir).load_cnn::<B>(&device)?;
        Ok(Self { model, device })
    }

    pub fn model(&self) -> &ConvNet<B> { &self.model }

    pub fn predict(&self, split: &Split) -> Result<Vec<u8>, ArtifactError> {
        if split.feature_len() != INPUT_FEATURES {
            return Err(ArtifactError::ShapeMismatch {
                param:    "input pixels".to_string(),
                expected: vec![INPUT_FEATURES],
                found:    vec![split.feature_len()],
            });
        }

        let batcher         = DigitBatcher::<B>::new(self.device.clone());
        let mut predictions = Vec::with_capacity(split.len());

        for start in (0..split.len()).step_by(PREDICT_BATCH) {
            let end   = (start + PREDICT_BATCH).min(split.len());
            let items = (start..end)
                .map(|i| DigitItem { pixels: split.sample(i).to_vec(), label: split.labels()[i] })
                .collect();

            let classes = self
                .model
                .classify(batcher.batch(items).images)
                .into_data()
                .convert::<i64>()
                .to_vec::<i64>()
                .map_err(|e| ArtifactError::Malformed(format!("cannot read predictions: {e:?}")))?;
            predictions.extend(classes.into_iter().map(|c| c as u8));
        }
        Ok(predictions)
    }
}

// ─── Trees ────────────────────────────────────────────────────────────────────
pub struct TreeInferencer {
    booster: Booster,
}

impl TreeInferencer {
    pub fn from_dir(dir: &Path) -> Result<Self, ArtifactError> {
        Ok(Self { booster: CheckpointManager::open(dir).load_tree()? })
    }

    pub fn booster(&self) -> &Booster { &self.booster }

    pub fn predict(&self, split: &Split) -> Result<Vec<u8>, ArtifactError> {
        self.booster.predict(split)
    }
}

// ─── LoadedModel ──────────────────────────────────────────────────────────────
pub enum LoadedModel {
    Cnn(CnnInferencer),
    Tree(TreeInferencer),
}

/// Serializable description of a loaded model.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSummary {
    Cnn {
        num_params: usize,
        layers:     Vec<(String, Vec<usize>)>,
    },
    Tree {
        num_class:   usize,
        num_feature: usize,
        num_rounds:  usize,
        num_trees:   usize,
        num_leaves:  usize,
        max_depth:   usize,
    },
}

impl LoadedModel {
    /// Load whichever artifact `dir` holds.
    pub fn from_dir(dir: &Path) -> Result<Self, ArtifactError> {
        let ckpt = CheckpointManager::open(dir);
        if ckpt.has_cnn() {
            return Ok(LoadedModel::Cnn(CnnInferencer::from_dir(dir, Device::default())?));
        }
        if ckpt.has_tree() {
            return Ok(LoadedModel::Tree(TreeInferencer::from_dir(dir)?));
        }
        Err(ArtifactError::NotFound {
            dir:  dir.to_path_buf(),
            file: format!("{CNN_FILE} or {CANONICAL_TREE_FILE}"),
        })
    }

    pub fn predict(&self, split: &Split) -> Result<Vec<u8>, ArtifactError> {
        match self {
            LoadedModel::Cnn(m)  => m.predict(split),
            LoadedModel::Tree(m) => m.predict(split),
        }
    }

    pub fn summary(&self) -> ModelSummary {
        match self {
            LoadedModel::Cnn(m) => {
                let net = m.model();
                ModelSummary::Cnn {
                    num_params: net.num_params(),
                    layers: vec![
                        ("conv1".to_string(), net.conv1.weight.val().dims().to_vec()),
                        ("conv2".to_string(), net.conv2.weight.val().dims().to_vec()),
                        ("fc1".to_string(), net.fc1.weight.val().dims().to_vec()),
                        ("fc2".to_string(), net.fc2.weight.val().dims().to_vec()),
                    ],
                }
            }
            LoadedModel::Tree(m) => {
                let b = m.booster();
                ModelSummary::Tree {
                    num_class:   b.num_class,
                    num_feature: b.num_feature,
                    num_rounds:  b.num_rounds(),
                    num_trees:   b.trees.len(),
                    num_leaves:  b.trees.iter().map(|t| t.n_leaves()).sum(),
                    max_depth:   b.trees.iter().map(|t| t.depth()).max().unwrap_or(0),
                }
            }
        }
    }
}
