// ============================================================
// Multi-class booster (softmax objective)
// ============================================================
// Each round fits one tree per class to the second-order
// statistics of the softmax cross-entropy, all K trees of a
// round using the probabilities from before the round:
//
//   p_k = softmax(margin)_k
//   g_k = p_k − [y = k]
//   h_k = max(2 · p_k · (1 − p_k), 1e-16)
//
// Margins start at base_score for every class. Trees are kept
// round-major: tree r·K + k is round r, class k.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::domain::error::ArtifactError;
use crate::domain::split::{Split, NUM_CLASSES};
use crate::ml::gbt::binning::{BinCuts, MAX_BINS};
use crate::ml::gbt::tree::{BinnedMatrix, GrowParams, Tree, TreeGrower};

pub const OBJECTIVE: &str = "multi:softprob";

const MIN_HESSIAN: f64 = 1e-16;
const PROB_FLOOR:  f64 = 1e-15;

// ─── BoosterParams ────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoosterParams {
    pub max_depth:        usize,
    pub eta:              f64,
    pub num_round:        usize,
    pub num_class:        usize,
    pub lambda:           f64,
    pub gamma:            f64,
    pub min_child_weight: f64,
    pub max_bin:          usize,
    pub base_score:       f32,
}

impl BoosterParams {
    pub fn new(max_depth: usize, eta: f64, num_round: usize) -> Self {
        Self {
            max_depth,
            eta,
            num_round,
            num_class:        NUM_CLASSES,
            lambda:           1.0,
            gamma:            0.0,
            min_child_weight: 1.0,
            max_bin:          MAX_BINS,
            base_score:       0.5,
        }
    }

    fn grow_params(&self) -> GrowParams {
        GrowParams {
            max_depth:        self.max_depth,
            eta:              self.eta,
            lambda:           self.lambda,
            gamma:            self.gamma,
            min_child_weight: self.min_child_weight,
        }
    }
}

// ─── Booster ──────────────────────────────────────────────────────────────────
/// A trained ensemble. This struct is the canonical artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booster {
    pub objective:   String,
    pub num_class:   usize,
    pub num_feature: usize,
    pub base_score:  f32,
    pub trees:       Vec<Tree>,
}

impl Booster {
    #[cfg(test)]
    pub fn new(num_feature: usize, base_score: f32, trees: Vec<Tree>) -> Self {
        Self {
            objective: OBJECTIVE.to_string(),
            num_class: NUM_CLASSES,
            num_feature,
            base_score,
            trees,
        }
    }

    pub fn num_rounds(&self) -> usize {
        if self.num_class == 0 { 0 } else { self.trees.len() / self.num_class }
    }

    /// Raw per-class scores for one sample.
    pub fn margins(&self, x: &[f32]) -> Vec<f64> {
        let mut m = vec![f64::from(self.base_score); self.num_class];
        for (i, tree) in self.trees.iter().enumerate() {
            m[i % self.num_class] += f64::from(tree.predict(x));
        }
        m
    }

    /// Most likely class per sample of `split`.
    pub fn predict(&self, split: &Split) -> Result<Vec<u8>, ArtifactError> {
        if split.feature_len() != self.num_feature {
            return Err(ArtifactError::ShapeMismatch {
                param:    "input features".to_string(),
                expected: vec![self.num_feature],
                found:    vec![split.feature_len()],
            });
        }
        Ok((0..split.len()).map(|i| argmax(&self.margins(split.sample(i))) as u8).collect())
    }

    /// Check the ensemble is complete and every tree is well-formed.
    pub fn validate(&self) -> Result<(), ArtifactError> {
        if self.objective != OBJECTIVE {
            return Err(ArtifactError::Malformed(format!("unsupported objective '{}'", self.objective)));
        }
        if self.num_class != NUM_CLASSES {
            return Err(ArtifactError::ShapeMismatch {
                param:    "num_class".to_string(),
                expected: vec![NUM_CLASSES],
                found:    vec![self.num_class],
            });
        }
        if self.trees.is_empty() || self.trees.len() % self.num_class != 0 {
            return Err(ArtifactError::Malformed(format!(
                "{} trees is not a whole number of rounds of {} classes",
                self.trees.len(),
                self.num_class
            )));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.num_feature)
                .map_err(|reason| ArtifactError::Malformed(format!("tree {i}: {reason}")))?;
        }
        Ok(())
    }
}

// ─── Training ─────────────────────────────────────────────────────────────────
/// Evaluation after one boosting round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundEval {
    /// 0-based round index, as printed in the evaluation log
    pub round:               usize,
    pub train_mlogloss:      f64,
    pub validation_mlogloss: f64,
    pub validation_accuracy: f64,
}

impl RoundEval {
    /// `[r]\ttrain-mlogloss:x\tvalidation-mlogloss:y`
    pub fn log_line(&self) -> String {
        format!(
            "[{}]\ttrain-mlogloss:{:.5}\tvalidation-mlogloss:{:.5}",
            self.round, self.train_mlogloss, self.validation_mlogloss
        )
    }
}

/// Fit an ensemble on `train`, evaluating against both splits after
/// every round. `on_round` sees each evaluation; an error from it
/// stops training.
pub fn train<F>(params: &BoosterParams, train: &Split, validation: &Split, mut on_round: F) -> Result<Booster>
where
    F: FnMut(&RoundEval) -> Result<()>,
{
    train.ensure_non_empty()?;
    validation.ensure_non_empty()?;
    train.ensure_compatible(validation)?;

    let k          = params.num_class;
    let n_features = train.feature_len();
    let n_rows     = train.len();

    // ── Step 1: Bin the training matrix once ──────────────────────────────────
    let cuts   = BinCuts::build(train.features(), n_features, params.max_bin);
    let bins   = cuts.bin_matrix(train.features());
    let matrix = BinnedMatrix { cuts: &cuts, bins: &bins, n_rows };
    tracing::info!(
        "Binned {} rows x {} features into {} bins",
        n_rows,
        n_features,
        cuts.total_bins()
    );

    let base             = f64::from(params.base_score);
    let mut train_margin = vec![base; n_rows * k];
    let mut val_margin   = vec![base; validation.len() * k];
    let mut trees        = Vec::with_capacity(params.num_round * k);
    let mut grad         = vec![0f32; n_rows];
    let mut hess         = vec![0f32; n_rows];

    for round in 0..params.num_round {
        // ── Step 2: Gradients from the margins before this round ─────────────
        let probs: Vec<Vec<f64>> = train_margin.chunks_exact(k).map(softmax).collect();

        for class in 0..k {
            for (row, p) in probs.iter().enumerate() {
                let y     = f64::from(u8::from(usize::from(train.labels()[row]) == class));
                let pk    = p[class];
                grad[row] = (pk - y) as f32;
                hess[row] = (2.0 * pk * (1.0 - pk)).max(MIN_HESSIAN) as f32;
            }

            // ── Step 3: Fit one tree and fold it into both margins ────────────
            let tree = TreeGrower::new(&matrix, &grad, &hess, params.grow_params()).grow();
            for row in 0..n_rows {
                train_margin[row * k + class] += f64::from(tree.predict(train.sample(row)));
            }
            for row in 0..validation.len() {
                val_margin[row * k + class] += f64::from(tree.predict(validation.sample(row)));
            }
            trees.push(tree);
        }

        // ── Step 4: Evaluate ──────────────────────────────────────────────────
        let eval = RoundEval {
            round,
            train_mlogloss:      mlogloss(&train_margin, train.labels(), k),
            validation_mlogloss: mlogloss(&val_margin, validation.labels(), k),
            validation_accuracy: margin_accuracy(&val_margin, validation.labels(), k),
        };
        on_round(&eval)?;
    }

    Ok(Booster {
        objective:   OBJECTIVE.to_string(),
        num_class:   k,
        num_feature: n_features,
        base_score:  params.base_score,
        trees,
    })
}

fn softmax(margins: &[f64]) -> Vec<f64> {
    let max  = margins.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = margins.iter().map(|m| (m - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
        .0
}

fn mlogloss(margins: &[f64], labels: &[u8], k: usize) -> f64 {
    let total: f64 = margins
        .chunks_exact(k)
        .zip(labels)
        .map(|(m, &y)| -softmax(m)[usize::from(y)].max(PROB_FLOOR).ln())
        .sum();
    total / labels.len().max(1) as f64
}

fn margin_accuracy(margins: &[f64], labels: &[u8], k: usize) -> f64 {
    let predictions: Vec<u8> = margins.chunks_exact(k).map(|m| argmax(m) as u8).collect();
    crate::domain::split::accuracy(&predictions, labels)
}
