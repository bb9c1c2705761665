// ============================================================
// Layer 5 — CNN Training Loop
// ============================================================
// Train + validation loop using Burn's DataLoader and Adam.
//
//   - training runs on B: AutodiffBackend so loss.backward()
//     produces gradients
//   - model.valid() returns the same model on B::InnerBackend
//     with dropout disabled; validation batches are built on
//     the inner backend too
//   - argmax(1) returns [batch, 1], flattened to [batch] before
//     comparing with the targets
//   - after each epoch the checkpoint policy decides whether
//     the weights are staged; the staged weights become
//     model.mpk only once the last epoch has finished, and the
//     accuracy reported for the run is that of the staged epoch
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::{anyhow, Result};
use burn::{
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::train_cnn_use_case::CnnTrainConfig;
use crate::data::{batcher::DigitBatcher, dataset::DigitDataset};
use crate::domain::error::{ConfigError, DataError};
use crate::domain::split::Split;
use crate::infra::checkpoint::CheckpointManager;
use crate::infra::metrics::{EpochMetrics, HistorySink, MetricsLogger};
use crate::ml::model::{nll_loss, ConvNet, ConvNetConfig, INPUT_FEATURES};
use crate::ml::{Device, TrainBackend};

/// What a finished CNN run produced.
#[derive(Debug, Clone)]
pub struct CnnOutcome {
    pub history:             Vec<EpochMetrics>,
    /// Epoch whose weights are in the artifact
    pub saved_epoch:         usize,
    /// Validation accuracy of `saved_epoch`
    pub validation_accuracy: f64,
    pub num_params:          usize,
}

pub fn run_training(
    cfg:        &CnnTrainConfig,
    train:      &Split,
    validation: &Split,
    ckpt:       &CheckpointManager,
    metrics:    Option<&MetricsLogger>,
) -> Result<CnnOutcome> {
    let device = Device::default();
    tracing::info!("Using device: {:?}", device);
    let history = metrics.map(|m| m as &dyn HistorySink);
    train_loop::<TrainBackend>(cfg, train, validation, ckpt, history, &device)
}

pub fn train_loop<B: AutodiffBackend>(
    cfg:        &CnnTrainConfig,
    train:      &Split,
    validation: &Split,
    ckpt:       &CheckpointManager,
    history:    Option<&dyn HistorySink>,
    device:     &B::Device,
) -> Result<CnnOutcome> {
    if cfg.epochs == 0 {
        return Err(ConfigError::InvalidValue {
            name:   "epochs".to_string(),
            value:  "0".to_string(),
            reason: "at least one epoch is required".to_string(),
        }
        .into());
    }
    for split in [train, validation] {
        if split.feature_len() != INPUT_FEATURES {
            return Err(DataError::ShapeMismatch(format!(
                "the CNN needs {INPUT_FEATURES} pixels per sample, the {} split has shape {:?}",
                split.name(),
                split.sample_shape()
            ))
            .into());
        }
    }

    B::seed(cfg.seed);

    // ── Build model ───────────────────────────────────────────────────────────
    let mut model: ConvNet<B> = ConvNetConfig::new().init(device);
    let num_params            = model.num_params();
    tracing::info!("Model ready: {} parameters", num_params);

    let mut optim = AdamConfig::new().init();

    // ── Training data loader (AutodiffBackend) ────────────────────────────────
    let train_loader = DataLoaderBuilder::new(DigitBatcher::<B>::new(device.clone()))
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .build(DigitDataset::from_split(train));

    // ── Validation data loader (InnerBackend — no autodiff overhead) ──────────
    let val_loader = DataLoaderBuilder::new(DigitBatcher::<B::InnerBackend>::new(device.clone()))
        .batch_size(cfg.batch_size)
        .build(DigitDataset::from_split(validation));

    let mut rows        = Vec::with_capacity(cfg.epochs);
    let mut best_so_far = None;
    let mut saved       = None;

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=cfg.epochs {

        // ── Training phase ────────────────────────────────────────────────────
        let mut train_loss_sum = 0.0f64;
        let mut train_batches  = 0usize;

        for batch in train_loader.iter() {
            let loss = nll_loss(model.forward(batch.images), batch.targets);

            train_loss_sum += loss.clone().into_scalar().elem::<f64>();
            train_batches  += 1;

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(cfg.lr, model, grads);
        }

        let avg_train_loss = if train_batches > 0 {
            train_loss_sum / train_batches as f64
        } else { f64::NAN };

        // ── Validation phase ──────────────────────────────────────────────────
        let model_valid = model.valid();

        let mut val_loss_sum = 0.0f64;
        let mut correct      = 0usize;
        let mut total        = 0usize;

        for batch in val_loader.iter() {
            let n         = batch.targets.dims()[0];
            let log_probs = model_valid.forward(batch.images);

            let batch_loss: f64 = nll_loss(log_probs.clone(), batch.targets.clone())
                .into_scalar()
                .elem::<f64>();
            val_loss_sum += batch_loss * n as f64;

            let hits: i64 = log_probs
                .argmax(1)
                .flatten::<1>(0, 1)
                .equal(batch.targets)
                .int()
                .sum()
                .into_scalar()
                .elem::<i64>();
            correct += hits as usize;
            total   += n;
        }

        let avg_val_loss = if total > 0 { val_loss_sum / total as f64 } else { f64::NAN };
        let val_accuracy = if total > 0 { correct as f64 / total as f64 } else { 0.0 };

        println!(
            "Epoch {:>3}/{} | train_loss={:.4} | val_loss={:.4} | val_acc={:.2}%",
            epoch, cfg.epochs, avg_train_loss, avg_val_loss, val_accuracy * 100.0,
        );

        let row = EpochMetrics::new(epoch, avg_train_loss, avg_val_loss, val_accuracy);
        if let Some(sink) = history {
            sink.record(&row)?;
        }

        // ── Checkpoint policy ─────────────────────────────────────────────────
        if cfg.checkpoint_policy.should_save(epoch, cfg.epochs, val_accuracy, best_so_far) {
            ckpt.stage_cnn(&model_valid)?;
            saved = Some((epoch, val_accuracy));
            tracing::info!("Checkpoint staged for epoch {} ({:?} policy)", epoch, cfg.checkpoint_policy);
        }
        if row.is_improvement(best_so_far) {
            best_so_far = Some(val_accuracy);
        }
        rows.push(row);
    }

    let (saved_epoch, validation_accuracy) =
        saved.ok_or_else(|| anyhow!("training finished without writing a checkpoint"))?;
    ckpt.promote_cnn()?;

    tracing::info!("Training complete!");
    Ok(CnnOutcome { history: rows, saved_epoch, validation_accuracy, num_params })
}
