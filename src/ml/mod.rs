// ============================================================
// Layer 5 — ML / Model Layer
// ============================================================
// All model code lives here: the Burn CNN and the native
// gradient-boosted tree ensemble.
//
//   model.rs      — the convolutional network
//                   2 × (conv 3x3 + ReLU), max-pool 2x2,
//                   dropout 0.25, fc 9216→128 + ReLU,
//                   dropout 0.5, fc 128→10, log-softmax
//
//   trainer.rs    — the CNN training loop
//                   forward pass, NLL loss, backward pass,
//                   Adam step, per-epoch validation and the
//                   checkpoint policy
//
//   gbt/          — histogram gradient boosting, softmax
//                   objective over 10 classes
//
//   inferencer.rs — loads whichever artifact a model directory
//                   holds and predicts labels for a split
//
// Backends: NdArray on the CPU by default; the `wgpu` cargo
// feature switches the inner backend to the GPU. Training runs
// on Autodiff<InnerBackend>, validation and inference on the
// inner backend directly.
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Chen & Guestrin (2016) XGBoost

use burn::backend::Autodiff;

#[cfg(not(feature = "wgpu"))]
pub type InnerBackend = burn::backend::NdArray;

#[cfg(feature = "wgpu")]
pub type InnerBackend = burn::backend::Wgpu;

/// Backend the CNN is trained on.
pub type TrainBackend = Autodiff<InnerBackend>;

pub type Device = <InnerBackend as burn::tensor::backend::Backend>::Device;

/// Convolutional digit classifier
pub mod model;

/// CNN training loop with validation and checkpoint policy
pub mod trainer;

/// Gradient-boosted tree ensemble
pub mod gbt;

/// Artifact loading and prediction
pub mod inferencer;

/// Tests that draw from the backend's process-wide RNG hold this
/// lock, so a seeded run sees the same sequence every time.
#[cfg(test)]
pub(crate) fn backend_rng_guard() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
