// ============================================================
// Layer 2 — Training Job Inputs
// ============================================================
// What every trainer invocation receives from the orchestrator
// besides its hyperparameters: where to read the two channels,
// where to write the artifact, and optionally where to put
// extra output (the metrics CSV).

use std::path::PathBuf;

use anyhow::Result;

use crate::domain::hyperparams::{HyperparameterSet, HyperparameterSpace};

#[derive(Debug, Clone)]
pub struct JobPaths {
    pub model_dir:       PathBuf,
    pub train:           PathBuf,
    pub validation:      PathBuf,
    pub output_data_dir: Option<PathBuf>,
}

/// Resolve `overrides` over `hps_json` over the declared defaults,
/// logging every value that falls outside the search range.
pub fn resolve_hyperparameters(
    space:     &HyperparameterSpace,
    hps_json:  Option<&str>,
    overrides: HyperparameterSet,
) -> Result<HyperparameterSet> {
    let resolution = space.resolve(hps_json, overrides)?;
    for note in &resolution.notes {
        tracing::warn!("{note}");
    }
    for (name, value) in resolution.values.iter() {
        tracing::info!("hyperparameter {name} = {value}");
    }
    Ok(resolution.values)
}
