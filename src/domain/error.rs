// ============================================================
// Layer 3 — Error Taxonomy
// ============================================================
// Three families of failure, all fatal for a training job:
//
//   ConfigError   — missing/invalid hyperparameter or path,
//                   detected at startup before any work starts
//   DataError     — dataset fetch/read failures and malformed
//                   or mismatched arrays
//   ArtifactError — model artifact missing, unreadable, or not
//                   matching the expected architecture
//
// The library layers return these typed errors; the CLI and
// application layers wrap them in anyhow with extra context.
// Callers that need to react to a specific case (e.g. "artifact
// not found") can downcast the anyhow error back to these types.

use std::path::PathBuf;
use thiserror::Error;

use crate::domain::split::SplitName;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing hyperparameter '{0}'")]
    MissingParameter(String),

    #[error("hyperparameter '{name}' = {value} is invalid: {reason}")]
    InvalidValue {
        name:   String,
        value:  String,
        reason: String,
    },

    #[error("unknown hyperparameter '{0}'")]
    UnknownParameter(String),

    #[error("cannot parse hyperparameter JSON: {0}")]
    HyperparameterJson(#[from] serde_json::Error),

    #[error("unsupported storage destination '{0}' (expected a path or file:// URI)")]
    UnsupportedDestination(String),

    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum DataError {
    #[error("expected data file '{}' does not exist", .0.display())]
    MissingFile(PathBuf),

    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed .npy data in '{origin}': {reason}")]
    Npy { origin: String, reason: String },

    #[error("malformed IDX data in '{origin}': {reason}")]
    Idx { origin: String, reason: String },

    #[error("cannot fetch '{url}': {reason}")]
    Fetch { url: String, reason: String },

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("label {label} at index {index} is outside the class range [0, {num_classes})")]
    LabelOutOfRange {
        index:       usize,
        label:       i64,
        num_classes: usize,
    },

    #[error("the {0} split is empty")]
    EmptySplit(SplitName),

    #[error("the {split} split has a non-finite feature value at position {index}")]
    NonFiniteFeature { split: SplitName, index: usize },
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("no model artifact '{file}' found in '{}'", .dir.display())]
    NotFound { dir: PathBuf, file: String },

    #[error("artifact shape mismatch for '{param}': expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        param:    String,
        expected: Vec<usize>,
        found:    Vec<usize>,
    },

    #[error("cannot decode artifact '{}': {reason}", .path.display())]
    Decode { path: PathBuf, reason: String },

    #[error("malformed model: {0}")]
    Malformed(String),

    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ArtifactError {
    /// True when the failure means "there is nothing to load here".
    pub fn is_not_found(&self) -> bool {
        matches!(self, ArtifactError::NotFound { .. })
    }
}
