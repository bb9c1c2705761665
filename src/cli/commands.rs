// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the five subcommands and their flags:
//
//   stage       — fetch MNIST, write .npy arrays, publish them
//   train-cnn   — train the convolutional network
//   train-tree  — train the boosted-tree ensemble
//   inspect     — describe (and optionally score) an artifact
//   ranges      — print a variant's hyperparameter ranges
//
// Every path a training job needs falls back to the managed
// platform's SM_* environment variables, so the binary runs
// unchanged as a platform entry point.
//
// Hyperparameter flags are Options: a flag that is not given
// leaves the value to SM_HPS or the declared default.
//
// Reference: Rust Book §12 (Building a CLI Program)

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::application::job::JobPaths;
use crate::domain::hyperparams::HyperparameterSet;
use crate::infra::{artifact_format::ExportFormat, checkpoint::CheckpointPolicy};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch a digit dataset and publish it as .npy train/validation channels
    Stage(StageArgs),

    /// Train the convolutional network on staged channels
    TrainCnn(TrainCnnArgs),

    /// Train the gradient-boosted tree ensemble on staged channels
    TrainTree(TrainTreeArgs),

    /// Load a model directory and print a JSON description
    Inspect(InspectArgs),

    /// Print the hyperparameter search ranges of a model variant as JSON
    Ranges(RangesArgs),
}

// ─── Stage ────────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// Download the gzip'd IDX files from an HTTP mirror
    Download,
    /// Read IDX files from a local directory
    IdxDir,
    /// Generate deterministic synthetic digits
    Synthetic,
}

#[derive(Args, Debug)]
pub struct StageArgs {
    /// Where the raw dataset comes from
    #[arg(long, value_enum, default_value_t = SourceKind::Download)]
    pub source: SourceKind,

    /// Directory holding the four IDX files (with --source idx-dir)
    #[arg(long)]
    pub idx_dir: Option<PathBuf>,

    /// Base URL of the IDX mirror (with --source download)
    #[arg(long, default_value = crate::data::source::DEFAULT_MIRROR)]
    pub mirror: String,

    /// Where downloaded files are cached
    #[arg(long, default_value = "data/mnist-raw")]
    pub cache_dir: PathBuf,

    /// Total number of generated images (with --source synthetic)
    #[arg(long, default_value_t = 1000)]
    pub samples: usize,

    /// Share of generated images that go to the train split
    #[arg(long, default_value_t = 0.8)]
    pub train_fraction: f64,

    /// Seed for synthetic generation
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Destination store: a directory path or a file:// URI
    #[arg(long, env = "MNIST_DESTINATION")]
    pub destination: String,

    /// Key prefix inside the destination
    #[arg(long, default_value = "mnist")]
    pub prefix: String,

    /// Local scratch directory for the .npy files
    #[arg(long, default_value = "data/staging")]
    pub work_dir: PathBuf,
}

// ─── Shared training job inputs ───────────────────────────────────────────────
#[derive(Args, Debug, Clone)]
pub struct JobArgs {
    /// Directory the model artifact is written to
    #[arg(long, visible_alias = "model_dir", env = "SM_MODEL_DIR")]
    pub model_dir: PathBuf,

    /// Directory holding the train channel
    #[arg(long, env = "SM_CHANNEL_TRAIN")]
    pub train: PathBuf,

    /// Directory holding the validation channel
    #[arg(long, env = "SM_CHANNEL_VALIDATION")]
    pub validation: PathBuf,

    /// Optional directory for extra output (metrics.csv)
    #[arg(long, env = "SM_OUTPUT_DATA_DIR")]
    pub output_data_dir: Option<PathBuf>,

    /// Hyperparameters as a JSON object; explicit flags win over it
    #[arg(long, env = "SM_HPS")]
    pub hps: Option<String>,
}

impl From<&JobArgs> for JobPaths {
    fn from(a: &JobArgs) -> Self {
        JobPaths {
            model_dir:       a.model_dir.clone(),
            train:           a.train.clone(),
            validation:      a.validation.clone(),
            output_data_dir: a.output_data_dir.clone(),
        }
    }
}

// ─── Train CNN ────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct TrainCnnArgs {
    #[command(flatten)]
    pub job: JobArgs,

    /// Samples per gradient step (default 64)
    #[arg(long)]
    pub batch_size: Option<i64>,

    /// Full passes over the train channel (default 10)
    #[arg(long)]
    pub epochs: Option<i64>,

    /// Adam learning rate (default 0.001)
    #[arg(long)]
    pub lr: Option<f64>,

    /// Seed for weight init and shuffling
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// When weights are written to the model directory
    #[arg(long, value_enum, default_value_t = CheckpointPolicy::Final)]
    pub checkpoint_policy: CheckpointPolicy,
}

impl TrainCnnArgs {
    pub fn overrides(&self) -> HyperparameterSet {
        let mut set = HyperparameterSet::new();
        set.set_opt("batch-size", self.batch_size);
        set.set_opt("epochs", self.epochs);
        set.set_opt("lr", self.lr);
        set
    }
}

// ─── Train Tree ───────────────────────────────────────────────────────────────
// Flag names keep their underscores; that is how the platform
// passes them to the tree container.
#[derive(Args, Debug)]
pub struct TrainTreeArgs {
    #[command(flatten)]
    pub job: JobArgs,

    /// Maximum tree depth (default 3)
    #[arg(long = "max_depth")]
    pub max_depth: Option<i64>,

    /// Shrinkage applied to every leaf (default 0.1)
    #[arg(long)]
    pub eta: Option<f64>,

    /// Boosting rounds (default 100)
    #[arg(long = "num_round")]
    pub num_round: Option<i64>,

    /// Extra artifact forms written next to model.json
    #[arg(long = "export-format", value_enum)]
    pub export_formats: Vec<ExportFormat>,
}

impl TrainTreeArgs {
    pub fn overrides(&self) -> HyperparameterSet {
        let mut set = HyperparameterSet::new();
        set.set_opt("max_depth", self.max_depth);
        set.set_opt("eta", self.eta);
        set.set_opt("num_round", self.num_round);
        set
    }
}

// ─── Inspect / Ranges ─────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Model directory to load
    #[arg(long, visible_alias = "model_dir", env = "SM_MODEL_DIR")]
    pub model_dir: PathBuf,

    /// Optional validation channel to score the model on
    #[arg(long)]
    pub validation: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Variant {
    Cnn,
    Tree,
}

#[derive(Args, Debug)]
pub struct RangesArgs {
    #[arg(long, value_enum)]
    pub variant: Variant,
}
