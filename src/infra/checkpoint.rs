// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Owns every file a trainer writes into the model directory.
//
//   <model_dir>/
//     model.mpk          ← CNN weights (Burn NamedMpkFileRecorder,
//                          full precision)
//     model.json         ← tree ensemble, canonical JSON
//     model.json.gz      ← optional adapter copies (see
//                          artifact_format.rs)
//     train_config.json  ← resolved training configuration
//
// Rules:
//   - clear_stale() runs before training starts, so a run that
//     crashes before its final save leaves no artifact behind
//     for an orchestrator to pick up by mistake
//   - every write goes to a partial file first and is then
//     renamed into place
//   - CNN weights saved during the epoch loop stay in
//     model-partial.mpk; promote_cnn() renames them to
//     model.mpk once, after the last epoch succeeded
//   - loads fail with ArtifactError::NotFound when the file is
//     absent, and with ShapeMismatch / Malformed when it does
//     not describe the expected model
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            Rust Book §9 (Error Handling)

use std::{
    fs,
    path::{Path, PathBuf},
};

use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
};
use clap::ValueEnum;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::domain::error::ArtifactError;
use crate::infra::artifact_format::{ExportFormat, CANONICAL_TREE_FILE};
use crate::ml::gbt::Booster;
use crate::ml::model::{ConvNet, ConvNetConfig};

pub const CNN_FILE_STEM: &str = "model";
pub const CNN_FILE:      &str = "model.mpk";
pub const CONFIG_FILE:   &str = "train_config.json";

type CnnRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

// ─── CheckpointPolicy ─────────────────────────────────────────────────────────
/// When the CNN trainer writes its weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CheckpointPolicy {
    /// Only after the last epoch.
    #[default]
    Final,
    /// After every epoch, each save replacing the previous one.
    EveryEpoch,
    /// Whenever validation accuracy beats every earlier epoch.
    Best,
}

impl CheckpointPolicy {
    /// Decide whether `epoch` (1-based, of `total`) gets saved.
    /// `best_so_far` is the best validation accuracy of earlier epochs.
    pub fn should_save(
        self,
        epoch:       usize,
        total:       usize,
        accuracy:    f64,
        best_so_far: Option<f64>,
    ) -> bool {
        match self {
            CheckpointPolicy::Final      => epoch == total,
            CheckpointPolicy::EveryEpoch => true,
            CheckpointPolicy::Best       => best_so_far.map_or(true, |best| accuracy > best),
        }
    }
}

// ─── CheckpointManager ────────────────────────────────────────────────────────
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create the manager, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ArtifactError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| ArtifactError::Io { path: dir.clone(), source })?;
        Ok(Self { dir })
    }

    /// Open an existing model directory for reading.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn has_cnn(&self) -> bool { self.dir.join(CNN_FILE).is_file() }

    pub fn has_tree(&self) -> bool {
        self.dir.join(CANONICAL_TREE_FILE).is_file()
            || ExportFormat::all()
                .into_iter()
                .any(|f| self.dir.join(f.adapter().file_name()).is_file())
    }

    /// Remove every artifact an earlier run may have left.
    pub fn clear_stale(&self) -> Result<(), ArtifactError> {
        let mut names = vec![CNN_FILE.to_string(), CANONICAL_TREE_FILE.to_string(), CONFIG_FILE.to_string()];
        names.extend(ExportFormat::all().into_iter().map(|f| f.adapter().file_name().to_string()));
        names.push(format!("{CNN_FILE_STEM}-partial.mpk"));

        for name in names {
            for path in [self.dir.join(&name), partial_path(&self.dir.join(&name))] {
                if path.is_file() {
                    fs::remove_file(&path).map_err(|source| ArtifactError::Io { path: path.clone(), source })?;
                    tracing::info!("Removed stale artifact '{}'", path.display());
                }
            }
        }
        Ok(())
    }

    // ─── CNN ──────────────────────────────────────────────────────────────────
    /// Write CNN weights to the staging file `model-partial.mpk`.
    ///
    /// The recorder appends the extension itself, so it is handed the
    /// stem. Nothing a loader reads exists until `promote_cnn`.
    pub fn stage_cnn<B: Backend>(&self, model: &ConvNet<B>) -> Result<PathBuf, ArtifactError> {
        let staged = self.staged_cnn_path();

        CnnRecorder::new()
            .record(model.clone().into_record(), self.dir.join(format!("{CNN_FILE_STEM}-partial")))
            .map_err(|e| ArtifactError::Decode { path: staged.clone(), reason: format!("{e:?}") })?;

        tracing::debug!("Staged CNN weights in '{}'", staged.display());
        Ok(staged)
    }

    /// Move the staged weights into place as `model.mpk`.
    pub fn promote_cnn(&self) -> Result<PathBuf, ArtifactError> {
        let staged = self.staged_cnn_path();
        if !staged.is_file() {
            return Err(ArtifactError::NotFound {
                dir:  self.dir.clone(),
                file: format!("{CNN_FILE_STEM}-partial.mpk"),
            });
        }
        let target = self.dir.join(CNN_FILE);
        fs::rename(&staged, &target).map_err(|source| ArtifactError::Io { path: target.clone(), source })?;

        tracing::info!("Saved CNN weights to '{}'", target.display());
        Ok(target)
    }

    fn staged_cnn_path(&self) -> PathBuf {
        self.dir.join(format!("{CNN_FILE_STEM}-partial.mpk"))
    }

    /// Rebuild the CNN and load `model.mpk` into it.
    pub fn load_cnn<B: Backend>(&self, device: &B::Device) -> Result<ConvNet<B>, ArtifactError> {
        let path = self.dir.join(CNN_FILE);
        if !path.is_file() {
            return Err(ArtifactError::NotFound { dir: self.dir.clone(), file: CNN_FILE.to_string() });
        }

        let record = CnnRecorder::new()
            .load(self.dir.join(CNN_FILE_STEM), device)
            .map_err(|e| ArtifactError::Decode { path: path.clone(), reason: format!("{e:?}") })?;

        let model = ConvNetConfig::new().init::<B>(device).load_record(record);
        model.check_shapes()?;

        tracing::info!("Loaded CNN weights from '{}'", path.display());
        Ok(model)
    }

    // ─── Trees ────────────────────────────────────────────────────────────────
    /// Write the canonical `model.json`, plus one file per requested adapter.
    pub fn save_tree(&self, booster: &Booster, formats: &[ExportFormat]) -> Result<Vec<PathBuf>, ArtifactError> {
        let canonical = serde_json::to_vec_pretty(booster)
            .map_err(|e| ArtifactError::Malformed(format!("cannot serialise ensemble: {e}")))?;

        let mut written = vec![self.write_atomic(CANONICAL_TREE_FILE, &canonical)?];
        for format in formats {
            let adapter = format.adapter();
            let bytes   = adapter.encode(&canonical).map_err(|source| ArtifactError::Io {
                path: self.dir.join(adapter.file_name()),
                source,
            })?;
            written.push(self.write_atomic(adapter.file_name(), &bytes)?);
        }

        tracing::debug!("Saved tree ensemble as {:?}", written);
        Ok(written)
    }

    /// Load the ensemble from `model.json`, falling back to adapter files.
    pub fn load_tree(&self) -> Result<Booster, ArtifactError> {
        let canonical_path = self.dir.join(CANONICAL_TREE_FILE);

        let (path, canonical) = if canonical_path.is_file() {
            let bytes = read(&canonical_path)?;
            (canonical_path, bytes)
        } else {
            let fallback = ExportFormat::all()
                .into_iter()
                .map(|f| f.adapter())
                .find(|a| self.dir.join(a.file_name()).is_file());

            let Some(adapter) = fallback else {
                return Err(ArtifactError::NotFound {
                    dir:  self.dir.clone(),
                    file: CANONICAL_TREE_FILE.to_string(),
                });
            };
            let path   = self.dir.join(adapter.file_name());
            let stored = read(&path)?;
            let bytes  = adapter
                .decode(&stored)
                .map_err(|e| ArtifactError::Decode { path: path.clone(), reason: e.to_string() })?;
            tracing::info!("Using {} adapter file '{}'", adapter.name(), path.display());
            (path, bytes)
        };

        let booster: Booster = serde_json::from_slice(&canonical)
            .map_err(|e| ArtifactError::Decode { path: path.clone(), reason: e.to_string() })?;
        booster.validate()?;

        tracing::info!("Loaded tree ensemble from '{}'", path.display());
        Ok(booster)
    }

    // ─── Config ───────────────────────────────────────────────────────────────
    pub fn save_config<T: Serialize>(&self, cfg: &T) -> Result<PathBuf, ArtifactError> {
        let json = serde_json::to_vec_pretty(cfg)
            .map_err(|e| ArtifactError::Malformed(format!("cannot serialise config: {e}")))?;
        self.write_atomic(CONFIG_FILE, &json)
    }

    pub fn load_config<T: DeserializeOwned>(&self) -> Result<T, ArtifactError> {
        let path = self.dir.join(CONFIG_FILE);
        if !path.is_file() {
            return Err(ArtifactError::NotFound { dir: self.dir.clone(), file: CONFIG_FILE.to_string() });
        }
        serde_json::from_slice(&read(&path)?)
            .map_err(|e| ArtifactError::Decode { path, reason: e.to_string() })
    }

    fn write_atomic(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, ArtifactError> {
        let target  = self.dir.join(name);
        let partial = partial_path(&target);
        fs::write(&partial, bytes).map_err(|source| ArtifactError::Io { path: partial.clone(), source })?;
        fs::rename(&partial, &target).map_err(|source| ArtifactError::Io { path: target.clone(), source })?;
        Ok(target)
    }
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    target.with_file_name(name)
}

fn read(path: &Path) -> Result<Vec<u8>, ArtifactError> {
    fs::read(path).map_err(|source| ArtifactError::Io { path: path.to_path_buf(), source })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::gbt::tree::{Node, Tree};
    use burn::backend::NdArray;
    use tempfile::TempDir;

    fn tiny_booster() -> Booster {
        let leaf = Tree { nodes: vec![Node::Leaf { value: 0.1 }] };
        Booster::new(4, 0.5, vec![leaf; 10])
    }

    #[test]
    fn test_policy_decisions() {
        assert!(!CheckpointPolicy::Final.should_save(1, 3, 0.9, None));
        assert!(CheckpointPolicy::Final.should_save(3, 3, 0.1, Some(0.9)));
        assert!(CheckpointPolicy::EveryEpoch.should_save(1, 3, 0.1, Some(0.9)));
        assert!(CheckpointPolicy::Best.should_save(1, 3, 0.1, None));
        assert!(!CheckpointPolicy::Best.should_save(2, 3, 0.5, Some(0.5)));
        assert!(CheckpointPolicy::Best.should_save(2, 3, 0.6, Some(0.5)));
    }

    #[test]
    fn test_missing_cnn_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = CheckpointManager::open(dir.path()).load_cnn::<NdArray>(&Default::default()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_staged_cnn_is_invisible_until_promoted() {
        let _rng = crate::ml::backend_rng_guard();
        let dir   = TempDir::new().unwrap();
        let ckpt  = CheckpointManager::new(dir.path()).unwrap();
        let model = ConvNetConfig::new().init::<NdArray>(&Default::default());

        ckpt.stage_cnn(&model).unwrap();
        assert!(!ckpt.has_cnn());
        assert!(ckpt.load_cnn::<NdArray>(&Default::default()).unwrap_err().is_not_found());

        ckpt.promote_cnn().unwrap();
        assert!(ckpt.has_cnn());
        assert!(!dir.path().join("model-partial.mpk").exists());

        let loaded = ckpt.load_cnn::<NdArray>(&Default::default()).unwrap();
        assert_eq!(loaded.num_params(), model.num_params());
    }

    #[test]
    fn test_clear_stale_drops_staged_cnn() {
        let _rng = crate::ml::backend_rng_guard();
        let dir  = TempDir::new().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        ckpt.stage_cnn(&ConvNetConfig::new().init::<NdArray>(&Default::default())).unwrap();

        ckpt.clear_stale().unwrap();
        assert!(!dir.path().join("model-partial.mpk").exists());
        assert!(ckpt.promote_cnn().unwrap_err().is_not_found());
    }

    #[test]
    fn test_tree_falls_back_to_gzip_adapter() {
        let dir  = TempDir::new().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let ens  = tiny_booster();

        ckpt.save_tree(&ens, &[ExportFormat::Gzip]).unwrap();
        fs::remove_file(dir.path().join(CANONICAL_TREE_FILE)).unwrap();

        assert_eq!(ckpt.load_tree().unwrap(), ens);
    }

    #[test]
    fn test_clear_stale_removes_old_artifacts() {
        let dir  = TempDir::new().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        ckpt.save_tree(&tiny_booster(), &[ExportFormat::Gzip]).unwrap();
        ckpt.save_config(&serde_json::json!({"eta": 0.3})).unwrap();

        ckpt.clear_stale().unwrap();
        assert!(!ckpt.has_tree());
        assert!(ckpt.load_config::<serde_json::Value>().unwrap_err().is_not_found());
    }

    #[test]
    fn test_corrupt_tree_is_decode_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CANONICAL_TREE_FILE), b"{not json").unwrap();
        let err = CheckpointManager::open(dir.path()).load_tree().unwrap_err();
        assert!(matches!(err, ArtifactError::Decode { .. }));
    }
}
