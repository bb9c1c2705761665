// ============================================================
// Layer 4 — Channel Loader
// ============================================================
// Reads one staged split from an input channel directory.
//
// A channel is the directory the orchestrator mounts for one
// split, e.g. SM_CHANNEL_TRAIN:
//
//   <train channel>/train_data.npy        [N, 28, 28] or [N, 784]
//   <train channel>/train_labels.npy      [N]
//   <validation channel>/test_data.npy
//   <validation channel>/test_labels.npy
//
// The loader keeps the per-sample shape as stored; each model
// reshapes to what it needs (2-D image for the CNN, flat vector
// for the trees).

use std::path::{Path, PathBuf};

use crate::data::npy::NpyArray;
use crate::domain::error::DataError;
use crate::domain::split::{Split, SplitName};

pub struct ChannelLoader {
    dir: PathBuf,
}

impl ChannelLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Load the `name` split stored in this channel.
    pub fn load(&self, name: SplitName) -> Result<Split, DataError> {
        let features_path = self.dir.join(name.features_file());
        let labels_path   = self.dir.join(name.labels_file());

        let features = NpyArray::read(&features_path)?;
        let labels   = NpyArray::read(&labels_path)?;

        // ── Step 1: Check the pair of arrays line up ──────────────────────────
        let f_shape = features.shape();
        let l_shape = labels.shape();
        if f_shape.len() < 2 {
            return Err(DataError::ShapeMismatch(format!(
                "'{}' must be at least 2-D (samples x features), found shape {f_shape:?}",
                features_path.display()
            )));
        }
        if l_shape.len() != 1 || l_shape[0] != f_shape[0] {
            return Err(DataError::ShapeMismatch(format!(
                "'{}' has shape {l_shape:?} but '{}' holds {} samples",
                labels_path.display(),
                features_path.display(),
                f_shape[0]
            )));
        }

        // ── Step 2: Convert to f32 features and class labels ──────────────────
        let sample_shape = f_shape[1..].to_vec();
        let labels       = labels.to_labels(&labels_path.display().to_string())?;
        let split        = Split::new(name, sample_shape, features.to_f32_features(), labels)?;

        tracing::info!(
            "Loaded {} split: {} samples of shape {:?} from '{}'",
            name,
            split.len(),
            split.sample_shape(),
            self.dir.display()
        );
        Ok(split)
    }
}

/// Load both channels and check they can be trained on together.
pub fn load_splits(train_dir: &Path, validation_dir: &Path) -> Result<(Split, Split), DataError> {
    let train      = ChannelLoader::new(train_dir).load(SplitName::Train)?;
    let validation = ChannelLoader::new(validation_dir).load(SplitName::Validation)?;

    train.ensure_non_empty()?;
    validation.ensure_non_empty()?;
    train.ensure_compatible(&validation)?;

    Ok((train, validation))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::npy::NpyData;
    use tempfile::TempDir;

    fn stage(dir: &Path, name: SplitName, shape: Vec<usize>, labels: Vec<u8>) {
        let count: usize = shape.iter().product();
        NpyArray::new(shape, NpyData::U8(vec![255; count]))
            .unwrap()
            .write(&dir.join(name.features_file()))
            .unwrap();
        NpyArray::new(vec![labels.len()], NpyData::U8(labels))
            .unwrap()
            .write(&dir.join(name.labels_file()))
            .unwrap();
    }

    #[test]
    fn test_load_scales_pixels() {
        let dir = TempDir::new().unwrap();
        stage(dir.path(), SplitName::Train, vec![2, 4, 4], vec![1, 2]);

        let split = ChannelLoader::new(dir.path()).load(SplitName::Train).unwrap();
        assert_eq!(split.len(), 2);
        assert_eq!(split.sample_shape(), &[4, 4]);
        assert!(split.features().iter().all(|&x| (x - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_missing_channel_file() {
        let dir = TempDir::new().unwrap();
        let err = ChannelLoader::new(dir.path()).load(SplitName::Validation).unwrap_err();
        assert!(matches!(err, DataError::MissingFile(_)));
    }

    #[test]
    fn test_label_count_mismatch() {
        let dir = TempDir::new().unwrap();
        stage(dir.path(), SplitName::Train, vec![3, 4], vec![1, 2]);
        let err = ChannelLoader::new(dir.path()).load(SplitName::Train).unwrap_err();
        assert!(matches!(err, DataError::ShapeMismatch(_)));
    }

    #[test]
    fn test_incompatible_splits_rejected() {
        let train = TempDir::new().unwrap();
        let val   = TempDir::new().unwrap();
        stage(train.path(), SplitName::Train, vec![2, 4, 4], vec![0, 1]);
        stage(val.path(), SplitName::Validation, vec![2, 3, 3], vec![0, 1]);

        let err = load_splits(train.path(), val.path()).unwrap_err();
        assert!(matches!(err, DataError::ShapeMismatch(_)));
    }
}
