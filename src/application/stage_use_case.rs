// ============================================================
// Layer 2 — StageUseCase
// ============================================================
// Prepares the dataset every training job reads:
//
//   Step 1: Fetch both splits from the source      (Layer 4 - data)
//   Step 2: Write four .npy arrays locally         (Layer 4 - data)
//             <work>/train/train_data.npy        [N, 28, 28] u8
//             <work>/train/train_labels.npy      [N]         u8
//             <work>/validation/test_data.npy
//             <work>/validation/test_labels.npy
//   Step 3: Publish them under two prefixes        (Layer 6 - infra)
//             <prefix>/train/...
//             <prefix>/validation/...
//
// Any failure aborts the whole stage. Re-running overwrites the
// previous output; two stages must not target the same
// destination at once.
//
// The destination store is handed in through StagingContext
// rather than looked up from process-wide state, so tests can
// stage into a temporary directory.

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::data::npy::{NpyArray, NpyData};
use crate::domain::split::{RawSplit, SplitName};
use crate::domain::traits::{DatasetSource, ObjectStore};

// ─── StagingContext ───────────────────────────────────────────────────────────
/// Where staged data goes.
pub struct StagingContext {
    pub store:    Box<dyn ObjectStore>,
    /// Key prefix inside the store, e.g. "mnist"
    pub prefix:   String,
    /// Local scratch directory for the .npy files
    pub work_dir: PathBuf,
}

impl StagingContext {
    /// Store key of `file` in the `split` channel.
    pub fn key(&self, split: SplitName, file: &str) -> String {
        [self.prefix.trim_matches('/'), split.prefix(), file]
            .iter()
            .filter(|p| !p.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("/")
    }

    /// URI of the channel directory a trainer reads `split` from.
    pub fn channel_uri(&self, split: SplitName) -> String {
        let key = self.key(split, "");
        self.store.uri(key.trim_end_matches('/'))
    }
}

// ─── StageReport ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub source:             String,
    pub train_uri:          String,
    pub validation_uri:     String,
    pub train_samples:      usize,
    pub validation_samples: usize,
    pub image_dims:         [usize; 2],
}

// ─── StageUseCase ─────────────────────────────────────────────────────────────
pub struct StageUseCase {
    source: Box<dyn DatasetSource>,
}

impl StageUseCase {
    pub fn new(source: Box<dyn DatasetSource>) -> Self {
        Self { source }
    }

    pub fn execute(&self, ctx: &StagingContext) -> Result<StageReport> {
        // ── Step 1: Fetch ─────────────────────────────────────────────────────
        tracing::info!("Fetching {}", self.source.describe());
        let dataset = self
            .source
            .fetch()
            .with_context(|| format!("cannot fetch {}", self.source.describe()))?;
        tracing::info!(
            "Fetched {} train and {} validation images",
            dataset.train.image_count(),
            dataset.validation.image_count()
        );

        // ── Step 2 + 3: Write locally, then publish ───────────────────────────
        for split in [&dataset.train, &dataset.validation] {
            self.stage_split(ctx, split)?;
        }

        Ok(StageReport {
            source:             self.source.describe(),
            train_uri:          ctx.channel_uri(SplitName::Train),
            validation_uri:     ctx.channel_uri(SplitName::Validation),
            train_samples:      dataset.train.image_count(),
            validation_samples: dataset.validation.image_count(),
            image_dims:         dataset.train.image_dims,
        })
    }

    fn stage_split(&self, ctx: &StagingContext, split: &RawSplit) -> Result<()> {
        let local_dir = ctx.work_dir.join(split.name.prefix());
        fs::create_dir_all(&local_dir)
            .with_context(|| format!("cannot create '{}'", local_dir.display()))?;

        let [rows, cols] = split.image_dims;
        let arrays = [
            (
                split.name.features_file(),
                NpyArray::new(vec![split.image_count(), rows, cols], NpyData::U8(split.pixels.clone()))?,
            ),
            (
                split.name.labels_file(),
                NpyArray::new(vec![split.image_count()], NpyData::U8(split.labels.clone()))?,
            ),
        ];

        for (file, array) in arrays {
            let local = local_dir.join(&file);
            array.write(&local)?;

            let key   = ctx.key(split.name, &file);
            let bytes = fs::read(&local).with_context(|| format!("cannot re-read '{}'", local.display()))?;
            ctx.store
                .put(&key, &bytes)
                .with_context(|| format!("cannot publish {}", ctx.store.uri(&key)))?;
            tracing::info!("Published {}", ctx.store.uri(&key));
        }
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::load_splits;
    use crate::data::source::SyntheticSource;
    use crate::infra::object_store::LocalObjectStore;
    use tempfile::TempDir;

    fn context(dir: &TempDir, prefix: &str) -> StagingContext {
        StagingContext {
            store:    Box::new(LocalObjectStore::new(dir.path().join("bucket"))),
            prefix:   prefix.to_string(),
            work_dir: dir.path().join("work"),
        }
    }

    #[test]
    fn test_key_layout() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, "mnist/");
        assert_eq!(ctx.key(SplitName::Train, "train_data.npy"), "mnist/train/train_data.npy");
        assert_eq!(ctx.key(SplitName::Validation, "test_labels.npy"), "mnist/validation/test_labels.npy");

        let bare = context(&dir, "");
        assert_eq!(bare.key(SplitName::Train, "train_labels.npy"), "train/train_labels.npy");
    }

    #[test]
    fn test_staged_channels_load_back() {
        let dir    = TempDir::new().unwrap();
        let ctx    = context(&dir, "mnist");
        let report = StageUseCase::new(Box::new(SyntheticSource::new(100, 0.8, 42)))
            .execute(&ctx)
            .unwrap();

        assert_eq!(report.train_samples, 80);
        assert_eq!(report.validation_samples, 20);

        let root = dir.path().join("bucket").join("mnist");
        let (train, val) = load_splits(&root.join("train"), &root.join("validation")).unwrap();
        assert_eq!(train.len(), 80);
        assert_eq!(val.sample_shape(), &[28, 28]);
    }
}
