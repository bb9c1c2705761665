// ============================================================
// Layer 4 — Dataset Sources
// ============================================================
// Three implementations of the DatasetSource trait:
//
//   IdxDirSource     — reads the four MNIST IDX files from a
//                      local directory (plain or .gz)
//   HttpMirrorSource — downloads the .gz IDX files from a
//                      mirror into a cache directory, then
//                      reads them with IdxDirSource
//   SyntheticSource  — deterministic generated digits with
//                      balanced classes, for smoke tests and
//                      offline runs
//
// All three yield a RawDataset: u8 images [N, 28, 28] plus u8
// labels, train and validation.
//
// Reference: reqwest blocking client documentation

use std::{
    fs,
    path::{Path, PathBuf},
};

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::data::idx::{maybe_gunzip, parse_idx, IdxArray};
use crate::data::splitter::stratified_split;
use crate::domain::error::DataError;
use crate::domain::split::{RawDataset, RawSplit, SplitName, IMAGE_SIDE, NUM_CLASSES};
use crate::domain::traits::DatasetSource;

/// Default public mirror of the MNIST IDX files.
pub const DEFAULT_MIRROR: &str = "https://ossci-datasets.s3.amazonaws.com/mnist/";

/// (images, labels) file names per split, without the .gz suffix.
const MNIST_FILES: [(SplitName, &str, &str); 2] = [
    (SplitName::Train,      "train-images-idx3-ubyte", "train-labels-idx1-ubyte"),
    (SplitName::Validation, "t10k-images-idx3-ubyte",  "t10k-labels-idx1-ubyte"),
];

// ─── IdxDirSource ─────────────────────────────────────────────────────────────
pub struct IdxDirSource {
    dir: PathBuf,
}

impl IdxDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Find `<name>` or `<name>.gz` in the directory.
    fn locate(&self, name: &str) -> Result<PathBuf, DataError> {
        let plain = self.dir.join(name);
        if plain.is_file() {
            return Ok(plain);
        }
        let gz = self.dir.join(format!("{name}.gz"));
        if gz.is_file() {
            return Ok(gz);
        }
        Err(DataError::MissingFile(plain))
    }

    fn read_idx(&self, name: &str) -> Result<IdxArray, DataError> {
        let path   = self.locate(name)?;
        let origin = path.display().to_string();
        let bytes  = fs::read(&path).map_err(|source| DataError::Io { path: path.clone(), source })?;
        parse_idx(&maybe_gunzip(bytes, &origin)?, &origin)
    }
}

impl DatasetSource for IdxDirSource {
    fn describe(&self) -> String {
        format!("IDX files in '{}'", self.dir.display())
    }

    fn fetch(&self) -> Result<RawDataset, DataError> {
        let mut splits = Vec::with_capacity(2);
        for (name, images_file, labels_file) in MNIST_FILES {
            let images = self.read_idx(images_file)?;
            let labels = self.read_idx(labels_file)?;
            splits.push(raw_split_from_idx(name, images, labels)?);
        }
        let validation = splits.pop().ok_or(DataError::EmptySplit(SplitName::Validation))?;
        let train      = splits.pop().ok_or(DataError::EmptySplit(SplitName::Train))?;
        Ok(RawDataset { train, validation })
    }
}

fn raw_split_from_idx(
    name:   SplitName,
    images: IdxArray,
    labels: IdxArray,
) -> Result<RawSplit, DataError> {
    if images.dims.len() != 3 || labels.dims.len() != 1 || images.dims[0] != labels.dims[0] {
        return Err(DataError::ShapeMismatch(format!(
            "{name} images {:?} do not pair with labels {:?}",
            images.dims, labels.dims
        )));
    }
    RawSplit::new(name, [images.dims[1], images.dims[2]], images.data, labels.data)
}

// ─── HttpMirrorSource ─────────────────────────────────────────────────────────
pub struct HttpMirrorSource {
    base_url:  String,
    cache_dir: PathBuf,
}

impl HttpMirrorSource {
    pub fn new(base_url: impl Into<String>, cache_dir: impl Into<PathBuf>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self { base_url, cache_dir: cache_dir.into() }
    }

    fn download(&self, file: &str) -> Result<(), DataError> {
        let target = self.cache_dir.join(file);
        if target.is_file() {
            tracing::info!("Using cached '{}'", target.display());
            return Ok(());
        }

        let url = format!("{}{}", self.base_url, file);
        tracing::info!("Downloading {url}");
        let fetch_err = |reason: String| DataError::Fetch { url: url.clone(), reason };

        let bytes = reqwest::blocking::get(&url)
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.bytes())
            .map_err(|e| fetch_err(e.to_string()))?;

        // Write under a temporary name so an interrupted download is never cached
        let partial = self.cache_dir.join(format!("{file}.partial"));
        write_file(&partial, &bytes)?;
        fs::rename(&partial, &target).map_err(|source| DataError::Io { path: target, source })?;
        Ok(())
    }
}

impl DatasetSource for HttpMirrorSource {
    fn describe(&self) -> String {
        format!("MNIST mirror {}", self.base_url)
    }

    fn fetch(&self) -> Result<RawDataset, DataError> {
        fs::create_dir_all(&self.cache_dir).map_err(|source| DataError::Io {
            path: self.cache_dir.clone(),
            source,
        })?;
        for (_, images_file, labels_file) in MNIST_FILES {
            self.download(&format!("{images_file}.gz"))?;
            self.download(&format!("{labels_file}.gz"))?;
        }
        IdxDirSource::new(&self.cache_dir).fetch()
    }
}

// ─── SyntheticSource ──────────────────────────────────────────────────────────
/// Generates `samples` 28x28 digit-like images with labels `i % 10`.
///
/// Each class lights a horizontal band and a vertical bar at
/// class-specific offsets on a noisy background, so the classes
/// are separable but not trivially identical.
pub struct SyntheticSource {
    samples:        usize,
    train_fraction: f64,
    seed:           u64,
}

impl SyntheticSource {
    pub fn new(samples: usize, train_fraction: f64, seed: u64) -> Self {
        Self { samples, train_fraction, seed }
    }

    fn render(class: usize, rng: &mut StdRng) -> Vec<u8> {
        let side     = IMAGE_SIDE;
        let band_top = 2 + 2 * class;
        let bar_left = 4 + 2 * class;
        let mut img  = vec![0u8; side * side];

        for row in 0..side {
            for col in 0..side {
                let in_band = (band_top..band_top + 4).contains(&row) && (4..24).contains(&col);
                let in_bar  = (bar_left..bar_left + 2).contains(&col) && (4..24).contains(&row);
                img[row * side + col] = if in_band || in_bar {
                    rng.gen_range(180..=255)
                } else {
                    rng.gen_range(0..40)
                };
            }
        }
        img
    }
}

impl DatasetSource for SyntheticSource {
    fn describe(&self) -> String {
        format!("{} synthetic digits (seed {})", self.samples, self.seed)
    }

    fn fetch(&self) -> Result<RawDataset, DataError> {
        let mut rng = StdRng::seed_from_u64(self.seed);

        let items: Vec<(Vec<u8>, u8)> = (0..self.samples)
            .map(|i| {
                let class = i % NUM_CLASSES;
                (Self::render(class, &mut rng), class as u8)
            })
            .collect();

        let (train, validation) = stratified_split(items, |item| item.1, self.train_fraction, &mut rng);
        if train.is_empty() {
            return Err(DataError::EmptySplit(SplitName::Train));
        }
        if validation.is_empty() {
            return Err(DataError::EmptySplit(SplitName::Validation));
        }

        Ok(RawDataset {
            train:      into_raw_split(SplitName::Train, train)?,
            validation: into_raw_split(SplitName::Validation, validation)?,
        })
    }
}

fn into_raw_split(name: SplitName, items: Vec<(Vec<u8>, u8)>) -> Result<RawSplit, DataError> {
    let mut pixels = Vec::with_capacity(items.len() * IMAGE_SIDE * IMAGE_SIDE);
    let mut labels = Vec::with_capacity(items.len());
    for (img, label) in items {
        pixels.extend_from_slice(&img);
        labels.push(label);
    }
    RawSplit::new(name, [IMAGE_SIDE, IMAGE_SIDE], pixels, labels)
}

pub(crate) fn write_file(path: &Path, bytes: &[u8]) -> Result<(), DataError> {
    fs::write(path, bytes).map_err(|source| DataError::Io { path: path.to_path_buf(), source })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_synthetic_is_deterministic_and_balanced() {
        let a = SyntheticSource::new(100, 0.8, 7).fetch().unwrap();
        let b = SyntheticSource::new(100, 0.8, 7).fetch().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.train.image_count(), 80);
        assert_eq!(a.validation.image_count(), 20);

        let mut counts = [0usize; NUM_CLASSES];
        for &l in a.train.labels.iter().chain(&a.validation.labels) {
            counts[l as usize] += 1;
        }
        assert!(counts.iter().all(|&c| c == 10));
    }

    #[test]
    fn test_synthetic_rejects_empty_validation() {
        let err = SyntheticSource::new(3, 1.0, 1).fetch().unwrap_err();
        assert!(matches!(err, DataError::EmptySplit(SplitName::Validation)));
    }

    #[test]
    fn test_idx_dir_reads_all_four_files() {
        let dir = TempDir::new().unwrap();
        let write_idx = |name: &str, dims: &[u32], data: &[u8]| {
            let mut out = vec![0, 0, 0x08, dims.len() as u8];
            for d in dims {
                out.extend_from_slice(&d.to_be_bytes());
            }
            out.extend_from_slice(data);
            fs::write(dir.path().join(name), out).unwrap();
        };
        write_idx("train-images-idx3-ubyte", &[2, 2, 2], &[0; 8]);
        write_idx("train-labels-idx1-ubyte", &[2], &[3, 4]);
        write_idx("t10k-images-idx3-ubyte", &[1, 2, 2], &[9; 4]);
        write_idx("t10k-labels-idx1-ubyte", &[1], &[5]);

        let ds = IdxDirSource::new(dir.path()).fetch().unwrap();
        assert_eq!(ds.train.labels, vec![3, 4]);
        assert_eq!(ds.validation.image_dims, [2, 2]);
    }

    #[test]
    fn test_idx_dir_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = IdxDirSource::new(dir.path()).fetch().unwrap_err();
        assert!(matches!(err, DataError::MissingFile(_)));
    }
}
