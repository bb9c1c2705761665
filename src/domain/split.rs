// ============================================================
// Layer 3 — Dataset Split
// ============================================================
// A split is one named partition of the dataset: N samples,
// each a fixed-size numeric vector (a flattened 2-D image),
// with one integer label per sample in [0, NUM_CLASSES).
//
// Invariants enforced by Split::new:
//   - features.len() == labels.len() * sample_shape.product()
//   - every label < NUM_CLASSES
//   - sample_shape is non-empty and has no zero dimension
//
// The staged file names keep the source dataset's convention:
// the validation split is persisted under the "test" stem.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::error::DataError;

/// Number of digit classes every model predicts over.
pub const NUM_CLASSES: usize = 10;

/// Side length of a digit image.
pub const IMAGE_SIDE: usize = 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitName {
    Train,
    Validation,
}

impl SplitName {
    /// Storage prefix the split is published under.
    pub fn prefix(self) -> &'static str {
        match self {
            SplitName::Train      => "train",
            SplitName::Validation => "validation",
        }
    }

    /// File stem of the split's arrays: `<stem>_data.npy`, `<stem>_labels.npy`.
    pub fn file_stem(self) -> &'static str {
        match self {
            SplitName::Train      => "train",
            SplitName::Validation => "test",
        }
    }

    pub fn features_file(self) -> String {
        format!("{}_data.npy", self.file_stem())
    }

    pub fn labels_file(self) -> String {
        format!("{}_labels.npy", self.file_stem())
    }
}

impl fmt::Display for SplitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// One fully loaded partition, features already scaled to f32.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    name:         SplitName,
    sample_shape: Vec<usize>,
    features:     Vec<f32>,
    labels:       Vec<u8>,
}

impl Split {
    pub fn new(
        name:         SplitName,
        sample_shape: Vec<usize>,
        features:     Vec<f32>,
        labels:       Vec<u8>,
    ) -> Result<Self, DataError> {
        if sample_shape.is_empty() || sample_shape.contains(&0) {
            return Err(DataError::ShapeMismatch(format!(
                "{name} split has an invalid sample shape {sample_shape:?}"
            )));
        }

        let feature_len: usize = sample_shape.iter().product();
        if features.len() != labels.len() * feature_len {
            return Err(DataError::ShapeMismatch(format!(
                "{name} split has {} labels but {} feature values (expected {} per sample)",
                labels.len(),
                features.len(),
                feature_len,
            )));
        }
        check_labels(&labels)?;
        if let Some(index) = features.iter().position(|x| !x.is_finite()) {
            return Err(DataError::NonFiniteFeature { split: name, index });
        }

        Ok(Self { name, sample_shape, features, labels })
    }

    pub fn name(&self) -> SplitName { self.name }

    pub fn len(&self) -> usize { self.labels.len() }

    pub fn is_empty(&self) -> bool { self.labels.is_empty() }

    pub fn sample_shape(&self) -> &[usize] { &self.sample_shape }

    /// Length of one flattened sample.
    pub fn feature_len(&self) -> usize { self.sample_shape.iter().product() }

    pub fn features(&self) -> &[f32] { &self.features }

    pub fn labels(&self) -> &[u8] { &self.labels }

    /// The flattened feature vector of sample `index`.
    pub fn sample(&self, index: usize) -> &[f32] {
        let n = self.feature_len();
        &self.features[index * n..(index + 1) * n]
    }

    /// Fail unless `other` carries samples of the same length.
    pub fn ensure_compatible(&self, other: &Split) -> Result<(), DataError> {
        if self.feature_len() != other.feature_len() {
            return Err(DataError::ShapeMismatch(format!(
                "{} samples have {} features but {} samples have {}",
                self.name,
                self.feature_len(),
                other.name,
                other.feature_len(),
            )));
        }
        Ok(())
    }

    pub fn ensure_non_empty(&self) -> Result<(), DataError> {
        if self.is_empty() {
            return Err(DataError::EmptySplit(self.name));
        }
        Ok(())
    }
}

/// A split as it comes out of a dataset source, before staging:
/// 8-bit grey-scale images of shape `[N, rows, cols]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSplit {
    pub name:       SplitName,
    pub image_dims: [usize; 2],
    pub pixels:     Vec<u8>,
    pub labels:     Vec<u8>,
}

impl RawSplit {
    pub fn new(
        name:       SplitName,
        image_dims: [usize; 2],
        pixels:     Vec<u8>,
        labels:     Vec<u8>,
    ) -> Result<Self, DataError> {
        let per_image = image_dims[0] * image_dims[1];
        if per_image == 0 || pixels.len() != labels.len() * per_image {
            return Err(DataError::ShapeMismatch(format!(
                "{name} source split has {} labels but {} pixels for {}x{} images",
                labels.len(),
                pixels.len(),
                image_dims[0],
                image_dims[1],
            )));
        }
        check_labels(&labels)?;
        Ok(Self { name, image_dims, pixels, labels })
    }

    pub fn image_count(&self) -> usize { self.labels.len() }

    /// Scale pixels into [0, 1] and keep the 2-D sample shape.
    #[cfg(test)]
    pub fn to_split(&self) -> Result<Split, DataError> {
        let features = self.pixels.iter().map(|&p| f32::from(p) / 255.0).collect();
        Split::new(self.name, self.image_dims.to_vec(), features, self.labels.clone())
    }
}

/// Both splits of a fetched dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDataset {
    pub train:      RawSplit,
    pub validation: RawSplit,
}

fn check_labels(labels: &[u8]) -> Result<(), DataError> {
    match labels.iter().position(|&l| l as usize >= NUM_CLASSES) {
        Some(index) => Err(DataError::LabelOutOfRange {
            index,
            label: i64::from(labels[index]),
            num_classes: NUM_CLASSES,
        }),
        None => Ok(()),
    }
}

/// Fraction of `predictions` equal to `labels`, 0.0 for an empty set.
pub fn accuracy(predictions: &[u8], labels: &[u8]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let correct = predictions
        .iter()
        .zip(labels)
        .filter(|(p, l)| p == l)
        .count();
    correct as f64 / labels.len() as f64
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_split() {
        let split = Split::new(
            SplitName::Train,
            vec![2, 2],
            vec![0.0; 8],
            vec![1, 9],
        ).unwrap();
        assert_eq!(split.len(), 2);
        assert_eq!(split.feature_len(), 4);
        assert_eq!(split.sample(1).len(), 4);
    }

    #[test]
    fn test_count_mismatch_is_rejected() {
        let err = Split::new(SplitName::Train, vec![2, 2], vec![0.0; 7], vec![1, 2])
            .unwrap_err();
        assert!(matches!(err, DataError::ShapeMismatch(_)));
    }

    #[test]
    fn test_label_out_of_range_is_rejected() {
        let err = Split::new(SplitName::Validation, vec![1], vec![0.0; 3], vec![0, 10, 1])
            .unwrap_err();
        assert!(matches!(err, DataError::LabelOutOfRange { index: 1, label: 10, .. }));
    }

    #[test]
    fn test_nan_feature_is_rejected() {
        let err = Split::new(SplitName::Train, vec![2], vec![0.5, 0.1, f32::NAN, 0.0], vec![3, 4])
            .unwrap_err();
        assert!(matches!(err, DataError::NonFiniteFeature { split: SplitName::Train, index: 2 }));
    }

    #[test]
    fn test_incompatible_splits() {
        let a = Split::new(SplitName::Train, vec![4], vec![0.0; 4], vec![0]).unwrap();
        let b = Split::new(SplitName::Validation, vec![3], vec![0.0; 3], vec![0]).unwrap();
        assert!(a.ensure_compatible(&b).is_err());
        assert!(a.ensure_compatible(&a).is_ok());
    }

    #[test]
    fn test_validation_split_uses_test_stem() {
        assert_eq!(SplitName::Validation.features_file(), "test_data.npy");
        assert_eq!(SplitName::Train.labels_file(), "train_labels.npy");
        assert_eq!(SplitName::Validation.prefix(), "validation");
    }

    #[test]
    fn test_accuracy() {
        assert_eq!(accuracy(&[1, 2, 3, 4], &[1, 2, 0, 0]), 0.5);
        assert_eq!(accuracy(&[], &[]), 0.0);
    }
}
