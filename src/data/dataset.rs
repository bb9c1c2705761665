use burn::data::dataset::Dataset;

use crate::domain::split::Split;

/// One labelled image, pixels flattened row-major and scaled to [0, 1].
#[derive(Debug, Clone)]
pub struct DigitItem {
    pub pixels: Vec<f32>,
    pub label:  u8,
}

/// Burn dataset view over a loaded split.
pub struct DigitDataset {
    items: Vec<DigitItem>,
}

impl DigitDataset {
    pub fn from_split(split: &Split) -> Self {
        let items = (0..split.len())
            .map(|i| DigitItem {
                pixels: split.sample(i).to_vec(),
                label:  split.labels()[i],
            })
            .collect();
        Self { items }
    }
}

impl Dataset<DigitItem> for DigitDataset {
    fn get(&self, index: usize) -> Option<DigitItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}
