// ============================================================
// Layer 4 — Digit Batcher
// ============================================================
// Implements Burn's Batcher trait to stack a Vec<DigitItem>
// into the tensors the CNN consumes.
//
//   Input:  N items, each 784 pixel values + one label
//   Output: images  [N, 1, 28, 28]  (channel dimension added)
//           targets [N]             (Int)
//
// Items are flattened into one long Vec and reshaped, the same
// way for any stored sample shape ([28, 28] or [784]).
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::DigitItem;
use crate::domain::split::IMAGE_SIDE;

// ─── DigitBatch ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct DigitBatch<B: Backend> {
    /// Pixel intensities in [0, 1], shape [batch_size, 1, 28, 28]
    pub images: Tensor<B, 4>,

    /// Class indices, shape [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

// ─── DigitBatcher ─────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct DigitBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> DigitBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<DigitItem, DigitBatch<B>> for DigitBatcher<B> {
    fn batch(&self, items: Vec<DigitItem>) -> DigitBatch<B> {
        let batch_size = items.len();

        let pixels: Vec<f32> = items
            .iter()
            .flat_map(|item| item.pixels.iter().copied())
            .collect();

        let labels: Vec<i64> = items
            .iter()
            .map(|item| i64::from(item.label))
            .collect();

        let images = Tensor::<B, 4>::from_data(
            TensorData::new(pixels, [batch_size, 1, IMAGE_SIDE, IMAGE_SIDE])
                .convert::<B::FloatElem>(),
            &self.device,
        );

        let targets = Tensor::<B, 1, Int>::from_data(
            TensorData::new(labels, [batch_size]).convert::<B::IntElem>(),
            &self.device,
        );

        DigitBatch { images, targets }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_batch_shapes() {
        let batcher = DigitBatcher::<NdArray>::new(Default::default());
        let items   = (0..3)
            .map(|i| DigitItem { pixels: vec![0.5; IMAGE_SIDE * IMAGE_SIDE], label: i })
            .collect();

        let batch = batcher.batch(items);
        assert_eq!(batch.images.dims(), [3, 1, 28, 28]);
        assert_eq!(batch.targets.dims(), [3]);
    }
}
