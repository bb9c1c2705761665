// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between a raw dataset and tensor batches.
//
// Staging side (run once, before any training job):
//
//   DatasetSource     → IDX files / HTTP mirror / synthetic digits
//       │
//       ▼
//   NpyArray          → four .npy arrays written per split
//
// Training side (inside each training job):
//
//   ChannelLoader     → reads the .npy pair of one channel
//       │
//       ▼
//   DigitDataset      → implements Burn's Dataset trait
//       │
//       ▼
//   DigitBatcher      → stacks items into [N, 1, 28, 28] tensors
//       │
//       ▼
//   DataLoader        → feeds batches to the CNN training loop
//
// The tree trainer stops after ChannelLoader and uses the flat
// feature vectors directly.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// NumPy .npy array reader/writer
pub mod npy;

/// MNIST IDX file parser (optionally gzip'd)
pub mod idx;

/// Dataset sources used by the stager
pub mod source;

/// Reads a staged split from an input channel directory
pub mod loader;

/// Implements Burn's Dataset trait for digit images
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Stratified train/validation split for sources without one
pub mod splitter;
