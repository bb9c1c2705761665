// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The stager and trainers program against these traits rather
// than against concrete implementations:
//
//   DatasetSource — anything that can produce the raw labelled
//                   images (HTTP mirror, local IDX files,
//                   deterministic synthetic digits)
//   ObjectStore   — durable storage the staged arrays are
//                   published to (a mounted / local filesystem
//                   today; a bucket client would be another impl)
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use crate::domain::error::DataError;
use crate::domain::split::RawDataset;

// ─── DatasetSource ────────────────────────────────────────────────────────────
/// Any component that can fetch a labelled image dataset.
pub trait DatasetSource {
    /// Short human readable description for logs.
    fn describe(&self) -> String;

    /// Fetch both splits. Any failure aborts the whole stage.
    fn fetch(&self) -> Result<RawDataset, DataError>;
}

// ─── ObjectStore ──────────────────────────────────────────────────────────────
/// Durable key/value storage for staged files.
///
/// Keys are `/`-separated, e.g. `mnist/train/train_data.npy`.
/// A `put` to an existing key overwrites it.
pub trait ObjectStore {
    /// Store `bytes` under `key`.
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), DataError>;

    /// Fully qualified location of `key`, for logs and channel wiring.
    fn uri(&self, key: &str) -> String;
}
