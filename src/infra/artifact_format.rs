// ============================================================
// Layer 6 — Artifact Format Adapters
// ============================================================
// The tree ensemble has one canonical serialised form: pretty
// JSON in model.json. Any other form a downstream loader wants
// is derived from those canonical bytes by an adapter:
//
//   canonical JSON ──encode──▶ adapter file
//   adapter file   ──decode──▶ canonical JSON
//
// A new format is one more ArtifactFormat impl.
//
// Shipped adapter:
//   gzip → model.json.gz
//
// Reference: flate2 crate documentation

use std::io::{Read, Write};

use clap::ValueEnum;
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use serde::{Deserialize, Serialize};

/// File name of the canonical tree artifact.
pub const CANONICAL_TREE_FILE: &str = "model.json";

/// Turns canonical artifact bytes into another on-disk form and back.
pub trait ArtifactFormat {
    fn name(&self) -> &'static str;

    /// File the adapted artifact is stored under.
    fn file_name(&self) -> &'static str;

    fn encode(&self, canonical: &[u8]) -> std::io::Result<Vec<u8>>;

    fn decode(&self, stored: &[u8]) -> std::io::Result<Vec<u8>>;
}

// ─── Gzip ─────────────────────────────────────────────────────────────────────
pub struct GzipJsonFormat;

impl ArtifactFormat for GzipJsonFormat {
    fn name(&self) -> &'static str { "gzip" }

    fn file_name(&self) -> &'static str { "model.json.gz" }

    fn encode(&self, canonical: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(canonical)?;
        enc.finish()
    }

    fn decode(&self, stored: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut out = Vec::new();
        GzDecoder::new(stored).read_to_end(&mut out)?;
        Ok(out)
    }
}

// ─── ExportFormat ─────────────────────────────────────────────────────────────
/// Extra artifact forms selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ExportFormat {
    Gzip,
}

impl ExportFormat {
    pub fn adapter(self) -> Box<dyn ArtifactFormat> {
        match self {
            ExportFormat::Gzip => Box::new(GzipJsonFormat),
        }
    }

    /// Every adapter, in the order the loader falls back through them.
    pub fn all() -> Vec<ExportFormat> {
        vec![ExportFormat::Gzip]
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gzip_restores_canonical_bytes() {
        let canonical = br#"{"num_class":10,"trees":[]}"#;
        let fmt       = GzipJsonFormat;
        let stored    = fmt.encode(canonical).unwrap();
        assert_ne!(stored.as_slice(), canonical.as_slice());
        assert_eq!(fmt.decode(&stored).unwrap(), canonical.to_vec());
    }

    #[test]
    fn test_adapter_files_never_clash_with_canonical() {
        for f in ExportFormat::all() {
            assert_ne!(f.adapter().file_name(), CANONICAL_TREE_FILE);
        }
    }
}
