// ============================================================
// Layer 4 — IDX Parser
// ============================================================
// The raw MNIST distribution ships as four IDX files, usually
// gzip-compressed:
//
//   train-images-idx3-ubyte   [60000, 28, 28]  u8 pixels
//   train-labels-idx1-ubyte   [60000]          u8 labels
//   t10k-images-idx3-ubyte    [10000, 28, 28]
//   t10k-labels-idx1-ubyte    [10000]
//
// IDX layout:
//   bytes 0-1  zero
//   byte  2    element type (0x08 = unsigned byte)
//   byte  3    number of dimensions
//   then one big-endian u32 per dimension, then the data.
//
// Reference: flate2 crate documentation

use std::io::Read;

use flate2::read::GzDecoder;

use crate::domain::error::DataError;

const TYPE_UBYTE: u8 = 0x08;
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// A decoded IDX tensor of unsigned bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct IdxArray {
    pub dims: Vec<usize>,
    pub data: Vec<u8>,
}

/// Gunzip `bytes` if they carry the gzip magic, otherwise pass them through.
pub fn maybe_gunzip(bytes: Vec<u8>, origin: &str) -> Result<Vec<u8>, DataError> {
    if bytes.len() < 2 || bytes[..2] != GZIP_MAGIC {
        return Ok(bytes);
    }
    let mut out = Vec::new();
    GzDecoder::new(bytes.as_slice())
        .read_to_end(&mut out)
        .map_err(|e| DataError::Idx {
            origin: origin.to_string(),
            reason: format!("gzip stream is corrupt: {e}"),
        })?;
    Ok(out)
}

pub fn parse_idx(bytes: &[u8], origin: &str) -> Result<IdxArray, DataError> {
    let err = |reason: String| DataError::Idx { origin: origin.to_string(), reason };

    if bytes.len() < 4 || bytes[0] != 0 || bytes[1] != 0 {
        return Err(err("missing IDX magic".to_string()));
    }
    if bytes[2] != TYPE_UBYTE {
        return Err(err(format!("unsupported element type 0x{:02x}", bytes[2])));
    }

    let ndims      = bytes[3] as usize;
    let data_start = 4 + 4 * ndims;
    if ndims == 0 || bytes.len() < data_start {
        return Err(err("truncated dimension table".to_string()));
    }

    let dims: Vec<usize> = bytes[4..data_start]
        .chunks_exact(4)
        .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]) as usize)
        .collect();

    let expected = dims
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| err(format!("dimensions {dims:?} overflow the address space")))?;
    let data = &bytes[data_start..];
    if data.len() != expected {
        return Err(err(format!(
            "dimensions {dims:?} need {expected} bytes, found {}",
            data.len()
        )));
    }

    Ok(IdxArray { dims, data: data.to_vec() })
}
