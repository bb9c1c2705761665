// ============================================================
// Layer 4 — NumPy .npy Arrays
// ============================================================
// Staged arrays are exchanged as .npy files so the same data
// can be produced or inspected with the usual Python tooling.
// Encoding and header parsing are done by ndarray-npy; this
// module adds the dtype dispatch and the conversions into
// f32 features and class labels.
//
// Supported dtypes:
//   |u1 → U8   i4 → I32   i8 → I64   f4 → F32   f8 → F64
//
// Element data is kept in logical row-major order whatever
// order the file was stored in.

use std::{fs, path::Path};

use ndarray::{ArrayD, IxDyn};
use ndarray_npy::{ReadNpyError, ReadNpyExt, ReadableElement, WriteNpyExt};

use crate::domain::error::DataError;
use crate::domain::split::NUM_CLASSES;

/// Element storage of an array, one variant per supported dtype.
#[derive(Debug, Clone, PartialEq)]
pub enum NpyData {
    U8(Vec<u8>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl NpyData {
    pub fn len(&self) -> usize {
        match self {
            NpyData::U8(v)  => v.len(),
            NpyData::I32(v) => v.len(),
            NpyData::I64(v) => v.len(),
            NpyData::F32(v) => v.len(),
            NpyData::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

/// An n-dimensional array in C (row-major) order.
#[derive(Debug, Clone, PartialEq)]
pub struct NpyArray {
    shape: Vec<usize>,
    data:  NpyData,
}

impl NpyArray {
    pub fn new(shape: Vec<usize>, data: NpyData) -> Result<Self, DataError> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(DataError::ShapeMismatch(format!(
                "array of shape {shape:?} needs {expected} elements, got {}",
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> &[usize] { &self.shape }

    // ─── Encoding ─────────────────────────────────────────────────────────────
    pub fn to_bytes(&self) -> Result<Vec<u8>, DataError> {
        let mut out = Vec::new();
        let written = match &self.data {
            NpyData::U8(v)  => self.ndarray(v)?.write_npy(&mut out),
            NpyData::I32(v) => self.ndarray(v)?.write_npy(&mut out),
            NpyData::I64(v) => self.ndarray(v)?.write_npy(&mut out),
            NpyData::F32(v) => self.ndarray(v)?.write_npy(&mut out),
            NpyData::F64(v) => self.ndarray(v)?.write_npy(&mut out),
        };
        written.map_err(|e| DataError::Npy { origin: "<memory>".to_string(), reason: e.to_string() })?;
        Ok(out)
    }

    fn ndarray<T: Clone>(&self, values: &[T]) -> Result<ArrayD<T>, DataError> {
        ArrayD::from_shape_vec(IxDyn(&self.shape), values.to_vec())
            .map_err(|e| DataError::ShapeMismatch(format!("array of shape {:?}: {e}", self.shape)))
    }

    pub fn write(&self, path: &Path) -> Result<(), DataError> {
        fs::write(path, self.to_bytes()?).map_err(|source| DataError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    // ─── Decoding ─────────────────────────────────────────────────────────────
    pub fn read(path: &Path) -> Result<Self, DataError> {
        if !path.is_file() {
            return Err(DataError::MissingFile(path.to_path_buf()));
        }
        let bytes = fs::read(path).map_err(|source| DataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&bytes, &path.display().to_string())
    }

    /// Decode with the first element type whose descriptor matches.
    pub fn from_bytes(bytes: &[u8], origin: &str) -> Result<Self, DataError> {
        decode_as::<u8, _>(bytes, NpyData::U8)
            .or_else(|| decode_as::<i32, _>(bytes, NpyData::I32))
            .or_else(|| decode_as::<i64, _>(bytes, NpyData::I64))
            .or_else(|| decode_as::<f32, _>(bytes, NpyData::F32))
            .or_else(|| decode_as::<f64, _>(bytes, NpyData::F64))
            .unwrap_or_else(|| Err("unsupported dtype (expected u1, i4, i8, f4 or f8)".to_string()))
            .map_err(|reason| DataError::Npy { origin: origin.to_string(), reason })
    }

    // ─── Conversions ──────────────────────────────────────────────────────────
    /// Feature values as f32. 8-bit pixel data is scaled into [0, 1];
    /// every other dtype is converted as-is.
    pub fn to_f32_features(&self) -> Vec<f32> {
        match &self.data {
            NpyData::U8(v)  => v.iter().map(|&x| f32::from(x) / 255.0).collect(),
            NpyData::I32(v) => v.iter().map(|&x| x as f32).collect(),
            NpyData::I64(v) => v.iter().map(|&x| x as f32).collect(),
            NpyData::F32(v) => v.clone(),
            NpyData::F64(v) => v.iter().map(|&x| x as f32).collect(),
        }
    }

    /// Class labels, each checked to lie in [0, NUM_CLASSES).
    pub fn to_labels(&self, origin: &str) -> Result<Vec<u8>, DataError> {
        let as_i64: Vec<i64> = match &self.data {
            NpyData::U8(v)  => v.iter().map(|&x| i64::from(x)).collect(),
            NpyData::I32(v) => v.iter().map(|&x| i64::from(x)).collect(),
            NpyData::I64(v) => v.clone(),
            NpyData::F32(v) => integral(v.iter().map(|&x| f64::from(x)), origin)?,
            NpyData::F64(v) => integral(v.iter().copied(), origin)?,
        };

        as_i64
            .into_iter()
            .enumerate()
            .map(|(index, label)| {
                if (0..NUM_CLASSES as i64).contains(&label) {
                    Ok(label as u8)
                } else {
                    Err(DataError::LabelOutOfRange { index, label, num_classes: NUM_CLASSES })
                }
            })
            .collect()
    }
}

/// `None` when the file holds a different dtype than `T`.
fn decode_as<T, F>(bytes: &[u8], wrap: F) -> Option<Result<NpyArray, String>>
where
    T: ReadableElement + Copy,
    F: FnOnce(Vec<T>) -> NpyData,
{
    match ArrayD::<T>::read_npy(bytes) {
        Err(ReadNpyError::WrongDescriptor(_)) => None,
        Err(e) => Some(Err(e.to_string())),
        Ok(array) => Some(Ok(NpyArray {
            shape: array.shape().to_vec(),
            data:  wrap(array.iter().copied().collect()),
        })),
    }
}

fn integral(values: impl Iterator<Item = f64>, origin: &str) -> Result<Vec<i64>, DataError> {
    values
        .map(|x| {
            if x.fract() == 0.0 && x.is_finite() {
                Ok(x as i64)
            } else {
                Err(DataError::Npy {
                    origin: origin.to_string(),
                    reason: format!("label {x} is not an integer"),
                })
            }
        })
        .collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_written_file_reads_back_with_dtype() {
        let arr   = NpyArray::new(vec![2, 3], NpyData::F32(vec![0.5; 6])).unwrap();
        let bytes = arr.to_bytes().unwrap();

        assert_eq!(&bytes[..6], b"\x93NUMPY");
        let back = NpyArray::from_bytes(&bytes, "mem").unwrap();
        assert_eq!(back, arr);
    }

    #[test]
    fn test_reads_numpy_written_header() {
        // Header exactly as numpy 1.x writes it for np.arange(3, dtype='<i8')
        let mut header = "{'descr': '<i8', 'fortran_order': False, 'shape': (3,), }".to_string();
        while (10 + header.len() + 1) % 64 != 0 {
            header.push(' ');
        }
        header.push('\n');

        let mut bytes = b"\x93NUMPY\x01\x00".to_vec();
        bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
        bytes.extend_from_slice(header.as_bytes());
        for v in 0i64..3 {
            bytes.extend_from_slice(&v.to_le_bytes());
        }

        let arr = NpyArray::from_bytes(&bytes, "mem").unwrap();
        assert_eq!(arr.shape(), &[3]);
        assert_eq!(arr.to_labels("mem").unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_truncated_body_is_an_error() {
        let arr       = NpyArray::new(vec![4], NpyData::U8(vec![1, 2, 3, 4])).unwrap();
        let mut bytes = arr.to_bytes().unwrap();
        bytes.pop();
        assert!(matches!(
            NpyArray::from_bytes(&bytes, "mem"),
            Err(DataError::Npy { .. })
        ));
    }

    #[test]
    fn test_bad_magic() {
        assert!(NpyArray::from_bytes(b"not an npy file", "mem").is_err());
    }

    #[test]
    fn test_u8_features_are_scaled() {
        let arr = NpyArray::new(vec![1, 2], NpyData::U8(vec![0, 255])).unwrap();
        assert_eq!(arr.to_f32_features(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_labels_out_of_range() {
        let arr = NpyArray::new(vec![2], NpyData::I64(vec![3, 11])).unwrap();
        assert!(matches!(
            arr.to_labels("mem"),
            Err(DataError::LabelOutOfRange { index: 1, label: 11, .. })
        ));
    }

    #[test]
    fn test_float_labels_must_be_integral() {
        let arr = NpyArray::new(vec![2], NpyData::F64(vec![1.0, 2.5])).unwrap();
        assert!(matches!(arr.to_labels("mem"), Err(DataError::Npy { .. })));
    }

    #[test]
    fn test_shape_element_count_checked() {
        assert!(NpyArray::new(vec![2, 2], NpyData::U8(vec![0; 3])).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = NpyArray::read(Path::new("/definitely/not/here.npy")).unwrap_err();
        assert!(matches!(err, DataError::MissingFile(_)));
    }
}
