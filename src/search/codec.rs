//! Vector ⇄ BLOB conversion.
//!
//! Vectors are stored as little-endian `f32` values, `dimension * 4` bytes.
//! Only the repository talks to this module.

use crate::core::error::{Result, SearchError};
use crate::core::schema::Violation;

const ELEMENT_SIZE: usize = std::mem::size_of::<f32>();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorCodec {
    dimension: usize,
}

impl VectorCodec {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    pub fn byte_len(&self) -> usize {
        self.dimension * ELEMENT_SIZE
    }

    pub fn encode(&self, vector: &[f32]) -> Result<Vec<u8>> {
        if vector.len() != self.dimension {
            return Err(SearchError::MalformedVector(format!(
                "cannot encode {} components (dimension is {})",
                vector.len(),
                self.dimension
            )));
        }

        let mut blob = Vec::with_capacity(self.byte_len());
        for &val in vector {
            blob.extend_from_slice(&val.to_le_bytes());
        }
        Ok(blob)
    }

    pub fn decode(&self, blob: &[u8]) -> Result<Vec<f32>> {
        if blob.len() != self.byte_len() {
            return Err(SearchError::MalformedVector(format!(
                "blob is {} bytes, expected {}",
                blob.len(),
                self.byte_len()
            )));
        }

        Ok(blob
            .chunks_exact(ELEMENT_SIZE)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect())
    }

    /// Diagnose a stored blob without failing: wrong length, length that
    /// fits another dimension, or non-finite components.
    pub fn inspect(&self, blob: &[u8]) -> Option<Violation> {
        if blob.len() != self.byte_len() {
            if !blob.is_empty() && blob.len() % ELEMENT_SIZE == 0 {
                return Some(Violation::WrongDimension {
                    expected: self.dimension,
                    actual: blob.len() / ELEMENT_SIZE,
                });
            }
            return Some(Violation::MalformedVector);
        }

        blob.chunks_exact(ELEMENT_SIZE)
            .position(|chunk| !f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]).is_finite())
            .map(|index| Violation::NonFiniteComponent { index })
    }
}
