//! Word-vector lookup.
//!
//! The embedding store itself lives outside this crate. A [`VectorSpace`] is
//! anything that can turn a word into its vector; [`JsonVectorSpace`] reads a
//! flat JSON object of `word -> [f32]` pairs exported from such a store.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Errors from word-vector lookup.
#[derive(Debug, thiserror::Error)]
pub enum VectorError {
    #[error("Vector not found for word '{0}'")]
    NotFound(String),
    #[error("Failed to read vector file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse vector file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Vector for '{word}' has {found} dimensions, expected {expected}")]
    DimensionMismatch {
        word: String,
        expected: usize,
        found: usize,
    },
}

/// Source of word embeddings.
pub trait VectorSpace {
    /// Vector for `word`, or [`VectorError::NotFound`].
    fn vector(&self, word: &str) -> Result<Vec<f32>, VectorError>;
}

/// In-memory vector space loaded from JSON.
#[derive(Debug, Clone, Default)]
pub struct JsonVectorSpace {
    vectors: HashMap<String, Vec<f32>>,
}

impl JsonVectorSpace {
    /// Load from a JSON object mapping words to vectors.
    ///
    /// All vectors must share one dimensionality.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, VectorError> {
        let json = fs::read_to_string(path)?;
        let vectors: HashMap<String, Vec<f32>> = serde_json::from_str(&json)?;

        let mut expected = None;
        for (word, vector) in &vectors {
            match expected {
                None => expected = Some(vector.len()),
                Some(n) if n != vector.len() => {
                    return Err(VectorError::DimensionMismatch {
                        word: word.clone(),
                        expected: n,
                        found: vector.len(),
                    });
                }
                Some(_) => {}
            }
        }

        log::debug!(
            "Loaded {} word vectors ({} dimensions)",
            vectors.len(),
            expected.unwrap_or(0)
        );
        Ok(Self { vectors })
    }

    /// Build from word/vector pairs.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<f32>)>,
    {
        Self {
            vectors: pairs.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

impl VectorSpace for JsonVectorSpace {
    fn vector(&self, word: &str) -> Result<Vec<f32>, VectorError> {
        self.vectors
            .get(word)
            .cloned()
            .ok_or_else(|| VectorError::NotFound(word.to_string()))
    }
}

/// Cosine similarity of two vectors. Zero-length vectors compare as 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a < 1e-12 || norm_b < 1e-12 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_and_lookup() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vectors.json");
        fs::write(&path, r#"{"stop": [1.0, 0.0], "halt": [0.9, 0.1]}"#).unwrap();

        let space = JsonVectorSpace::load(&path).unwrap();
        assert_eq!(space.len(), 2);
        assert_eq!(space.vector("stop").unwrap(), vec![1.0, 0.0]);
        assert!(matches!(
            space.vector("go"),
            Err(VectorError::NotFound(w)) if w == "go"
        ));
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vectors.json");
        fs::write(&path, r#"{"a": [1.0, 0.0], "b": [1.0]}"#).unwrap();

        let err = JsonVectorSpace::load(&path).unwrap_err();
        assert!(matches!(err, VectorError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 3.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 1.0], &[-1.0, -1.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }
}
