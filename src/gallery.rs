use std::path::Path;

use anyhow::Context;
use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};

/// Persisted form of one gallery entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryRecord {
    pub id: String,
    pub label: i64,
    pub embedding: Vec<f32>,
}

impl GalleryRecord {
    pub fn new(label: i64, embedding: Vec<f32>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            label,
            embedding,
        }
    }
}

/// Immutable set of labeled reference embeddings, one row per entry.
#[derive(Debug, Clone)]
pub struct Gallery {
    embeddings: Array2<f32>,
    labels: Vec<i64>,
}

impl Gallery {
    pub fn new(embeddings: Array2<f32>, labels: Vec<i64>) -> Result<Self> {
        if embeddings.nrows() != labels.len() {
            return Err(EvalError::LengthMismatch {
                what: "gallery embeddings and labels",
                left: embeddings.nrows(),
                right: labels.len(),
            });
        }
        Ok(Self { embeddings, labels })
    }

    pub fn empty() -> Self {
        Self {
            embeddings: Array2::zeros((0, 0)),
            labels: Vec::new(),
        }
    }

    /// Build from parallel embedding/label sequences.
    ///
    /// Every embedding must have the dimensionality of the first one.
    pub fn from_vectors(embeddings: &[Vec<f32>], labels: &[i64]) -> Result<Self> {
        if embeddings.len() != labels.len() {
            return Err(EvalError::LengthMismatch {
                what: "gallery embeddings and labels",
                left: embeddings.len(),
                right: labels.len(),
            });
        }
        let Some(first) = embeddings.first() else {
            return Ok(Self::empty());
        };

        let dim = first.len();
        let mut flat = Vec::with_capacity(embeddings.len() * dim);
        for e in embeddings {
            if e.len() != dim {
                return Err(EvalError::ShapeMismatch {
                    expected: dim,
                    actual: e.len(),
                });
            }
            flat.extend_from_slice(e);
        }

        let matrix = Array2::from_shape_vec((embeddings.len(), dim), flat).map_err(|_| {
            EvalError::ShapeMismatch {
                expected: dim,
                actual: 0,
            }
        })?;
        Self::new(matrix, labels.to_vec())
    }

    pub fn from_records(records: &[GalleryRecord]) -> Result<Self> {
        let embeddings: Vec<Vec<f32>> = records.iter().map(|r| r.embedding.clone()).collect();
        let labels: Vec<i64> = records.iter().map(|r| r.label).collect();
        Self::from_vectors(&embeddings, &labels)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Embedding dimensionality, `None` while the gallery is empty.
    pub fn dim(&self) -> Option<usize> {
        if self.is_empty() {
            None
        } else {
            Some(self.embeddings.ncols())
        }
    }

    pub fn embeddings(&self) -> ArrayView2<'_, f32> {
        self.embeddings.view()
    }

    pub fn embedding(&self, index: usize) -> ArrayView1<'_, f32> {
        self.embeddings.row(index)
    }

    pub fn labels(&self) -> &[i64] {
        &self.labels
    }
}

/// Read a gallery file. A missing file is an empty gallery.
pub fn load_records(path: &Path) -> anyhow::Result<Vec<GalleryRecord>> {
    if !path.exists() {
        return Ok(vec![]);
    }

    let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    postcard::from_bytes(&data).with_context(|| format!("decoding {}", path.display()))
}

pub fn save_records(path: &Path, records: &[GalleryRecord]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let data = postcard::to_allocvec(records)?;
    std::fs::write(path, data).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

pub fn append_records(path: &Path, new: Vec<GalleryRecord>) -> anyhow::Result<usize> {
    let mut records = load_records(path)?;
    records.extend(new);
    save_records(path, &records)?;
    Ok(records.len())
}

pub fn load_gallery(path: &Path) -> anyhow::Result<Gallery> {
    let records = load_records(path)?;
    Gallery::from_records(&records).with_context(|| format!("building gallery from {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vectors() {
        let g = Gallery::from_vectors(&[vec![0.0, 1.0], vec![2.0, 3.0]], &[4, 5]).unwrap();
        assert_eq!(g.len(), 2);
        assert_eq!(g.dim(), Some(2));
        assert_eq!(g.labels(), &[4, 5]);
        assert_eq!(g.embedding(1).to_vec(), vec![2.0, 3.0]);
    }

    #[test]
    fn test_empty_gallery() {
        let g = Gallery::from_vectors(&[], &[]).unwrap();
        assert!(g.is_empty());
        assert_eq!(g.dim(), None);
    }

    #[test]
    fn test_label_count_mismatch() {
        let err = Gallery::from_vectors(&[vec![0.0]], &[1, 2]).unwrap_err();
        assert!(matches!(
            err,
            EvalError::LengthMismatch {
                left: 1,
                right: 2,
                ..
            }
        ));

        let err = Gallery::new(Array2::zeros((3, 2)), vec![0]).unwrap_err();
        assert!(matches!(err, EvalError::LengthMismatch { .. }));
    }

    #[test]
    fn test_ragged_embeddings() {
        let err = Gallery::from_vectors(&[vec![0.0, 1.0], vec![1.0]], &[0, 1]).unwrap_err();
        assert!(matches!(
            err,
            EvalError::ShapeMismatch {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_records_roundtrip_on_disk() {
        let dir = std::env::temp_dir().join(format!("faceval-{}", uuid::Uuid::new_v4()));
        let path = dir.join("gallery.bin");

        assert!(load_records(&path).unwrap().is_empty());

        append_records(&path, vec![GalleryRecord::new(3, vec![1.0, 0.0])]).unwrap();
        let total = append_records(&path, vec![GalleryRecord::new(7, vec![0.0, 1.0])]).unwrap();
        assert_eq!(total, 2);

        let gallery = load_gallery(&path).unwrap();
        assert_eq!(gallery.labels(), &[3, 7]);
        assert_eq!(gallery.dim(), Some(2));

        std::fs::remove_dir_all(&dir).ok();
    }
}
