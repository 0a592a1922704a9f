//! Thresholded k-nearest-neighbour classification against a [`Gallery`].
//!
//! For each query the `k` closest gallery entries (Euclidean distance, ties
//! resolved by gallery order) are taken, the ones farther than `threshold`
//! are dropped, and the remaining labels vote. The most frequent label wins,
//! the lowest label on a tie. No surviving neighbour yields [`UNKNOWN_LABEL`].

use std::collections::BTreeMap;

use log::{debug, info};
use ndarray::ArrayView1;

use crate::embed::Embedder;
use crate::error::{EvalError, Result};
use crate::gallery::Gallery;

/// Prediction for a query without a confident match.
pub const UNKNOWN_LABEL: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KnnParams {
    /// Number of neighbours that may vote
    pub k: usize,
    /// Neighbours farther than this don't vote
    pub threshold: f32,
    /// Log min/max gallery distance per query at info level
    pub print_dist: bool,
}

impl Default for KnnParams {
    fn default() -> Self {
        Self {
            k: 7,
            threshold: 0.7,
            print_dist: false,
        }
    }
}

impl KnnParams {
    pub fn new(k: usize, threshold: f32) -> Self {
        Self {
            k,
            threshold,
            print_dist: false,
        }
    }

    pub fn with_print_dist(mut self, print_dist: bool) -> Self {
        self.print_dist = print_dist;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(EvalError::InvalidParameter("k must be at least 1".into()));
        }
        if self.threshold.is_nan() || self.threshold < 0.0 {
            return Err(EvalError::InvalidParameter(format!(
                "threshold must be non-negative, got {}",
                self.threshold
            )));
        }
        Ok(())
    }
}

/// Outcome of the vote for a single query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vote {
    pub label: i64,
    /// Neighbours that voted for `label`
    pub support: usize,
    /// Distance of the closest neighbour that passed the threshold
    pub nearest: Option<f32>,
}

impl Vote {
    pub fn unknown() -> Self {
        Self {
            label: UNKNOWN_LABEL,
            support: 0,
            nearest: None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.label == UNKNOWN_LABEL
    }
}

pub fn euclidean_distance(a: ArrayView1<'_, f32>, b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Distance from `query` to every gallery entry, in gallery order.
pub fn distances(gallery: &Gallery, query: &[f32]) -> Result<Vec<f32>> {
    if let Some(expected) = gallery.dim() {
        if query.len() != expected {
            return Err(EvalError::ShapeMismatch {
                expected,
                actual: query.len(),
            });
        }
    }
    Ok(gallery
        .embeddings()
        .rows()
        .into_iter()
        .map(|row| euclidean_distance(row, query))
        .collect())
}

/// Indices of the `k` smallest distances that are within `threshold`.
///
/// Selection is stable: equal distances keep gallery order, so the k-th slot
/// goes to the earlier entry.
pub fn nearest_within(dists: &[f32], k: usize, threshold: f32) -> Vec<usize> {
    let mut order: Vec<usize> = (0..dists.len()).collect();
    order.sort_by(|&a, &b| dists[a].total_cmp(&dists[b]));
    order
        .into_iter()
        .take(k)
        .filter(|&i| dists[i] <= threshold)
        .collect()
}

/// Most frequent label and its count. Lowest label wins ties.
pub fn majority_label<L>(labels: L) -> Option<(i64, usize)>
where
    L: IntoIterator<Item = i64>,
{
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for label in labels {
        *counts.entry(label).or_default() += 1;
    }
    counts.into_iter().fold(None, |best, (label, count)| match best {
        Some((_, c)) if c >= count => best,
        _ => Some((label, count)),
    })
}

/// Classify one already-embedded query.
pub fn classify(gallery: &Gallery, query: &[f32], params: &KnnParams) -> Result<Vote> {
    if gallery.is_empty() {
        return Ok(Vote::unknown());
    }
    let dists = distances(gallery, query)?;
    log_distance_range(&dists, params.print_dist);

    let neighbours = nearest_within(&dists, params.k, params.threshold);
    let labels = gallery.labels();
    let vote = match majority_label(neighbours.iter().map(|&i| labels[i])) {
        Some((label, support)) => Vote {
            label,
            support,
            nearest: neighbours.first().map(|&i| dists[i]),
        },
        None => Vote::unknown(),
    };
    Ok(vote)
}

/// Embed each query and classify it.
///
/// Returns one label per query, in query order.
pub fn predict<I, E>(
    queries: &[I],
    gallery: &Gallery,
    embedder: &mut E,
    params: &KnnParams,
) -> Result<Vec<i64>>
where
    E: Embedder<I> + ?Sized,
{
    Ok(predict_votes(queries, gallery, embedder, params)?
        .into_iter()
        .map(|v| v.label)
        .collect())
}

pub fn predict_votes<I, E>(
    queries: &[I],
    gallery: &Gallery,
    embedder: &mut E,
    params: &KnnParams,
) -> Result<Vec<Vote>>
where
    E: Embedder<I> + ?Sized,
{
    params.validate()?;
    queries
        .iter()
        .map(|q| {
            let embedding = embedder.embed(q).map_err(EvalError::Embedding)?;
            classify(gallery, &embedding, params)
        })
        .collect()
}

fn log_distance_range(dists: &[f32], print_dist: bool) {
    let (min, max) = dists
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &d| {
            (lo.min(d), hi.max(d))
        });
    if print_dist {
        info!("max: {:0.4}, min: {:0.4}", max, min);
    } else {
        debug!("max: {:0.4}, min: {:0.4}", max, min);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    #[test]
    fn test_euclidean_distance() {
        let a = arr1(&[0.0f32, 0.0]);
        assert_eq!(euclidean_distance(a.view(), &[3.0, 4.0]), 5.0);
        assert_eq!(euclidean_distance(a.view(), &[0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_majority_prefers_lowest_label_on_tie() {
        assert_eq!(majority_label([5, 2, 5, 2]), Some((2, 2)));
        assert_eq!(majority_label([9, 3, 9]), Some((9, 2)));
        assert_eq!(majority_label([4]), Some((4, 1)));
        assert_eq!(majority_label(Vec::<i64>::new()), None);
    }

    #[test]
    fn test_nearest_within_is_stable() {
        // Entries 1 and 2 tie for the second slot; the earlier one is kept.
        let d = [0.1, 0.5, 0.5, 0.9];
        assert_eq!(nearest_within(&d, 2, 1.0), vec![0, 1]);
        assert_eq!(nearest_within(&d, 3, 1.0), vec![0, 1, 2]);
    }

    #[test]
    fn test_nearest_within_threshold_is_inclusive() {
        let d = [0.7, 0.2, 0.71];
        assert_eq!(nearest_within(&d, 3, 0.7), vec![1, 0]);
        assert_eq!(nearest_within(&d, 10, 0.0), Vec::<usize>::new());
    }

    #[test]
    fn test_classify_reports_support() {
        let g = Gallery::from_vectors(
            &[vec![0.0], vec![0.1], vec![0.2], vec![5.0]],
            &[1, 2, 2, 3],
        )
        .unwrap();
        let vote = classify(&g, &[0.0], &KnnParams::new(3, 1.0)).unwrap();
        assert_eq!(vote.label, 2);
        assert_eq!(vote.support, 2);
        assert_eq!(vote.nearest, Some(0.0));
    }

    #[test]
    fn test_classify_shape_mismatch() {
        let g = Gallery::from_vectors(&[vec![0.0, 0.0]], &[0]).unwrap();
        let err = classify(&g, &[0.0, 0.0, 0.0], &KnnParams::default()).unwrap_err();
        assert!(matches!(
            err,
            EvalError::ShapeMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_params_validation() {
        assert!(KnnParams::default().validate().is_ok());
        assert!(KnnParams::new(1, f32::INFINITY).validate().is_ok());
        assert!(matches!(
            KnnParams::new(0, 0.5).validate(),
            Err(EvalError::InvalidParameter(_))
        ));
        assert!(KnnParams::new(3, -0.1).validate().is_err());
        assert!(KnnParams::new(3, f32::NAN).validate().is_err());
    }
}
