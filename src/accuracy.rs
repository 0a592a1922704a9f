use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::classifier::{self, KnnParams};
use crate::embed::Embedder;
use crate::error::{EvalError, Result};
use crate::gallery::Gallery;

/// A batch of raw queries with their ground-truth labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch<I> {
    pub inputs: Vec<I>,
    pub labels: Vec<i64>,
}

impl<I> Batch<I> {
    pub fn new(inputs: Vec<I>, labels: Vec<i64>) -> Self {
        Self { inputs, labels }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalReport {
    /// Accuracy of every batch, in iteration order
    pub batch_accuracies: Vec<f64>,
    /// Mean of `batch_accuracies`; each batch weighs the same
    pub accuracy: f64,
    pub correct: usize,
    pub total: usize,
}

impl EvalReport {
    /// correct / total over all queries, regardless of batching.
    pub fn pooled_accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}

fn count_correct(predicted: &[i64], truth: &[i64]) -> Result<usize> {
    if predicted.len() != truth.len() {
        return Err(EvalError::LengthMismatch {
            what: "predicted and true labels",
            left: predicted.len(),
            right: truth.len(),
        });
    }
    Ok(predicted.iter().zip(truth).filter(|(p, t)| p == t).count())
}

/// Fraction of positions where `predicted` equals `truth`. Zero for an empty batch.
pub fn batch_accuracy(predicted: &[i64], truth: &[i64]) -> Result<f64> {
    let correct = count_correct(predicted, truth)?;
    if truth.is_empty() {
        return Ok(0.0);
    }
    Ok(correct as f64 / truth.len() as f64)
}

/// Classify every batch and aggregate.
pub fn evaluate_report<I, E, B>(
    batches: B,
    gallery: &Gallery,
    embedder: &mut E,
    params: &KnnParams,
) -> Result<EvalReport>
where
    B: IntoIterator<Item = Batch<I>>,
    E: Embedder<I> + ?Sized,
{
    params.validate()?;

    let mut batch_accuracies = Vec::new();
    let mut correct = 0;
    let mut total = 0;

    for (i, batch) in batches.into_iter().enumerate() {
        if batch.inputs.len() != batch.labels.len() {
            return Err(EvalError::LengthMismatch {
                what: "batch inputs and labels",
                left: batch.inputs.len(),
                right: batch.labels.len(),
            });
        }
        let predicted = classifier::predict(&batch.inputs, gallery, embedder, params)?;
        let batch_correct = count_correct(&predicted, &batch.labels)?;
        let acc = batch_accuracy(&predicted, &batch.labels)?;
        debug!(
            "batch {}: {}/{} correct ({:.4})",
            i,
            batch_correct,
            batch.len(),
            acc
        );

        correct += batch_correct;
        total += batch.len();
        batch_accuracies.push(acc);
    }

    if batch_accuracies.is_empty() {
        return Err(EvalError::EmptyDataset);
    }

    let accuracy = batch_accuracies.iter().sum::<f64>() / batch_accuracies.len() as f64;
    info!(
        "accuracy {:.4} over {} batch(es), {}/{} queries correct",
        accuracy,
        batch_accuracies.len(),
        correct,
        total
    );

    Ok(EvalReport {
        batch_accuracies,
        accuracy,
        correct,
        total,
    })
}

/// Mean per-batch accuracy in [0, 1].
pub fn evaluate<I, E, B>(
    batches: B,
    gallery: &Gallery,
    embedder: &mut E,
    params: &KnnParams,
) -> Result<f64>
where
    B: IntoIterator<Item = Batch<I>>,
    E: Embedder<I> + ?Sized,
{
    Ok(evaluate_report(batches, gallery, embedder, params)?.accuracy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_accuracy() {
        assert_eq!(batch_accuracy(&[0, 1, 1, 1], &[0, 1, 0, 1]).unwrap(), 0.75);
        assert_eq!(batch_accuracy(&[-1, -1], &[0, 1]).unwrap(), 0.0);
        assert_eq!(batch_accuracy(&[], &[]).unwrap(), 0.0);
    }

    #[test]
    fn test_batch_accuracy_length_mismatch() {
        assert!(matches!(
            batch_accuracy(&[0], &[0, 1]),
            Err(EvalError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_pooled_accuracy() {
        let report = EvalReport {
            batch_accuracies: vec![1.0, 0.0],
            accuracy: 0.5,
            correct: 3,
            total: 4,
        };
        assert_eq!(report.pooled_accuracy(), 0.75);
    }
}
