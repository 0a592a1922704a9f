//! The embedding capability consumed by the classifier.
//!
//! Anything that turns a raw input into a fixed-length vector can drive
//! classification: a closure, precomputed vectors, or the ONNX encoder.

use anyhow::Result;
use image::DynamicImage;

/// Maps a raw input to an embedding vector.
///
/// Must be deterministic for a given input over one evaluation run.
pub trait Embedder<I: ?Sized> {
    fn embed(&mut self, input: &I) -> Result<Vec<f32>>;
}

impl<I: ?Sized, F> Embedder<I> for F
where
    F: FnMut(&I) -> Result<Vec<f32>>,
{
    fn embed(&mut self, input: &I) -> Result<Vec<f32>> {
        self(input)
    }
}

/// Pass-through for inputs that already are embeddings.
#[derive(Debug, Default, Clone, Copy)]
pub struct Precomputed;

impl Embedder<Vec<f32>> for Precomputed {
    fn embed(&mut self, input: &Vec<f32>) -> Result<Vec<f32>> {
        Ok(input.clone())
    }
}

impl Embedder<[f32]> for Precomputed {
    fn embed(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        Ok(input.to_vec())
    }
}

impl Embedder<DynamicImage> for faceval_vision::Encoder {
    fn embed(&mut self, input: &DynamicImage) -> Result<Vec<f32>> {
        Ok(self.encode(input)?.into_vec())
    }
}
