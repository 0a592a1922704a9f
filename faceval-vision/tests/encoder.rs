use anyhow::Result;
use faceval_vision::{model, Encoder};
use image::{DynamicImage, Rgb, RgbImage};
use std::path::Path;

fn model_path() -> Option<&'static Path> {
    let path = Path::new(model::DEFAULT_RECOGNITION_MODEL);
    if path.exists() {
        Some(path)
    } else {
        eprintln!("Skipping: {} not found", path.display());
        None
    }
}

/// Embeddings are unit length and deterministic for the same crop
#[test]
fn test_encoding_is_normalized_and_deterministic() -> Result<()> {
    env_logger::try_init().ok();
    let Some(path) = model_path() else {
        return Ok(());
    };
    let mut encoder = Encoder::from_file(path)?;

    let img = DynamicImage::ImageRgb8(RgbImage::from_fn(112, 112, |x, y| {
        Rgb([(x * 2) as u8, (y * 2) as u8, 128])
    }));

    let a = encoder.encode(&img)?;
    let b = encoder.encode(&img)?;

    let norm: f32 = a.vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    println!("✓ embedding dim={}, norm={:.4}", a.dim(), norm);
    assert!((norm - 1.0).abs() < 1e-3, "embedding not normalized: {}", norm);
    assert_eq!(a, b, "encoder should be deterministic");

    Ok(())
}

#[test]
fn test_missing_model_is_an_error() {
    let result = Encoder::from_file(Path::new("does/not/exist.onnx"));
    assert!(result.is_err());
}
