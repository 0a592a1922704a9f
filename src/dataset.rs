//! Labeled image folders and batching.
//!
//! A dataset root holds one directory per identity, named by its integer
//! label: `root/<label>/<image>`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::accuracy::Batch;
use crate::error::EvalError;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub path: PathBuf,
    pub label: i64,
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// List every image under `root`, sorted by path.
pub fn scan_labeled_dir(root: &Path) -> Result<Vec<Sample>> {
    let entries =
        std::fs::read_dir(root).with_context(|| format!("reading dataset {}", root.display()))?;

    let mut samples = Vec::new();
    for entry in entries {
        let dir = entry?.path();
        if !dir.is_dir() {
            continue;
        }
        let name = dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let label: i64 = name
            .parse()
            .with_context(|| format!("directory {} is not an integer label", dir.display()))?;

        for file in std::fs::read_dir(&dir).with_context(|| format!("reading {}", dir.display()))? {
            let path = file?.path();
            if path.is_file() && is_image(&path) {
                samples.push(Sample { path, label });
            }
        }
    }

    samples.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(samples)
}

/// Split `items` into consecutive batches of `batch_size`; the last one may be shorter.
pub fn batches<T, It>(items: It, batch_size: usize) -> Result<Vec<Batch<T>>, EvalError>
where
    It: IntoIterator<Item = (T, i64)>,
{
    if batch_size == 0 {
        return Err(EvalError::InvalidParameter(
            "batch size must be at least 1".into(),
        ));
    }

    let mut out = Vec::new();
    let mut current = Batch::new(Vec::with_capacity(batch_size), Vec::with_capacity(batch_size));
    for (input, label) in items {
        current.inputs.push(input);
        current.labels.push(label);
        if current.len() == batch_size {
            out.push(std::mem::replace(
                &mut current,
                Batch::new(Vec::with_capacity(batch_size), Vec::with_capacity(batch_size)),
            ));
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    Ok(out)
}

pub fn sample_batches(samples: &[Sample], batch_size: usize) -> Result<Vec<Batch<PathBuf>>, EvalError> {
    batches(
        samples.iter().map(|s| (s.path.clone(), s.label)),
        batch_size,
    )
}
