use std::path::Path;

use anyhow::{Context, Result};
#[cfg(any(feature = "openvino", feature = "cuda"))]
use ort::ep::{self, ExecutionProvider};
use ort::session::{
    builder::{GraphOptimizationLevel, SessionBuilder},
    Session,
};

/// Default location of the SFace recognition model, relative to the working directory.
pub const DEFAULT_RECOGNITION_MODEL: &str = "models/face_recognition_sface_2021dec.onnx";

pub fn session_builder() -> Result<SessionBuilder> {
    #[allow(unused_mut)]
    let mut builder =
        Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)?;

    #[cfg(feature = "openvino")]
    {
        let ep = ep::OpenVINO::default();
        if ep.is_available()? {
            ep.register(&mut builder)?;
        } else {
            log::warn!("openvino feature is enabled, onnx runtime not compiled with openvino")
        }
    }

    #[cfg(feature = "cuda")]
    {
        let ep = ep::CUDA::default();
        if ep.is_available()? {
            ep.register(&mut builder)?;
        } else {
            log::warn!("cuda feature is enabled, onnx runtime not compiled with cuda")
        }
    }

    Ok(builder)
}

/// Load a recognition model from disk.
///
/// The onnxruntime shared library is resolved at runtime (`ORT_DYLIB_PATH`).
pub fn recog_session(path: &Path) -> Result<Session> {
    if !path.exists() {
        anyhow::bail!("recognition model not found at {}", path.display());
    }
    log::debug!("loading recognition model {}", path.display());
    session_builder()?
        .commit_from_file(path)
        .with_context(|| format!("load recognition model {}", path.display()))
}
