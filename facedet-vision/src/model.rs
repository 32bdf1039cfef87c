use std::path::Path;

use anyhow::{Context, Result};
#[cfg(any(feature = "openvino", feature = "cuda"))]
use ort::ep::{self, ExecutionProvider};
use ort::session::{
    builder::{GraphOptimizationLevel, SessionBuilder},
    Session,
};

/// Session builder with every execution provider enabled at compile time.
///
/// The environment is shared by the builder and every session committed from it.
pub fn session_builder() -> ort::Result<SessionBuilder> {
    let environment = ort::init().with_name("facedet").build()?;
    #[allow(unused_mut)]
    let mut builder =
        Session::builder(&environment)?.with_optimization_level(GraphOptimizationLevel::Level3)?;

    #[cfg(feature = "openvino")]
    register_provider(&mut builder, ep::OpenVINO::default())?;
    #[cfg(feature = "cuda")]
    register_provider(&mut builder, ep::CUDA::default())?;

    Ok(builder)
}

/// Register `provider` if onnx runtime was built with it, otherwise stay on CPU.
#[cfg(any(feature = "openvino", feature = "cuda"))]
fn register_provider<E: ExecutionProvider>(
    builder: &mut SessionBuilder,
    provider: E,
) -> ort::Result<()> {
    if E::is_available()? {
        provider.register(builder)?;
        log::info!("detector runs on {}", E::NAME);
    } else {
        log::warn!(
            "{} requested but onnx runtime was not compiled with it, using CPU",
            E::NAME
        );
    }
    Ok(())
}

/// Load a face detector from an ONNX file.
pub fn detector_session(path: &Path) -> Result<Session> {
    anyhow::ensure!(path.exists(), "model file does not exist: {}", path.display());
    let session = session_builder()
        .context("creating onnx runtime session")?
        .commit_from_file(path)
        .with_context(|| format!("load detector model {}", path.display()))?;
    log::debug!(
        "loaded {} with {} outputs",
        path.display(),
        session.outputs().len()
    );
    Ok(session)
}
