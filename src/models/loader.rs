//! ONNX model loader

use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::Path;
use tracing::info;

/// Loaded ONNX model with metadata
pub struct LoadedModel {
    /// Model name (file stem)
    pub name: String,
    /// ONNX Runtime session
    pub session: Session,
    /// Input name for the feature tensor
    pub input_name: String,
    /// Output name for class probabilities
    pub output_name: String,
}

/// Loader for the loan classifier artifact
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a new model loader with specified number of threads
    pub fn with_threads(onnx_threads: usize) -> Result<Self> {
        ort::init().commit()?;
        info!(onnx_threads = onnx_threads, "ONNX Runtime initialized");
        Ok(Self { onnx_threads })
    }

    /// Load the classifier from an ONNX file.
    ///
    /// Called once at startup; the returned model is shared read-only
    /// (behind a lock) for the lifetime of the process.
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<LoadedModel> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "loan_model".to_string());

        if !path.exists() {
            anyhow::bail!("Model file not found: {}", path.display());
        }

        info!(model = %name, path = %path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(path)
            .context(format!("Failed to load model from {:?}", path))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        // skl2onnx exports name the class-probability output "probabilities"
        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .map(|o| o.name.clone())
            .unwrap_or_else(|| {
                session
                    .outputs
                    .last()
                    .map(|o| o.name.clone())
                    .unwrap_or_else(|| "probabilities".to_string())
            });

        info!(
            model = %name,
            input = %input_name,
            output = %output_name,
            "Model loaded successfully"
        );

        Ok(LoadedModel {
            name,
            session,
            input_name,
            output_name,
        })
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self { onnx_threads: 1 }
    }
}
