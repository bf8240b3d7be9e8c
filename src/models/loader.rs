//! Parser model loader

use crate::config::{ModelConfig, DEFAULT_THREADS};
use crate::models::spec::MasterSpec;
use anyhow::{bail, Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::{Path, PathBuf};
use tracing::info;

/// Checkpoint directory inside a model directory
pub const CHECKPOINT_DIR: &str = "checkpoints";

/// Checkpoint selected for inference
pub const BEST_CHECKPOINT: &str = "best";

/// Loaded parser session with its tensor bindings
pub struct LoadedModel {
    /// Model name (the model directory's name)
    pub name: String,
    /// ONNX Runtime session
    pub session: Session,
    /// Session input receiving the document batch
    pub input_name: String,
    /// Session output carrying the annotated batch
    pub output_name: String,
    /// Checkpoint the session was restored from
    pub checkpoint: PathBuf,
}

/// Loader for exported parser checkpoints
pub struct ModelLoader {
    /// Intra- and inter-op thread pool size
    threads: usize,
    /// Custom operator library registered before restoring
    op_library: Option<PathBuf>,
}

impl ModelLoader {
    /// Create a loader with the default thread pool size
    pub fn new() -> Self {
        Self::with_threads(DEFAULT_THREADS)
    }

    /// Create a loader with the given thread pool size
    pub fn with_threads(threads: usize) -> Self {
        Self {
            threads,
            op_library: None,
        }
    }

    /// Register a custom operator library with every session
    pub fn with_op_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.op_library = Some(path.into());
        self
    }

    /// Create a loader from model configuration
    pub fn from_config(config: &ModelConfig) -> Self {
        let loader = Self::with_threads(config.threads);
        match &config.op_library {
            Some(lib) => loader.with_op_library(lib),
            None => loader,
        }
    }

    /// Build a session and restore it from a checkpoint file
    pub fn load_session(&self, checkpoint: &Path) -> Result<Session> {
        info!(
            checkpoint = %checkpoint.display(),
            threads = self.threads,
            "Building the graph"
        );

        let mut builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.threads)?
            .with_inter_threads(self.threads)?
            .with_parallel_execution(true)?;

        if let Some(lib) = &self.op_library {
            info!(library = %lib.display(), "Registering operator library");
            builder = builder
                .with_operator_library(lib)
                .with_context(|| format!("Failed to register operator library {}", lib.display()))?;
        }

        info!("Loading from checkpoint...");
        builder
            .commit_from_file(checkpoint)
            .with_context(|| format!("Failed to load checkpoint {}", checkpoint.display()))
    }

    /// Load the master spec and restore the best checkpoint of a model
    /// directory
    pub fn load_model(&self, config: &ModelConfig) -> Result<(MasterSpec, LoadedModel)> {
        let model_dir = Path::new(&config.input);
        let spec = MasterSpec::load(model_dir)?;
        let checkpoint = resolve_checkpoint(model_dir)?;
        let session = self.load_session(&checkpoint)?;

        let name = model_dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("parser")
            .to_string();

        info!(
            model = %name,
            input = %config.input_name,
            output = %config.output_name,
            "Model loaded successfully"
        );

        Ok((
            spec,
            LoadedModel {
                name,
                session,
                input_name: config.input_name.clone(),
                output_name: config.output_name.clone(),
                checkpoint,
            },
        ))
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Locate `<model_dir>/checkpoints/best`, accepting an `.onnx` extension
pub fn resolve_checkpoint<P: AsRef<Path>>(model_dir: P) -> Result<PathBuf> {
    let base = model_dir.as_ref().join(CHECKPOINT_DIR).join(BEST_CHECKPOINT);
    if base.is_file() {
        return Ok(base);
    }

    let with_extension = base.with_extension("onnx");
    if with_extension.is_file() {
        return Ok(with_extension);
    }

    bail!(
        "No checkpoint at {} (or {})",
        base.display(),
        with_extension.display()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_resolve_plain_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(CHECKPOINT_DIR)).unwrap();
        let best = dir.path().join("checkpoints/best");
        fs::write(&best, b"model").unwrap();

        assert_eq!(resolve_checkpoint(dir.path()).unwrap(), best);
    }

    #[test]
    fn test_resolve_onnx_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(CHECKPOINT_DIR)).unwrap();
        let best = dir.path().join("checkpoints/best.onnx");
        fs::write(&best, b"model").unwrap();

        assert_eq!(resolve_checkpoint(dir.path()).unwrap(), best);
    }

    #[test]
    fn test_missing_checkpoint_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_checkpoint(dir.path()).unwrap_err();
        assert!(err.to_string().contains("No checkpoint"));
    }

    #[test]
    fn test_loader_from_config() {
        let mut config = crate::config::AppConfig::default().model;
        config.threads = 3;
        config.op_library = Some("ops.so".to_string());

        let loader = ModelLoader::from_config(&config);
        assert_eq!(loader.threads, 3);
        assert_eq!(loader.op_library.as_deref(), Some(Path::new("ops.so")));
    }
}
