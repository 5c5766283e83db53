use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::errors::{Result, WoundAnalysisError};

/// Mirrors packaged model artifacts into a writable cache directory.
///
/// Artifacts are keyed by file name only: a cached file with the requested
/// name is returned as-is, without any integrity check.
#[derive(Debug, Clone)]
pub struct ModelProvisioner {
    bundle_dir: PathBuf,
    cache_dir: PathBuf,
}

impl ModelProvisioner {
    pub fn new(bundle_dir: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            bundle_dir: bundle_dir.into(),
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Resolve `model_name` to a local file, copying it out of the bundle on
    /// first use. Any I/O failure yields `None`.
    pub fn resolve(&self, model_name: &str) -> Option<PathBuf> {
        match self.try_resolve(model_name) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("model {model_name} unavailable: {e}");
                None
            }
        }
    }

    fn try_resolve(&self, model_name: &str) -> Result<PathBuf> {
        let file_name = Path::new(model_name)
            .file_name()
            .ok_or_else(|| WoundAnalysisError::ModelUnavailable {
                name: model_name.to_string(),
            })?;
        let cached = self.cache_dir.join(file_name);
        if cached.is_file() {
            return Ok(cached);
        }

        let bundled = self.bundle_dir.join(file_name);
        fs::create_dir_all(&self.cache_dir).map_err(|e| WoundAnalysisError::FileSystem {
            path: self.cache_dir.clone(),
            operation: "create cache dir".to_string(),
            source: e,
        })?;

        // Copy under a temporary name so a partial copy is never mistaken
        // for a cached artifact.
        let partial = cached.with_extension("partial");
        fs::copy(&bundled, &partial).map_err(|e| WoundAnalysisError::FileSystem {
            path: bundled.clone(),
            operation: "copy model from bundle".to_string(),
            source: e,
        })?;
        fs::rename(&partial, &cached).map_err(|e| WoundAnalysisError::FileSystem {
            path: cached.clone(),
            operation: "publish cached model".to_string(),
            source: e,
        })?;

        info!("provisioned {} into {}", model_name, self.cache_dir.display());
        Ok(cached)
    }
}
