//! Text-file output for node-exporter style collectors.
//!
//! The metrics file is replaced atomically: content goes to a sibling
//! temporary file that is then renamed over the target, so a reader never
//! sees a partially written exposition.

use std::path::{Path, PathBuf};

use ngraph_common::config::TextfileConfig;
use ngraph_common::constants::TEXTFILE_NAME;
use ngraph_common::error::{NgraphError, Result};

/// Writes rendered metrics to a fixed file.
#[derive(Debug, Clone)]
pub struct TextfileWriter {
    target: PathBuf,
    staging: PathBuf,
}

impl TextfileWriter {
    /// Creates a writer for `ngraph.prom` inside `output_dir`.
    #[must_use]
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        let dir = output_dir.as_ref();
        Self {
            target: dir.join(TEXTFILE_NAME),
            staging: dir.join(format!(".{TEXTFILE_NAME}.tmp")),
        }
    }

    /// Creates a writer from the text-file configuration.
    #[must_use]
    pub fn from_config(config: &TextfileConfig) -> Self {
        Self::new(&config.output_dir)
    }

    /// Path of the metrics file.
    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Replaces the metrics file with `content`.
    ///
    /// The output directory is created when missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory, the staging file, or the rename
    /// fails. The previous file is left untouched in that case.
    pub fn write(&self, content: &str) -> Result<()> {
        if let Some(dir) = self.target.parent() {
            std::fs::create_dir_all(dir).map_err(|e| NgraphError::Io {
                path: dir.to_path_buf(),
                source: e,
            })?;
        }
        std::fs::write(&self.staging, content).map_err(|e| NgraphError::Io {
            path: self.staging.clone(),
            source: e,
        })?;
        if let Err(e) = std::fs::rename(&self.staging, &self.target) {
            let _ = std::fs::remove_file(&self.staging);
            return Err(NgraphError::Io {
                path: self.target.clone(),
                source: e,
            });
        }
        tracing::debug!(path = %self.target.display(), bytes = content.len(), "wrote metrics file");
        Ok(())
    }
}
