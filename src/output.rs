//! Zip writer for annotated documents

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Prefix of every entry name in the annotated archive
pub const ENTRY_PREFIX: &str = "test.";

/// Writes annotated documents to a zip archive as `test.0`, `test.1`, ...
pub struct AnnotationWriter {
    path: PathBuf,
}

impl AnnotationWriter {
    /// Create a writer for the given archive path
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Write all documents, replacing any existing archive
    pub fn write(&self, documents: &[Vec<u8>]) -> Result<()> {
        let file = fs::File::create(&self.path)
            .with_context(|| format!("Failed to create {}", self.path.display()))?;
        let mut writer = ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        for (index, document) in documents.iter().enumerate() {
            writer
                .start_file(entry_name(index), options)
                .with_context(|| format!("Failed to add entry {} to {}", index, self.path.display()))?;
            writer.write_all(document)?;
        }

        writer
            .finish()
            .with_context(|| format!("Failed to finalize {}", self.path.display()))?;

        info!(
            docs = documents.len(),
            path = %self.path.display(),
            "Wrote annotated docs"
        );
        Ok(())
    }

    /// Get the archive path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Entry name for the annotated document at `index`
pub fn entry_name(index: usize) -> String {
    format!("{}{}", ENTRY_PREFIX, index)
}
