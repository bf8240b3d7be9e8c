//! Corpus reader for zip archives and glob patterns

use crate::types::Corpus;
use anyhow::{bail, Context, Result};
use std::fs;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};
use zip::ZipArchive;

/// Upper bound on the buffer preallocated from a zip entry's declared size
const MAX_SIZE_HINT: u64 = 16 * 1024 * 1024;

/// Reads serialized documents from a zip archive or a set of files.
///
/// A path that opens as a zip archive is read entry by entry in archive
/// order. Anything else is treated as a glob pattern and every matched file
/// becomes one document, in match order.
pub struct CorpusReader {
    pattern: String,
}

impl CorpusReader {
    /// Create a reader for a zip path or glob pattern
    pub fn new(pattern: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
        }
    }

    /// Read the whole corpus into memory
    pub fn read(&self) -> Result<Corpus> {
        let documents = match self.open_archive() {
            Some(archive) => self.read_archive(archive)?,
            None => self.read_glob()?,
        };

        info!(docs = documents.len(), source = %self.pattern, "Read corpus");
        Ok(Corpus::new(self.pattern.clone(), documents))
    }

    /// Get the corpus path or pattern
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    fn open_archive(&self) -> Option<ZipArchive<fs::File>> {
        let path = Path::new(&self.pattern);
        if !path.is_file() {
            return None;
        }
        let file = fs::File::open(path).ok()?;
        match ZipArchive::new(file) {
            Ok(archive) => Some(archive),
            Err(e) => {
                debug!(path = %self.pattern, error = %e, "Not a zip archive, falling back to glob");
                None
            }
        }
    }

    fn read_archive(&self, mut archive: ZipArchive<fs::File>) -> Result<Vec<Vec<u8>>> {
        let mut documents = Vec::with_capacity(archive.len());

        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .with_context(|| format!("Failed to open entry {} of {}", index, self.pattern))?;

            // Directory entries carry no document
            if entry.is_dir() {
                continue;
            }

            // The header size is untrusted; read_to_end grows past the hint
            let mut buffer = Vec::with_capacity(entry.size().min(MAX_SIZE_HINT) as usize);
            entry
                .read_to_end(&mut buffer)
                .with_context(|| format!("Failed to read entry '{}' of {}", entry.name(), self.pattern))?;
            documents.push(buffer);
        }

        if documents.is_empty() {
            warn!(path = %self.pattern, "Zip archive contains no documents");
        }

        Ok(documents)
    }

    fn read_glob(&self) -> Result<Vec<Vec<u8>>> {
        let paths = glob::glob(&self.pattern)
            .with_context(|| format!("Invalid corpus pattern {}", self.pattern))?;

        let mut documents = Vec::new();
        for entry in paths {
            let path = entry.with_context(|| format!("Failed to expand {}", self.pattern))?;
            if !path.is_file() {
                continue;
            }
            let bytes = fs::read(&path)
                .with_context(|| format!("Failed to read corpus file {}", path.display()))?;
            documents.push(bytes);
        }

        if documents.is_empty() {
            bail!(
                "Corpus {} is neither a zip archive nor a pattern matching any file",
                self.pattern
            );
        }

        Ok(documents)
    }
}

/// Read a corpus from a zip archive or glob pattern
pub fn read_corpus(pattern: &str) -> Result<Corpus> {
    CorpusReader::new(pattern).read()
}
