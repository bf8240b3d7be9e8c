//! Corpus data structures

/// An ordered collection of serialized documents.
///
/// Documents are opaque byte payloads; the parser session is the only
/// component that interprets them. Position is the document's identity:
/// annotation `i` always corresponds to document `i`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    /// Path or pattern the documents were read from
    source: String,
    /// Serialized documents in read order
    documents: Vec<Vec<u8>>,
}

impl Corpus {
    /// Create a corpus from already loaded documents
    pub fn new(source: impl Into<String>, documents: Vec<Vec<u8>>) -> Self {
        Self {
            source: source.into(),
            documents,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn documents(&self) -> &[Vec<u8>] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Total payload size in bytes
    pub fn total_bytes(&self) -> usize {
        self.documents.iter().map(Vec::len).sum()
    }

    /// Contiguous batches of at most `batch_size` documents, in order.
    ///
    /// Panics if `batch_size` is zero, like `slice::chunks`.
    pub fn batches(&self, batch_size: usize) -> std::slice::Chunks<'_, Vec<u8>> {
        self.documents.chunks(batch_size)
    }

    pub fn into_documents(self) -> Vec<Vec<u8>> {
        self.documents
    }
}
