//! Parser model components

pub mod annotator;
pub mod inference;
pub mod loader;
pub mod spec;

pub use annotator::{annotate_corpus, Annotator};
pub use inference::OnnxAnnotator;
pub use loader::{LoadedModel, ModelLoader};
pub use spec::MasterSpec;
