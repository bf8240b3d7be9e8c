//! Semantic Parser Runner Library
//!
//! Loads a trained semantic parser exported as an ONNX graph, annotates a
//! corpus of serialized documents in batches, and scores the result with
//! the external frame evaluator.

pub mod cli;
pub mod config;
pub mod corpus;
pub mod evaluation;
pub mod metrics;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod types;

pub use config::AppConfig;
pub use corpus::{read_corpus, CorpusReader};
pub use evaluation::Evaluator;
pub use models::{annotate_corpus, Annotator, ModelLoader, OnnxAnnotator};
pub use output::AnnotationWriter;
pub use pipeline::Pipeline;
pub use types::{Corpus, EvaluationOutcome, EvaluationReport, RunSummary};
