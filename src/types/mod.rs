//! Type definitions for the parser runner

pub mod corpus;
pub mod report;

pub use corpus::Corpus;
pub use report::{EvaluationOutcome, EvaluationReport, RunSummary};
