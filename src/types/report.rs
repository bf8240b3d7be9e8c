//! Evaluation report and run summary structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metrics reported by the external frame evaluator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Every `name -> value` pair the evaluator printed
    pub metrics: BTreeMap<String, f64>,

    /// Name of the line selected as the headline metric
    pub overall_metric: String,

    /// Headline metric value (slot F1 by default)
    pub overall: f64,
}

impl EvaluationReport {
    /// Look up a single metric by exact name
    pub fn get(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }
}

/// What happened when the evaluator was invoked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum EvaluationOutcome {
    /// Evaluator exited successfully and its output parsed
    Completed { report: EvaluationReport },
    /// Evaluator exited with a non-zero status
    Failed {
        exit_code: Option<i32>,
        output: String,
    },
}

impl EvaluationOutcome {
    /// Headline metric, if evaluation completed
    pub fn overall(&self) -> Option<f64> {
        match self {
            Self::Completed { report } => Some(report.overall),
            Self::Failed { .. } => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Summary of a single parser run, written as JSON on request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// When the run finished
    pub timestamp: DateTime<Utc>,

    /// Corpus path or pattern
    pub corpus: String,

    /// Number of documents annotated
    pub documents: usize,

    /// Number of session calls
    pub batches: usize,

    /// Seconds spent inside the session call
    pub annotation_secs: f64,

    /// Annotated corpus archive, if one was written
    pub output: Option<String>,

    /// Evaluation result, if evaluation was enabled
    pub evaluation: Option<EvaluationOutcome>,
}

impl RunSummary {
    pub fn new(corpus: impl Into<String>, documents: usize, batches: usize, annotation_secs: f64) -> Self {
        Self {
            timestamp: Utc::now(),
            corpus: corpus.into(),
            documents,
            batches,
            annotation_secs,
            output: None,
            evaluation: None,
        }
    }

    pub fn with_output(mut self, output: Option<String>) -> Self {
        self.output = output;
        self
    }

    pub fn with_evaluation(mut self, evaluation: Option<EvaluationOutcome>) -> Self {
        self.evaluation = evaluation;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> EvaluationReport {
        let mut metrics = BTreeMap::new();
        metrics.insert("SLOT_F1".to_string(), 42.5);
        metrics.insert("OTHER".to_string(), 1.0);
        EvaluationReport {
            metrics,
            overall_metric: "SLOT_F1".to_string(),
            overall: 42.5,
        }
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let outcome = EvaluationOutcome::Completed { report: report() };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["report"]["overall"], 42.5);

        let failed = EvaluationOutcome::Failed {
            exit_code: Some(3),
            output: "boom".to_string(),
        };
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["exit_code"], 3);
        assert_eq!(failed.overall(), None);
    }

    #[test]
    fn test_run_summary_builder() {
        let summary = RunSummary::new("corpus.zip", 10, 2, 0.5)
            .with_output(Some("out.zip".to_string()))
            .with_evaluation(Some(EvaluationOutcome::Completed { report: report() }));

        assert_eq!(summary.documents, 10);
        assert_eq!(summary.output.as_deref(), Some("out.zip"));
        assert_eq!(summary.evaluation.as_ref().and_then(|e| e.overall()), Some(42.5));
    }
}
