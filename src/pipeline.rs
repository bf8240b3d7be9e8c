//! End-to-end parser run: corpus in, annotated corpus and evaluation out

use crate::config::AppConfig;
use crate::corpus::CorpusReader;
use crate::evaluation::Evaluator;
use crate::metrics::AnnotationMetrics;
use crate::models::annotator::{annotate_corpus, Annotator};
use crate::output::AnnotationWriter;
use crate::types::{EvaluationOutcome, RunSummary};
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Drives one annotation run with a ready annotator
pub struct Pipeline<'a> {
    config: &'a AppConfig,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a AppConfig) -> Self {
        Self { config }
    }

    /// Annotate the configured corpus, then write and evaluate the result
    /// as configured
    pub fn run<A: Annotator + ?Sized>(&self, annotator: &mut A) -> Result<RunSummary> {
        self.config.validate()?;

        let corpus = CorpusReader::new(&self.config.corpus.path).read()?;

        let mut metrics = AnnotationMetrics::new();
        let annotated = annotate_corpus(annotator, &corpus, self.config.corpus.batch_size, &mut metrics)?;
        metrics.print_summary();

        if let Some(output) = &self.config.corpus.output {
            AnnotationWriter::new(output).write(&annotated)?;
        }

        let evaluation = if self.config.evaluation.enabled {
            Some(self.evaluate()?)
        } else {
            None
        };

        let summary = RunSummary::new(
            corpus.source(),
            annotated.len(),
            metrics.batch_count(),
            metrics.annotation_time().as_secs_f64(),
        )
        .with_output(self.config.corpus.output.clone())
        .with_evaluation(evaluation);

        if let Some(path) = &self.config.summary {
            write_summary(path, &summary)?;
        }

        Ok(summary)
    }

    fn evaluate(&self) -> Result<EvaluationOutcome> {
        let (gold, output) = self.config.evaluation_paths()?;
        let outcome = Evaluator::from_config(&self.config.evaluation).evaluate(gold, output)?;

        if let EvaluationOutcome::Failed { exit_code, .. } = &outcome {
            if self.config.evaluation.strict {
                bail!("Evaluator exited with status {:?}", exit_code);
            }
            warn!("Continuing without evaluation result");
        }

        Ok(outcome)
    }
}

/// Write a run summary as pretty JSON
pub fn write_summary<P: AsRef<Path>>(path: P, summary: &RunSummary) -> Result<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(path, json).with_context(|| format!("Failed to write summary {}", path.display()))?;
    info!(path = %path.display(), "Wrote run summary");
    Ok(())
}
