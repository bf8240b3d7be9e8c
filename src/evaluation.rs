//! External frame evaluator
//!
//! The evaluator compares an annotated corpus with a gold corpus and prints
//! one `metric<TAB>value` line per metric.

use crate::config::EvaluationConfig;
use crate::types::{EvaluationOutcome, EvaluationReport};
use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;
use tracing::{info, warn};

/// Runs the evaluator binary and parses its report
pub struct Evaluator {
    binary: PathBuf,
    commons: String,
    metric: String,
}

impl Evaluator {
    /// Create an evaluator
    pub fn new(binary: impl Into<PathBuf>, commons: &str, metric: &str) -> Self {
        Self {
            binary: binary.into(),
            commons: commons.to_string(),
            metric: metric.to_string(),
        }
    }

    /// Create an evaluator from configuration
    pub fn from_config(config: &EvaluationConfig) -> Self {
        Self::new(&config.evaluator, &config.commons, &config.metric)
    }

    /// The evaluator invocation for a gold/test pair
    pub fn command(&self, gold: &str, test: &str) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .arg(format!("--gold_documents={}", gold))
            .arg(format!("--test_documents={}", test))
            .arg(format!("--commons={}", self.commons));
        command
    }

    /// Evaluate an annotated corpus against a gold corpus.
    ///
    /// A process that cannot be started is an error. A process that exits
    /// non-zero yields [`EvaluationOutcome::Failed`] so the caller decides
    /// whether that is fatal.
    pub fn evaluate(&self, gold: &str, test: &str) -> Result<EvaluationOutcome> {
        info!(
            evaluator = %self.binary.display(),
            gold = %gold,
            test = %test,
            "Evaluating against gold corpus"
        );

        let output = self
            .command(gold, test)
            .output()
            .with_context(|| format!("Failed to run evaluator {}", self.binary.display()))?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            warn!(
                exit_code = ?output.status.code(),
                output = %combined,
                "Evaluation failed"
            );
            return Ok(EvaluationOutcome::Failed {
                exit_code: output.status.code(),
                output: combined,
            });
        }

        let report = parse_metrics(&combined, &self.metric)?;
        info!("Overall Evaluation Metric: {:.6}", report.overall);
        Ok(EvaluationOutcome::Completed { report })
    }
}

/// Parse `name<TAB>value` lines.
///
/// The overall score is the last line whose name starts with
/// `metric_prefix`. Blank lines are ignored; any other malformed line is an
/// error, as is a report without the overall metric.
pub fn parse_metrics(output: &str, metric_prefix: &str) -> Result<EvaluationReport> {
    let mut metrics = BTreeMap::new();
    let mut overall = None;

    for line in output.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        info!("Evaluation Metric: {}", line);

        let parts: Vec<&str> = line.split('\t').collect();
        let [name, value] = parts.as_slice() else {
            bail!("Malformed evaluation line: {:?}", line);
        };
        let value: f64 = value
            .trim()
            .parse()
            .with_context(|| format!("Malformed metric value in line {:?}", line))?;

        metrics.insert(name.to_string(), value);
        if name.starts_with(metric_prefix) {
            overall = Some((name.to_string(), value));
        }
    }

    let Some((overall_metric, overall)) = overall else {
        bail!("Missing {} in evaluation output", metric_prefix);
    };

    Ok(EvaluationReport {
        metrics,
        overall_metric,
        overall,
    })
}
