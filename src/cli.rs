//! Command-line interface

use crate::config::ConfigOverrides;
use clap::Parser;
use std::path::PathBuf;

/// Runs a trained semantic parser over a corpus
#[derive(Parser, Debug)]
#[command(
    name = "sempar-parse",
    version,
    about = "Annotate a document corpus with a trained semantic parser and evaluate the result."
)]
pub struct Cli {
    /// TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Model directory holding master_spec and checkpoints/best
    #[arg(long)]
    pub input: Option<String>,

    /// Commons store
    #[arg(long)]
    pub commons: Option<String>,

    /// Evaluation / benchmarking corpus (zip archive or glob pattern)
    #[arg(long)]
    pub corpus: Option<String>,

    /// Gold corpus for evaluation
    #[arg(long)]
    pub gold: Option<String>,

    /// Output zip file for the annotated corpus
    #[arg(long)]
    pub output: Option<String>,

    /// Session intra/inter-op parallelism [default: 8]
    #[arg(long)]
    pub threads: Option<usize>,

    /// Maximum batch size [default: 1024]
    #[arg(long = "batch_size")]
    pub batch_size: Option<usize>,

    /// Perform evaluation
    #[arg(long)]
    pub eval: bool,

    /// Fail the run when the evaluator exits non-zero
    #[arg(long = "strict_eval")]
    pub strict_eval: bool,

    /// Evaluator binary
    #[arg(long)]
    pub evaluator: Option<String>,

    /// Custom operator library to register with the session
    #[arg(long = "op_library")]
    pub op_library: Option<String>,

    /// Write a JSON run summary to this path
    #[arg(long)]
    pub summary: Option<String>,
}

impl Cli {
    /// Flags that override file and environment configuration
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            input: self.input.clone(),
            commons: self.commons.clone(),
            corpus: self.corpus.clone(),
            gold: self.gold.clone(),
            output: self.output.clone(),
            threads: self.threads,
            batch_size: self.batch_size,
            eval: self.eval,
            strict_eval: self.strict_eval,
            evaluator: self.evaluator.clone(),
            op_library: self.op_library.clone(),
            summary: self.summary.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_flags() {
        let cli = Cli::try_parse_from([
            "sempar-parse",
            "--input=model",
            "--corpus",
            "dev.zip",
            "--batch_size=64",
            "--threads=2",
            "--eval",
        ])
        .unwrap();

        let overrides = cli.overrides();
        assert_eq!(overrides.input.as_deref(), Some("model"));
        assert_eq!(overrides.corpus.as_deref(), Some("dev.zip"));
        assert_eq!(overrides.batch_size, Some(64));
        assert_eq!(overrides.threads, Some(2));
        assert!(overrides.eval);
        assert!(!overrides.strict_eval);
        assert_eq!(overrides.gold, None);
    }

    #[test]
    fn test_rejects_non_numeric_batch_size() {
        assert!(Cli::try_parse_from(["sempar-parse", "--batch_size=lots"]).is_err());
    }
}
