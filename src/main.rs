//! Semantic Parser Runner - Main Entry Point
//!
//! Restores a trained parser, annotates a corpus in batches, optionally
//! writes the annotated corpus and scores it with the frame evaluator.

use anyhow::Result;
use clap::Parser;
use sempar_parse::{
    cli::Cli,
    config::{AppConfig, LoggingConfig},
    models::{ModelLoader, OnnxAnnotator},
    EvaluationOutcome, Pipeline,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref(), &cli.overrides())?;

    init_logging(&config.logging)?;

    // Bad flag combinations fail before the session is built
    config.validate()?;
    info!(
        model = %config.model.input,
        corpus = %config.corpus.path,
        threads = config.model.threads,
        batch_size = config.corpus.batch_size,
        "Configuration loaded"
    );

    let loader = ModelLoader::from_config(&config.model);
    let (spec, model) = loader.load_model(&config.model)?;
    info!(
        components = spec.components().len(),
        checkpoint = %model.checkpoint.display(),
        "Parser restored"
    );

    let mut annotator = OnnxAnnotator::new(model);
    let summary = Pipeline::new(&config).run(&mut annotator)?;

    match &summary.evaluation {
        Some(EvaluationOutcome::Completed { report }) => {
            info!(
                metric = %report.overall_metric,
                value = report.overall,
                docs = summary.documents,
                "Run complete"
            );
        }
        Some(EvaluationOutcome::Failed { exit_code, .. }) => {
            info!(
                exit_code = ?exit_code,
                docs = summary.documents,
                "Run complete, evaluation failed"
            );
        }
        None => info!(docs = summary.documents, "Run complete"),
    }

    Ok(())
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("{},ort=warn", logging.level)))?;

    if logging.format == "json" {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}
