//! Configuration management for the parser runner
//!
//! Values are layered, lowest precedence first: built-in defaults, an
//! optional TOML file, `SEMPAR__*` environment variables, then command-line
//! flags.

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_THREADS: usize = 8;
pub const DEFAULT_BATCH_SIZE: usize = 1024;
pub const DEFAULT_INPUT_NAME: &str = "input_batch";
pub const DEFAULT_OUTPUT_NAME: &str = "annotations";
pub const DEFAULT_EVALUATOR: &str = "bazel-bin/nlp/parser/tools/evaluate-frames";
pub const DEFAULT_METRIC: &str = "SLOT_F1";

/// `SEMPAR__SECTION__KEY` variables, e.g. `SEMPAR__CORPUS__BATCH_SIZE=16`
pub fn environment() -> Environment {
    Environment::with_prefix("SEMPAR")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub model: ModelConfig,
    pub corpus: CorpusConfig,
    pub evaluation: EvaluationConfig,
    pub logging: LoggingConfig,
    /// Where to write the JSON run summary
    #[serde(default)]
    pub summary: Option<String>,
}

/// Model directory and session configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Directory holding `master_spec` and `checkpoints/best`
    pub input: String,
    /// Intra- and inter-op thread pool size for the session
    pub threads: usize,
    /// Name of the session input carrying the document batch
    pub input_name: String,
    /// Name of the session output carrying the annotated batch
    pub output_name: String,
    /// Custom operator library to register with the session
    #[serde(default)]
    pub op_library: Option<String>,
}

/// Corpus input/output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CorpusConfig {
    /// Zip archive or glob pattern of serialized documents
    pub path: String,
    /// Maximum number of documents per session call
    pub batch_size: usize,
    /// Zip archive to write annotated documents to
    #[serde(default)]
    pub output: Option<String>,
}

/// Evaluation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EvaluationConfig {
    /// Run the external evaluator after annotation
    pub enabled: bool,
    /// Gold corpus to evaluate against
    #[serde(default)]
    pub gold: Option<String>,
    /// Commons store shared by the gold and annotated corpora
    pub commons: String,
    /// Evaluator binary
    pub evaluator: String,
    /// Prefix of the metric line reported as the overall score
    pub metric: String,
    /// Treat a failing evaluator process as a fatal error
    pub strict: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

/// Values supplied on the command line.
///
/// `None` (or `false` for switches) leaves the lower layers untouched.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub input: Option<String>,
    pub commons: Option<String>,
    pub corpus: Option<String>,
    pub gold: Option<String>,
    pub output: Option<String>,
    pub threads: Option<usize>,
    pub batch_size: Option<usize>,
    pub eval: bool,
    pub strict_eval: bool,
    pub evaluator: Option<String>,
    pub op_library: Option<String>,
    pub summary: Option<String>,
}

impl AppConfig {
    /// Load configuration from defaults, an optional file, the environment,
    /// and command-line overrides
    pub fn load(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
        Self::load_with_env(path, overrides, environment())
    }

    /// Same as [`AppConfig::load`] with an explicit environment source
    pub fn load_with_env(
        path: Option<&Path>,
        overrides: &ConfigOverrides,
        env: Environment,
    ) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("model.input", "")?
            .set_default("model.threads", DEFAULT_THREADS as i64)?
            .set_default("model.input_name", DEFAULT_INPUT_NAME)?
            .set_default("model.output_name", DEFAULT_OUTPUT_NAME)?
            .set_default("corpus.path", "")?
            .set_default("corpus.batch_size", DEFAULT_BATCH_SIZE as i64)?
            .set_default("evaluation.enabled", false)?
            .set_default("evaluation.commons", "")?
            .set_default("evaluation.evaluator", DEFAULT_EVALUATOR)?
            .set_default("evaluation.metric", DEFAULT_METRIC)?
            .set_default("evaluation.strict", false)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        builder = builder
            .add_source(env)
            .set_override_option("model.input", overrides.input.clone())?
            .set_override_option("model.threads", overrides.threads.map(|t| t as i64))?
            .set_override_option("model.op_library", overrides.op_library.clone())?
            .set_override_option("corpus.path", overrides.corpus.clone())?
            .set_override_option("corpus.batch_size", overrides.batch_size.map(|b| b as i64))?
            .set_override_option("corpus.output", overrides.output.clone())?
            .set_override_option("evaluation.enabled", overrides.eval.then_some(true))?
            .set_override_option("evaluation.strict", overrides.strict_eval.then_some(true))?
            .set_override_option("evaluation.gold", overrides.gold.clone())?
            .set_override_option("evaluation.commons", overrides.commons.clone())?
            .set_override_option("evaluation.evaluator", overrides.evaluator.clone())?
            .set_override_option("summary", overrides.summary.clone())?;

        let config: AppConfig = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        Ok(config.normalized())
    }

    /// Load configuration from a specific file with no overrides
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load(Some(path.as_ref()), &ConfigOverrides::default())
    }

    /// Check that the configuration describes a runnable job.
    ///
    /// Called before the model is loaded, so a bad flag combination never
    /// costs a session build or an evaluator launch.
    pub fn validate(&self) -> Result<()> {
        if self.model.input.is_empty() {
            bail!("Need to provide --input model directory");
        }
        if self.corpus.path.is_empty() {
            bail!("Need to provide --corpus");
        }
        if self.model.threads == 0 {
            bail!("--threads must be at least 1");
        }
        if self.corpus.batch_size == 0 {
            bail!("--batch_size must be at least 1");
        }
        if self.evaluation.enabled {
            self.evaluation_paths()?;
        }
        Ok(())
    }

    /// The `(gold, output)` pair evaluation needs
    pub fn evaluation_paths(&self) -> Result<(&str, &str)> {
        let Some(output) = self.corpus.output.as_deref() else {
            bail!("Need to provide --output for evaluation");
        };
        let Some(gold) = self.evaluation.gold.as_deref() else {
            bail!("Need to provide --gold for evaluation");
        };
        Ok((gold, output))
    }

    /// Empty strings mean "not set" for optional paths
    fn normalized(mut self) -> Self {
        fn clear_empty(value: &mut Option<String>) {
            if value.as_deref().is_some_and(str::is_empty) {
                *value = None;
            }
        }
        clear_empty(&mut self.model.op_library);
        clear_empty(&mut self.corpus.output);
        clear_empty(&mut self.evaluation.gold);
        clear_empty(&mut self.summary);
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig {
                input: String::new(),
                threads: DEFAULT_THREADS,
                input_name: DEFAULT_INPUT_NAME.to_string(),
                output_name: DEFAULT_OUTPUT_NAME.to_string(),
                op_library: None,
            },
            corpus: CorpusConfig {
                path: String::new(),
                batch_size: DEFAULT_BATCH_SIZE,
                output: None,
            },
            evaluation: EvaluationConfig {
                enabled: false,
                gold: None,
                commons: String::new(),
                evaluator: DEFAULT_EVALUATOR.to_string(),
                metric: DEFAULT_METRIC.to_string(),
                strict: false,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
            summary: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn load(path: Option<&Path>, overrides: &ConfigOverrides, vars: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::load_with_env(path, overrides, environment().source(Some(vars)))
    }

    fn runnable() -> ConfigOverrides {
        ConfigOverrides {
            input: Some("model".to_string()),
            corpus: Some("corpus.zip".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.model.threads, 8);
        assert_eq!(config.corpus.batch_size, 1024);
        assert_eq!(config.model.input_name, "input_batch");
        assert_eq!(config.evaluation.metric, "SLOT_F1");
        assert!(!config.evaluation.enabled);
    }

    #[test]
    fn test_load_applies_defaults_and_overrides() {
        let overrides = ConfigOverrides {
            threads: Some(2),
            output: Some("out.zip".to_string()),
            ..runnable()
        };
        let config = load(None, &overrides, &[]).unwrap();

        assert_eq!(config.model.input, "model");
        assert_eq!(config.model.threads, 2);
        assert_eq!(config.corpus.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.corpus.output.as_deref(), Some("out.zip"));
        assert_eq!(config.evaluation.evaluator, DEFAULT_EVALUATOR);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[corpus]\nbatch_size = 16\noutput = \"\"\n\n[evaluation]\nmetric = \"FRAME_F1\"\n"
        )
        .unwrap();

        let overrides = ConfigOverrides {
            batch_size: Some(32),
            ..runnable()
        };
        let config = load(Some(file.path()), &overrides, &[]).unwrap();

        assert_eq!(config.corpus.batch_size, 32);
        assert_eq!(config.corpus.output, None);
        assert_eq!(config.evaluation.metric, "FRAME_F1");
    }

    #[test]
    fn test_env_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[corpus]\nbatch_size = 16\n\n[model]\ninput_name = \"tokens\"\n").unwrap();

        let config = load(
            Some(file.path()),
            &runnable(),
            &[
                ("SEMPAR__CORPUS__BATCH_SIZE", "64"),
                ("SEMPAR__MODEL__INPUT_NAME", "docs"),
            ],
        )
        .unwrap();

        assert_eq!(config.corpus.batch_size, 64);
        assert_eq!(config.model.input_name, "docs");
    }

    #[test]
    fn test_cli_overrides_env() {
        let overrides = ConfigOverrides {
            threads: Some(2),
            ..runnable()
        };
        let config = load(
            None,
            &overrides,
            &[("SEMPAR__MODEL__THREADS", "4"), ("SEMPAR__CORPUS__BATCH_SIZE", "16")],
        )
        .unwrap();

        assert_eq!(config.model.threads, 2);
        assert_eq!(config.corpus.batch_size, 16);
    }

    #[test]
    fn test_unprefixed_env_ignored() {
        let config = load(None, &runnable(), &[("CORPUS__BATCH_SIZE", "3")]).unwrap();
        assert_eq!(config.corpus.batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn test_eval_requires_output() {
        let overrides = ConfigOverrides {
            eval: true,
            gold: Some("gold.zip".to_string()),
            ..runnable()
        };
        let config = load(None, &overrides, &[]).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("--output"));
    }

    #[test]
    fn test_eval_requires_gold() {
        let overrides = ConfigOverrides {
            eval: true,
            output: Some("out.zip".to_string()),
            ..runnable()
        };
        let config = load(None, &overrides, &[]).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("--gold"));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut config = AppConfig::default();
        config.model.input = "model".to_string();
        config.corpus.path = "corpus.zip".to_string();
        config.corpus.batch_size = 0;
        assert!(config.validate().is_err());
    }
}
