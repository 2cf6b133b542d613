//! Screening configuration.
//!
//! A run is described by one TOML document with a `[project]` table and a
//! `[filters]` table. Values can be overridden from the environment with the
//! `SCREENER_` prefix and `__` as the section separator, for example
//! `SCREENER_PROJECT__OUTPUT_FORMAT=json`.

mod file_config;
mod filters;
mod model;

pub use filters::{
    ArticleTypeConfig, DeduplicationConfig, FiltersConfig, LanguageConfig, ScoreWeights,
    TopicRelevanceConfig,
};
pub use model::{ModelConfig, Provider};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "SCREENER";

/// Default configuration file name looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "screening.toml";

/// Full screening configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScreeningConfig {
    #[serde(default)]
    pub project: ProjectConfig,

    #[serde(default)]
    pub filters: FiltersConfig,
}

/// `[project]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub author: String,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub input_file: String,

    /// Output path without extension; `.csv` or `.json` is appended
    #[serde(default)]
    pub output_file: String,

    /// Column holding abstract text or a path to a text file
    #[serde(default)]
    pub text_column: String,

    /// Informational only; records are identified by row number
    #[serde(default)]
    pub identifier_column: String,

    #[serde(default)]
    pub output_format: OutputFormat,

    #[serde(default)]
    pub log_level: LogLevel,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            author: String::new(),
            version: "1.0".to_string(),
            input_file: String::new(),
            output_file: String::new(),
            text_column: String::new(),
            identifier_column: String::new(),
            output_format: OutputFormat::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl ProjectConfig {
    /// Output path with the format extension appended.
    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(format!(
            "{}.{}",
            self.output_file,
            self.output_format.extension()
        ))
    }

    /// Path of the detailed per-record log written at `high` verbosity.
    pub fn detail_log_path(&self) -> PathBuf {
        PathBuf::from(format!("{}_log.txt", self.output_file))
    }
}

/// Result file format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            other => Err(ConfigError::InvalidValue {
                field: "output_format",
                reason: format!("unsupported format '{}'", other),
            }),
        }
    }
}

/// Summary verbosity after a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Low,
    Medium,
    High,
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("at least one filter must be enabled")]
    NoFilterEnabled,

    #[error("topic_relevance is enabled but no topics are configured")]
    NoTopics,

    #[error("invalid {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("LLM model #{index} ({provider}): {reason}")]
    InvalidModel {
        index: usize,
        provider: String,
        reason: String,
    },

    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialize error: {0}")]
    Serialize(String),
}

impl ScreeningConfig {
    /// Check everything a run needs before any record is touched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.project.input_file.trim().is_empty() {
            return Err(ConfigError::MissingField("input_file"));
        }
        if self.project.output_file.trim().is_empty() {
            return Err(ConfigError::MissingField("output_file"));
        }
        if self.project.text_column.trim().is_empty() {
            return Err(ConfigError::MissingField("text_column"));
        }
        self.validate_filters()
    }

    /// Filter-level checks, shared with callers that bypass file I/O.
    pub fn validate_filters(&self) -> Result<(), ConfigError> {
        let filters = &self.filters;
        if !filters.any_enabled() {
            return Err(ConfigError::NoFilterEnabled);
        }

        if filters.deduplication.enabled
            && filters.deduplication.compare_fields.iter().all(|f| f.trim().is_empty())
        {
            return Err(ConfigError::MissingField("deduplication.compare_fields"));
        }
        if filters.language.enabled
            && filters.language.accepted_languages.iter().all(|l| l.trim().is_empty())
        {
            return Err(ConfigError::MissingField("language.accepted_languages"));
        }

        let topic = &filters.topic_relevance;
        if topic.enabled {
            if topic.topics.iter().all(|t| t.trim().is_empty()) {
                return Err(ConfigError::NoTopics);
            }
            if !(0.0..=1.0).contains(&topic.min_score) {
                return Err(ConfigError::InvalidValue {
                    field: "min_score",
                    reason: format!("{} is outside 0..=1", topic.min_score),
                });
            }
            let weights = topic.score_weights;
            if weights.keyword_match < 0.0
                || weights.concept_match < 0.0
                || weights.field_relevance < 0.0
            {
                return Err(ConfigError::InvalidValue {
                    field: "score_weights",
                    reason: "weights must not be negative".to_string(),
                });
            }
        }

        for (index, model) in filters.llm.iter().enumerate() {
            model.validate(index)?;
        }

        Ok(())
    }
}

/// Load configuration from a file, applying environment overrides.
pub fn load_config(path: &Path) -> Result<ScreeningConfig, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Find the configuration file to use when none is given explicitly.
///
/// Looks for `screening.toml` in the working directory, then
/// `<config dir>/manuscript-screener/config.toml`.
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("manuscript-screener").join("config.toml"))
        .filter(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runnable() -> ScreeningConfig {
        let mut config = ScreeningConfig::default();
        config.project.input_file = "in.csv".to_string();
        config.project.output_file = "out".to_string();
        config.project.text_column = "abstract".to_string();
        config.filters.deduplication.enabled = true;
        config
    }

    #[test]
    fn test_default_config() {
        let config = ScreeningConfig::default();
        assert_eq!(config.project.output_format, OutputFormat::Csv);
        assert_eq!(config.project.log_level, LogLevel::Low);
        assert!(!config.filters.any_enabled());
    }

    #[test]
    fn test_validate_requires_project_fields() {
        let mut config = runnable();
        assert!(config.validate().is_ok());

        config.project.text_column.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField("text_column"))
        ));
    }

    #[test]
    fn test_validate_requires_a_filter() {
        let mut config = runnable();
        config.filters.deduplication.enabled = false;
        assert!(matches!(config.validate(), Err(ConfigError::NoFilterEnabled)));
    }

    #[test]
    fn test_validate_rejects_empty_filter_lists() {
        let mut config = runnable();
        config.filters.deduplication.compare_fields = vec![" ".to_string()];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField("deduplication.compare_fields"))
        ));

        let mut config = runnable();
        config.filters.language.enabled = true;
        config.filters.language.accepted_languages.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField("language.accepted_languages"))
        ));

        config.filters.language.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_topic_relevance_alone_counts_as_enabled() {
        let mut config = runnable();
        config.filters.deduplication.enabled = false;
        config.filters.topic_relevance.enabled = true;
        assert!(matches!(config.validate(), Err(ConfigError::NoTopics)));

        config.filters.topic_relevance.topics = vec!["soil carbon".to_string()];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_model_rejected() {
        let mut config = runnable();
        config
            .filters
            .llm
            .push(ModelConfig::new(Provider::OpenAi, "gpt-4o-mini"));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidModel { index: 0, .. })
        ));
    }

    #[test]
    fn test_output_paths() {
        let mut config = runnable();
        assert_eq!(config.project.output_path(), PathBuf::from("out.csv"));
        config.project.output_format = OutputFormat::Json;
        assert_eq!(config.project.output_path(), PathBuf::from("out.json"));
        assert_eq!(config.project.detail_log_path(), PathBuf::from("out_log.txt"));
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("screening.toml");
        std::fs::write(
            &path,
            r#"
[project]
input_file = "records.csv"
output_file = "screened"
text_column = "Abstract"
output_format = "json"
log_level = "medium"

[filters.language]
enabled = true
accepted_languages = ["en", "de"]
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.project.text_column, "Abstract");
        assert_eq!(config.project.output_format, OutputFormat::Json);
        assert_eq!(config.project.log_level, LogLevel::Medium);
        assert!(config.filters.language.enabled);
        assert_eq!(config.filters.language.accepted_languages, vec!["en", "de"]);
        assert_eq!(config.filters.ai_cooldown_secs, 30);
    }
}
