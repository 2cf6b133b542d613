//! TOML file support for screening configurations.
//!
//! # Configuration File Format
//!
//! ```toml
//! [project]
//! name = "Coastal adaptation review"
//! input_file = "records.csv"
//! output_file = "screened"
//! text_column = "abstract"
//! output_format = "csv"      # csv | json
//! log_level = "medium"       # low | medium | high
//!
//! [filters]
//! ai_cooldown_secs = 30
//!
//! [filters.deduplication]
//! enabled = true
//! compare_fields = ["doi", "title", "authors", "year"]
//!
//! [filters.language]
//! enabled = true
//! accepted_languages = ["en"]
//!
//! [filters.article_type]
//! enabled = true
//! exclude_editorials = true
//! exclude_letters = true
//!
//! [filters.topic_relevance]
//! enabled = true
//! topics = ["climate change adaptation in coastal cities"]
//! min_score = 0.4
//!
//! [[filters.llm]]
//! provider = "openai"
//! api_key = "sk-..."
//! model = "gpt-4o-mini"
//! rpm_limit = 60
//! ```

use std::path::Path;

use super::{ConfigError, ScreeningConfig};

impl ScreeningConfig {
    /// Parse a configuration held in memory.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load a TOML file without environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Render as pretty TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_toml_string()?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))
    }

    /// Starter configuration written by `manuscript-screener init`.
    pub fn starter() -> Self {
        let mut config = Self::default();
        config.project.name = "Screening project".to_string();
        config.project.input_file = "records.csv".to_string();
        config.project.output_file = "screened".to_string();
        config.project.text_column = "abstract".to_string();
        config.project.identifier_column = "id".to_string();
        config.filters.deduplication.enabled = true;
        config.filters.language.enabled = true;
        config.filters.article_type.enabled = true;
        config.filters.article_type.exclude_editorials = true;
        config.filters.article_type.exclude_letters = true;
        config
    }
}
