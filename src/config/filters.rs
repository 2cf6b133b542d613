//! Per-filter configuration sections.

use serde::{Deserialize, Serialize};

use super::ModelConfig;

/// `[filters]` table: every filter plus the shared model list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiltersConfig {
    /// Pause between two consecutive AI-assisted filters, in seconds
    #[serde(default = "default_cooldown")]
    pub ai_cooldown_secs: u64,

    #[serde(default)]
    pub deduplication: DeduplicationConfig,

    #[serde(default)]
    pub language: LanguageConfig,

    #[serde(default)]
    pub article_type: ArticleTypeConfig,

    #[serde(default)]
    pub topic_relevance: TopicRelevanceConfig,

    /// Models forwarded to the extraction service
    #[serde(default)]
    pub llm: Vec<ModelConfig>,
}

impl Default for FiltersConfig {
    fn default() -> Self {
        Self {
            ai_cooldown_secs: default_cooldown(),
            deduplication: DeduplicationConfig::default(),
            language: LanguageConfig::default(),
            article_type: ArticleTypeConfig::default(),
            topic_relevance: TopicRelevanceConfig::default(),
            llm: Vec::new(),
        }
    }
}

fn default_cooldown() -> u64 {
    30
}

impl FiltersConfig {
    pub fn any_enabled(&self) -> bool {
        self.deduplication.enabled
            || self.language.enabled
            || self.article_type.enabled
            || self.topic_relevance.enabled
    }
}

/// Duplicate detection settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeduplicationConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub use_ai: bool,

    /// Columns to compare; `text` refers to the analysis text
    #[serde(default = "default_compare_fields")]
    pub compare_fields: Vec<String>,
}

fn default_compare_fields() -> Vec<String> {
    vec!["title".to_string(), "abstract".to_string()]
}

/// Language detection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageConfig {
    #[serde(default)]
    pub enabled: bool,

    /// ISO 639-1 codes, e.g. `["en", "es"]`
    #[serde(default = "default_languages")]
    pub accepted_languages: Vec<String>,

    #[serde(default)]
    pub use_ai: bool,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            accepted_languages: default_languages(),
            use_ai: false,
        }
    }
}

fn default_languages() -> Vec<String> {
    vec!["en".to_string()]
}

impl LanguageConfig {
    pub fn accepts(&self, language: &str) -> bool {
        self.accepted_languages
            .iter()
            .any(|accepted| accepted.trim().eq_ignore_ascii_case(language))
    }
}

/// Article type classification settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArticleTypeConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub use_ai: bool,

    // Publication types
    #[serde(default)]
    pub exclude_reviews: bool,
    #[serde(default)]
    pub exclude_editorials: bool,
    #[serde(default)]
    pub exclude_letters: bool,
    #[serde(default)]
    pub exclude_case_reports: bool,
    #[serde(default)]
    pub exclude_commentaries: bool,
    #[serde(default)]
    pub exclude_perspectives: bool,

    // Methodological types
    #[serde(default)]
    pub exclude_theoretical: bool,
    #[serde(default)]
    pub exclude_empirical: bool,
    #[serde(default)]
    pub exclude_methods: bool,

    // Study scope
    #[serde(default)]
    pub exclude_single_case: bool,
    #[serde(default)]
    pub exclude_sample: bool,

    /// Allow-list; when non-empty it replaces every exclude switch
    #[serde(default)]
    pub include_types: Vec<String>,
}

/// Topic relevance settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicRelevanceConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub use_ai: bool,

    /// Free-text topic descriptions
    #[serde(default)]
    pub topics: Vec<String>,

    #[serde(default = "default_min_score")]
    pub min_score: f64,

    #[serde(default)]
    pub score_weights: ScoreWeights,
}

impl Default for TopicRelevanceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            use_ai: false,
            topics: Vec::new(),
            min_score: default_min_score(),
            score_weights: ScoreWeights::default(),
        }
    }
}

fn default_min_score() -> f64 {
    0.5
}

/// Weights for the three relevance components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    #[serde(default)]
    pub keyword_match: f64,
    #[serde(default)]
    pub concept_match: f64,
    #[serde(default)]
    pub field_relevance: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            keyword_match: 0.4,
            concept_match: 0.4,
            field_relevance: 0.2,
        }
    }
}

impl ScoreWeights {
    pub fn total(&self) -> f64 {
        self.keyword_match + self.concept_match + self.field_relevance
    }

    /// Falls back to the defaults when every weight is zero.
    pub fn effective(&self) -> Self {
        if self.total() <= 0.0 {
            Self::default()
        } else {
            *self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let filters = FiltersConfig::default();
        assert!(!filters.any_enabled());
        assert_eq!(filters.ai_cooldown_secs, 30);
        assert_eq!(filters.topic_relevance.min_score, 0.5);
        assert!((filters.topic_relevance.score_weights.total() - 1.0).abs() < 1e-9);
        assert_eq!(filters.deduplication.compare_fields, vec!["title", "abstract"]);
    }

    #[test]
    fn test_language_acceptance_ignores_case() {
        let config = LanguageConfig {
            enabled: true,
            accepted_languages: vec!["EN".to_string(), " es".to_string()],
            use_ai: false,
        };
        assert!(config.accepts("en"));
        assert!(config.accepts("ES"));
        assert!(!config.accepts("fr"));
    }

    #[test]
    fn test_zero_weights_fall_back() {
        let zero = ScoreWeights {
            keyword_match: 0.0,
            concept_match: 0.0,
            field_relevance: 0.0,
        };
        assert_eq!(zero.effective(), ScoreWeights::default());

        let custom = ScoreWeights {
            keyword_match: 1.0,
            concept_match: 0.0,
            field_relevance: 0.0,
        };
        assert_eq!(custom.effective(), custom);
    }

    #[test]
    fn test_partial_weights_table() {
        let config: TopicRelevanceConfig =
            toml::from_str("enabled = true\ntopics = [\"x\"]\n[score_weights]\nkeyword_match = 1.0")
                .unwrap();
        assert_eq!(config.score_weights.keyword_match, 1.0);
        assert_eq!(config.score_weights.concept_match, 0.0);
        assert_eq!(config.min_score, 0.5);
    }
}
