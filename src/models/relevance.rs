//! Topic relevance score value object.

use serde::{Deserialize, Serialize};

/// Individual components that make up a relevance score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    #[serde(default)]
    pub keyword_match: f64,
    #[serde(default)]
    pub concept_match: f64,
    #[serde(default)]
    pub field_relevance: f64,
}

/// Relevance of one manuscript to the configured topics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopicRelevanceScore {
    /// Combined score in `0.0..=1.0`
    #[serde(default)]
    pub overall_score: f64,
    #[serde(default)]
    pub component_scores: ComponentScores,
    #[serde(default)]
    pub matched_keywords: Vec<String>,
    #[serde(default)]
    pub matched_concepts: Vec<String>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub is_relevant: bool,
}

impl TopicRelevanceScore {
    /// Score used when nothing could be assessed.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Recompute `is_relevant` from the threshold, ignoring whatever was there.
    pub fn with_threshold(mut self, min_score: f64) -> Self {
        self.is_relevant = self.overall_score >= min_score;
        self
    }

    pub fn tag_values(&self) -> Vec<(&'static str, serde_json::Value)> {
        vec![
            ("topic_relevance_score", serde_json::json!(self.overall_score)),
            ("topic_relevance_confidence", serde_json::json!(self.confidence)),
            ("matched_keywords", serde_json::json!(self.matched_keywords)),
            ("matched_concepts", serde_json::json!(self.matched_concepts)),
        ]
    }
}
