//! Screening filters.
//!
//! Each filter implements [`Filter`] and is applied by the pipeline in a
//! fixed order: deduplication, language, article type, topic relevance.
//! A filter only ever looks at records that are still included, and it can
//! add tags to them or exclude them. It never touches a record an earlier
//! filter excluded.
//!
//! Every filter has a rule-based mode and an AI-assisted mode. The AI mode
//! sends one batched request through [`AiAssist`](crate::extraction::AiAssist)
//! and falls back to rule-based results, or to neutral values, when the
//! service is unavailable.

pub mod article_type;
pub mod dedup;
pub mod language;
pub mod topic;

pub use article_type::{classify, ArticleTypeFilter};
pub use dedup::{find_duplicates, DeduplicationFilter, DuplicateMap};
pub use language::{detect_language, language_name, LanguageFilter};
pub use topic::{TopicProfile, TopicRelevanceFilter};

use async_trait::async_trait;
use std::fmt::Debug;

use crate::extraction::AiAssist;
use crate::models::ManuscriptRecord;

/// Errors that abort a screening run.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("Invalid filter configuration: {0}")]
    Config(String),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// A pipeline stage.
#[async_trait]
pub trait Filter: Send + Sync + Debug {
    /// Human-readable name for logs
    fn name(&self) -> &'static str;

    /// Key under which the exclusion count is reported
    fn statistic_key(&self) -> &'static str;

    /// Whether this run will call the extraction service
    fn uses_ai(&self) -> bool;

    /// Tag and possibly exclude the still-included records.
    ///
    /// Returns the number of records this filter excluded.
    async fn apply(&self, records: &mut [ManuscriptRecord]) -> Result<usize, FilterError>;
}

/// AI assistance is used only when requested and at least one model exists.
pub(crate) fn active_ai(use_ai: bool, ai: &Option<AiAssist>) -> Option<&AiAssist> {
    ai.as_ref().filter(|assist| use_ai && assist.is_available())
}

/// Positions of records that are still included.
pub(crate) fn included_indices(records: &[ManuscriptRecord]) -> Vec<usize> {
    records
        .iter()
        .enumerate()
        .filter(|(_, record)| record.is_included())
        .map(|(index, _)| index)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModelConfig, Provider};
    use crate::extraction::MockExtractor;
    use std::sync::Arc;

    #[test]
    fn test_active_ai_requires_flag_and_models() {
        let with_models = Some(AiAssist::new(
            Arc::new(MockExtractor::new()),
            vec![ModelConfig::new(Provider::OpenAi, "m").with_api_key("k")],
        ));
        let without_models = Some(AiAssist::new(Arc::new(MockExtractor::new()), Vec::new()));

        assert!(active_ai(true, &with_models).is_some());
        assert!(active_ai(false, &with_models).is_none());
        assert!(active_ai(true, &without_models).is_none());
        assert!(active_ai(true, &None).is_none());
    }

    #[test]
    fn test_included_indices() {
        let mut records = vec![
            ManuscriptRecord::from_pairs("1", &[("title", "a")], ""),
            ManuscriptRecord::from_pairs("2", &[("title", "b")], ""),
        ];
        records[0].exclude("gone");
        assert_eq!(included_indices(&records), vec![1]);
    }
}
