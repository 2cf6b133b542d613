//! Core data models for manuscripts and screening results.

mod article;
mod record;
mod relevance;
mod run;

pub use article::{ArticleClassification, ArticleType};
pub use record::ManuscriptRecord;
pub use relevance::{ComponentScores, TopicRelevanceScore};
pub use run::{
    ScreeningRun, ARTICLE_TYPE_EXCLUDED, DUPLICATES_FOUND, LANGUAGE_EXCLUDED,
    TOPIC_RELEVANCE_EXCLUDED,
};
