//! Article-type classification and filtering.

mod scoring;

pub use scoring::{classify, score_article, select_classification, SAMPLE_CHARS, SIGNIFICANT_SCORE};

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{active_ai, included_indices, Filter, FilterError};
use crate::config::ArticleTypeConfig;
use crate::extraction::{parse_json_reply, AiAssist};
use crate::models::{ArticleClassification, ArticleType, ManuscriptRecord, ARTICLE_TYPE_EXCLUDED};

/// Score given to every type an AI reply names.
pub const AI_TYPE_SCORE: f64 = 20.0;

const REVIEW_TYPES: &[ArticleType] = &[
    ArticleType::Review,
    ArticleType::SystematicReview,
    ArticleType::MetaAnalysis,
];

#[derive(Debug, Deserialize)]
struct ClassificationReply {
    #[serde(default)]
    primary_type: String,
    #[serde(default)]
    all_types: Vec<String>,
    #[serde(default)]
    methodological_types: Vec<String>,
    #[serde(default)]
    scope_types: Vec<String>,
}

fn parse_labels(labels: &[String]) -> Vec<ArticleType> {
    let mut types = Vec::new();
    for article_type in labels.iter().map(|l| ArticleType::parse_label(l)) {
        if article_type != ArticleType::Unknown && !types.contains(&article_type) {
            types.push(article_type);
        }
    }
    types
}

/// Turn a model reply into a classification. Every named type scores 20.
fn read_classification_reply(reply: &str) -> Option<ArticleClassification> {
    let parsed: ClassificationReply = parse_json_reply(reply).ok()?;

    let mut all_types = parse_labels(&parsed.all_types);
    let methodological_types = parse_labels(&parsed.methodological_types);
    let scope_types = parse_labels(&parsed.scope_types);

    let primary_type = match ArticleType::parse_label(&parsed.primary_type) {
        ArticleType::Unknown => all_types.first().copied().unwrap_or(ArticleType::Unknown),
        known => known,
    };
    if primary_type == ArticleType::Unknown {
        return None;
    }
    if !all_types.contains(&primary_type) {
        all_types.insert(0, primary_type);
    }

    let classification = ArticleClassification {
        primary_type,
        all_types,
        methodological_types,
        scope_types,
        type_scores: IndexMap::new(),
    };
    let type_scores = classification
        .distinct_types()
        .into_iter()
        .map(|t| (t, AI_TYPE_SCORE))
        .collect();

    Some(ArticleClassification {
        type_scores,
        ..classification
    })
}

fn classification_prompt(title: &str, abstract_text: &str) -> String {
    format!(
        r#"You are a scientific manuscript classification expert. Classify the manuscript below.

A manuscript can carry several overlapping types. For example a paper can be "research_article", "empirical_study" and "sample_study" at once, and a review can be both "review" and "systematic_review".

DIMENSIONS:

1. Publication type
   - research_article: original research with methods, results and conclusions
   - review: literature review without a systematic protocol (narrative, scoping)
   - systematic_review: review following a structured protocol such as PRISMA
   - meta_analysis: statistical synthesis of multiple studies
   - editorial: opinion piece by editors
   - letter: brief correspondence to the editor
   - case_report: report of a single patient, case or instance
   - commentary: comment on published work
   - perspective: author viewpoint

2. Methodological type
   - empirical_study: observation or experiment with data collection
   - theoretical_paper: conceptual work without empirical data
   - methods_paper: presents a new method, technique or protocol

3. Study scope (empirical work only)
   - single_case_study: in-depth analysis of one case, patient or organization (n=1)
   - sample_study: multiple subjects such as cohorts, surveys or cross-sectional designs

RULES:
- Types from all three dimensions may apply together
- A single case study is a scope, a case report is a publication type
- Empirical work is either single_case_study or sample_study
- Use "research_article" as the publication type when unsure

MANUSCRIPT:
Title: {}
Abstract: {}

Respond with ONLY a JSON object:
{{
  "primary_type": "most_specific_type",
  "all_types": ["type1", "type2"],
  "methodological_types": ["empirical_study"],
  "scope_types": ["sample_study"],
  "type_scores": {{"type1": 0.95, "type2": 0.80}}
}}"#,
        title, abstract_text
    )
}

/// Article-type stage.
#[derive(Debug, Clone)]
pub struct ArticleTypeFilter {
    config: ArticleTypeConfig,
    ai: Option<AiAssist>,
}

impl ArticleTypeFilter {
    pub fn new(config: ArticleTypeConfig, ai: Option<AiAssist>) -> Self {
        Self { config, ai }
    }

    fn switches(&self) -> [(bool, &'static [ArticleType], &'static str); 11] {
        let c = &self.config;
        [
            (c.exclude_reviews, REVIEW_TYPES, "review"),
            (c.exclude_editorials, &[ArticleType::Editorial], "editorial"),
            (c.exclude_letters, &[ArticleType::Letter], "letter"),
            (c.exclude_case_reports, &[ArticleType::CaseReport], "case_report"),
            (c.exclude_commentaries, &[ArticleType::Commentary], "commentary"),
            (c.exclude_perspectives, &[ArticleType::Perspective], "perspective"),
            (c.exclude_theoretical, &[ArticleType::TheoreticalPaper], "theoretical"),
            (c.exclude_empirical, &[ArticleType::EmpiricalStudy], "empirical"),
            (c.exclude_methods, &[ArticleType::MethodsPaper], "methods"),
            (c.exclude_single_case, &[ArticleType::SingleCaseStudy], "single_case"),
            (c.exclude_sample, &[ArticleType::SampleStudy], "sample_study"),
        ]
    }

    /// Exclusion reason for a classification, if any rule fires.
    pub fn exclusion_reason(&self, classification: &ArticleClassification) -> Option<String> {
        if !self.config.include_types.is_empty() {
            if classification.is_unknown() {
                return None;
            }
            let allowed: Vec<ArticleType> = self
                .config
                .include_types
                .iter()
                .map(|label| ArticleType::parse_label(label))
                .collect();
            if classification.has_any_type(&allowed) {
                return None;
            }
            return Some(format!(
                "Article type excluded: {} not in include_types",
                classification.primary_type
            ));
        }

        let labels: Vec<&str> = self
            .switches()
            .into_iter()
            .filter(|(enabled, types, _)| *enabled && classification.has_any_type(types))
            .map(|(_, _, label)| label)
            .collect();

        if labels.is_empty() {
            None
        } else {
            Some(format!("Article type excluded: {}", labels.join(", ")))
        }
    }

    /// Tag and judge one record. Returns `true` if it was excluded.
    fn record_classification(
        &self,
        record: &mut ManuscriptRecord,
        classification: &ArticleClassification,
    ) -> bool {
        for (key, value) in classification.tag_values() {
            record.add_tag(key, value);
        }
        match self.exclusion_reason(classification) {
            Some(reason) => {
                debug!("Record {}: {}", record.id(), reason);
                record.exclude(reason)
            }
            None => false,
        }
    }

    fn classify_by_rules(record: &ManuscriptRecord) -> Option<ArticleClassification> {
        if record.text().trim().is_empty() {
            warn!("Record {} has no text to classify, skipping", record.id());
            return None;
        }
        Some(classify(record.text()))
    }

    async fn classify_with_ai(
        &self,
        records: &[ManuscriptRecord],
        indices: &[usize],
        ai: &AiAssist,
    ) -> Vec<Option<ArticleClassification>> {
        let mut results: Vec<Option<ArticleClassification>> = vec![None; indices.len()];

        let mut slots = Vec::new();
        let mut prompts = Vec::new();
        for (slot, &index) in indices.iter().enumerate() {
            let record = &records[index];
            let title = record.field_or_empty("title").trim();
            let abstract_text = match record.field("abstract") {
                Some(value) if !value.trim().is_empty() => value.trim(),
                _ => record.text().trim(),
            };
            if title.is_empty() && abstract_text.is_empty() {
                continue;
            }
            slots.push(slot);
            prompts.push(classification_prompt(title, abstract_text));
        }

        if !prompts.is_empty() {
            info!(
                "Classifying {} manuscripts with {}",
                prompts.len(),
                ai.service_name()
            );
            match ai.batch(prompts).await {
                Ok(replies) => {
                    for (slot, reply) in slots.into_iter().zip(replies) {
                        results[slot] = reply.as_deref().and_then(read_classification_reply);
                        if results[slot].is_none() {
                            debug!(
                                "No usable classification for record {}, using rules",
                                records[indices[slot]].id()
                            );
                        }
                    }
                }
                Err(e) => warn!("AI classification failed, using rule-based classification: {}", e),
            }
        }

        results
            .into_iter()
            .zip(indices)
            .map(|(result, &index)| result.or_else(|| Self::classify_by_rules(&records[index])))
            .collect()
    }
}

#[async_trait]
impl Filter for ArticleTypeFilter {
    fn name(&self) -> &'static str {
        "article type"
    }

    fn statistic_key(&self) -> &'static str {
        ARTICLE_TYPE_EXCLUDED
    }

    fn uses_ai(&self) -> bool {
        active_ai(self.config.use_ai, &self.ai).is_some()
    }

    async fn apply(&self, records: &mut [ManuscriptRecord]) -> Result<usize, FilterError> {
        let indices = included_indices(records);

        let classifications = match active_ai(self.config.use_ai, &self.ai) {
            Some(ai) => self.classify_with_ai(records, &indices, ai).await,
            None => indices
                .iter()
                .map(|&index| Self::classify_by_rules(&records[index]))
                .collect(),
        };

        let mut excluded = 0;
        for (&index, classification) in indices.iter().zip(classifications) {
            let Some(classification) = classification else {
                continue;
            };
            if self.record_classification(&mut records[index], &classification) {
                excluded += 1;
            }
        }

        info!("Article type filter: {} records excluded", excluded);
        Ok(excluded)
    }
}
