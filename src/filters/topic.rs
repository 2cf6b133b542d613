//! Topic relevance scoring and filtering.
//!
//! Topics are free-text descriptions. They are decomposed once into
//! single-word keywords and 2/3-word phrase concepts, and every manuscript is
//! scored against that [`TopicProfile`].

use async_trait::async_trait;
use indexmap::IndexMap;
use regex::Regex;
use tracing::{debug, info, warn};

use super::{active_ai, included_indices, Filter, FilterError};
use crate::config::{ScoreWeights, TopicRelevanceConfig};
use crate::extraction::{parse_json_reply, AiAssist};
use crate::models::{ComponentScores, ManuscriptRecord, TopicRelevanceScore, TOPIC_RELEVANCE_EXCLUDED};
use crate::utils::text::truncate_chars;

/// Threshold applied by [`TopicProfile::score`] before a filter re-checks it.
pub const DEFAULT_MIN_SCORE: f64 = 0.5;

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "was", "are", "were", "been", "be", "have", "has", "had", "do", "does",
    "did", "will", "would", "should", "could", "may", "might", "must", "can", "this", "that",
    "these", "those", "i", "you", "he", "she", "it", "we", "they",
];

/// Fields read, in order, to build the text that gets scored.
const RELEVANT_FIELDS: &[&str] = &[
    "title",
    "abstract",
    "keywords",
    "subject",
    "research_area",
    "methodology",
    "objectives",
    "summary",
    "introduction",
];

/// Column-name fragments that mark extra topical columns.
const TOPICAL_COLUMN_HINTS: &[&str] = &["keyword", "subject", "topic"];

/// Column-name fragments that mark journal or discipline columns.
const FIELD_COLUMN_HINTS: &[&str] = &["journal", "field", "discipline", "category", "subject_area"];

const AI_PRIORITY_FIELDS: &[&str] = &["title", "abstract", "keywords", "journal", "subject_area", "methodology"];
const AI_EXTRA_HINTS: &[&str] = &["topic", "subject", "category", "research"];

/// Lowercase and keep only `[a-z0-9 -]`, then split into words.
fn clean_words(text: &str) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() || *c == '-')
        .collect();
    cleaned.split_whitespace().map(str::to_string).collect()
}

fn keywords_of(text: &str) -> Vec<String> {
    clean_words(text)
        .into_iter()
        .filter(|w| w.chars().count() > 2 && !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

fn concepts_of(text: &str) -> Vec<String> {
    let words = clean_words(text);
    let pairs = words.windows(2).map(|w| w.join(" "));
    let triples = words.windows(3).map(|w| w.join(" "));
    pairs.chain(triples).collect()
}

fn dedup_in_order(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items.into_iter().filter(|item| seen.insert(item.clone())).collect()
}

/// Case-insensitive lookup of the first non-empty value for `field`.
fn lookup<'a>(fields: &'a IndexMap<String, String>, field: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(key, value)| key.eq_ignore_ascii_case(field) && !value.is_empty())
        .map(|(_, value)| value.as_str())
}

/// Text that topic scoring looks at, joined with spaces.
fn relevant_text(fields: &IndexMap<String, String>) -> String {
    let mut parts: Vec<&str> = RELEVANT_FIELDS
        .iter()
        .filter_map(|field| lookup(fields, field))
        .collect();

    for (key, value) in fields {
        let key = key.to_lowercase();
        if value.is_empty() || !TOPICAL_COLUMN_HINTS.iter().any(|hint| key.contains(hint)) {
            continue;
        }
        if !parts.contains(&value.as_str()) {
            parts.push(value);
        }
    }

    parts.join(" ")
}

fn field_band(matches: usize) -> f64 {
    match matches {
        0 => 0.2,
        1..=2 => 0.5,
        3..=5 => 0.7,
        _ => 0.9,
    }
}

/// Score from both match count and the amount of text available.
fn confidence(text: &str, matches: usize) -> f64 {
    let words = text.split_whitespace().count() as f64;
    (words / 500.0).min(1.0) * 0.6 + (matches as f64 / 10.0).min(1.0) * 0.4
}

/// Topics decomposed into matchable keywords and concepts.
#[derive(Debug, Clone)]
pub struct TopicProfile {
    topics: Vec<String>,
    keywords: Vec<String>,
    keyword_patterns: Vec<Regex>,
    concepts: Vec<String>,
    /// Keywords per topic, not deduplicated
    field_keywords: Vec<String>,
}

impl TopicProfile {
    pub fn new(topics: &[String]) -> Result<Self, FilterError> {
        let topics: Vec<String> = topics
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if topics.is_empty() {
            return Err(FilterError::Config(
                "topic relevance requires at least one topic".to_string(),
            ));
        }

        let field_keywords: Vec<String> = topics.iter().flat_map(|t| keywords_of(t)).collect();
        let keywords = dedup_in_order(field_keywords.clone());
        let concepts = dedup_in_order(topics.iter().flat_map(|t| concepts_of(t)).collect());

        let keyword_patterns = keywords
            .iter()
            .map(|k| Regex::new(&format!(r"\b{}\b", regex::escape(k))))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            topics,
            keywords,
            keyword_patterns,
            concepts,
            field_keywords,
        })
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn concepts(&self) -> &[String] {
        &self.concepts
    }

    fn keyword_score(&self, text: &str) -> (f64, Vec<String>) {
        let matched: Vec<String> = self
            .keywords
            .iter()
            .zip(&self.keyword_patterns)
            .filter(|(_, pattern)| pattern.is_match(text))
            .map(|(keyword, _)| keyword.clone())
            .collect();
        (boosted_ratio(matched.len(), self.keywords.len()), matched)
    }

    fn concept_score(&self, text: &str) -> (f64, Vec<String>) {
        let matched: Vec<String> = self
            .concepts
            .iter()
            .filter(|concept| text.contains(concept.as_str()))
            .cloned()
            .collect();
        (boosted_ratio(matched.len(), self.concepts.len()), matched)
    }

    fn field_score(&self, fields: &IndexMap<String, String>) -> f64 {
        let mut field_text = String::new();
        for hint in FIELD_COLUMN_HINTS {
            for (key, value) in fields {
                if !value.is_empty() && key.to_lowercase().contains(hint) {
                    field_text.push(' ');
                    field_text.push_str(value);
                }
            }
        }
        if field_text.is_empty() {
            return 0.5;
        }

        let field_text = field_text.to_lowercase();
        let matches = self
            .field_keywords
            .iter()
            .filter(|k| field_text.contains(k.as_str()))
            .count();
        field_band(matches)
    }

    /// Rule-based relevance of one manuscript.
    ///
    /// `is_relevant` is set against [`DEFAULT_MIN_SCORE`]; callers with a
    /// different threshold re-apply it with
    /// [`TopicRelevanceScore::with_threshold`].
    pub fn score(&self, fields: &IndexMap<String, String>, weights: &ScoreWeights) -> TopicRelevanceScore {
        let text = relevant_text(fields).to_lowercase();
        if text.trim().is_empty() {
            return TopicRelevanceScore {
                confidence: 0.5,
                ..TopicRelevanceScore::zero()
            };
        }

        let weights = weights.effective();
        let (keyword_match, matched_keywords) = self.keyword_score(&text);
        let (concept_match, matched_concepts) = self.concept_score(&text);
        let field_relevance = self.field_score(fields);

        let overall_score = (keyword_match * weights.keyword_match
            + concept_match * weights.concept_match
            + field_relevance * weights.field_relevance)
            / weights.total();

        TopicRelevanceScore {
            overall_score,
            component_scores: ComponentScores {
                keyword_match,
                concept_match,
                field_relevance,
            },
            confidence: confidence(&text, matched_keywords.len() + matched_concepts.len()),
            matched_keywords,
            matched_concepts,
            is_relevant: false,
        }
        .with_threshold(DEFAULT_MIN_SCORE)
    }
}

fn boosted_ratio(matched: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (matched as f64 / total as f64 * 1.5).min(1.0)
}

/// Original columns, plus the record text as `abstract` when that column is missing.
pub fn scoring_fields(record: &ManuscriptRecord) -> IndexMap<String, String> {
    let mut fields = record.original_data().clone();
    if record.column_name("abstract").is_none() {
        fields.insert("abstract".to_string(), record.text().to_string());
    }
    fields
}

fn ai_data(fields: &IndexMap<String, String>) -> Option<String> {
    let mut parts = Vec::new();
    for field in AI_PRIORITY_FIELDS {
        if let Some(value) = lookup(fields, field) {
            let value = if *field == "abstract" {
                truncate_chars(value, 1000)
            } else {
                value.to_string()
            };
            parts.push(format!("{}: {}", field.to_uppercase(), value));
        }
    }

    for (key, value) in fields {
        let lowered = key.to_lowercase();
        if value.is_empty() || AI_PRIORITY_FIELDS.iter().any(|f| lowered == *f) {
            continue;
        }
        if AI_EXTRA_HINTS.iter().any(|hint| lowered.contains(hint)) {
            parts.push(format!("{}: {}", key.to_uppercase(), value));
        }
    }

    (!parts.is_empty()).then(|| parts.join("\n"))
}

fn relevance_prompt(topics: &[String], data: &str) -> String {
    format!(
        r#"You are an expert in academic manuscript screening. Evaluate whether the manuscript below is relevant to the research topics.

TOPICS OF INTEREST:
- {}

MANUSCRIPT DATA:
{}

Consider direct keyword matches, conceptual alignment, field or domain relevance, methodological relevance and how well the research questions align with the topics.

Respond with ONLY a JSON object:
{{
  "overall_score": 0.75,
  "component_scores": {{"keyword_match": 0.8, "concept_match": 0.7, "field_relevance": 0.75}},
  "matched_keywords": ["keyword1", "keyword2"],
  "matched_concepts": ["concept1", "concept2"],
  "confidence": 0.85,
  "is_relevant": true,
  "reasoning": "one or two sentences"
}}
All scores are between 0.0 and 1.0."#,
        topics.join("\n- "),
        data
    )
}

/// Topic relevance stage.
#[derive(Debug, Clone)]
pub struct TopicRelevanceFilter {
    config: TopicRelevanceConfig,
    profile: TopicProfile,
    ai: Option<AiAssist>,
}

impl TopicRelevanceFilter {
    pub fn new(config: TopicRelevanceConfig, ai: Option<AiAssist>) -> Result<Self, FilterError> {
        if !(0.0..=1.0).contains(&config.min_score) {
            return Err(FilterError::Config(format!(
                "min_score must be between 0 and 1, got {}",
                config.min_score
            )));
        }
        let profile = TopicProfile::new(&config.topics)?;
        Ok(Self {
            config,
            profile,
            ai,
        })
    }

    pub fn profile(&self) -> &TopicProfile {
        &self.profile
    }

    async fn score_with_ai(
        &self,
        records: &[ManuscriptRecord],
        indices: &[usize],
        ai: &AiAssist,
    ) -> Vec<TopicRelevanceScore> {
        let mut scores = vec![TopicRelevanceScore::zero(); indices.len()];

        let mut slots = Vec::new();
        let mut prompts = Vec::new();
        for (slot, &index) in indices.iter().enumerate() {
            if let Some(data) = ai_data(&scoring_fields(&records[index])) {
                slots.push(slot);
                prompts.push(relevance_prompt(self.profile.topics(), &data));
            }
        }

        if prompts.is_empty() {
            return scores;
        }

        info!(
            "Assessing topic relevance of {} manuscripts with {}",
            prompts.len(),
            ai.service_name()
        );
        match ai.batch(prompts).await {
            Ok(replies) => {
                for (slot, reply) in slots.into_iter().zip(replies) {
                    let Some(reply) = reply else { continue };
                    match parse_json_reply::<TopicRelevanceScore>(&reply) {
                        Ok(score) => scores[slot] = score,
                        Err(e) => debug!(
                            "Unreadable relevance reply for record {}: {}",
                            records[indices[slot]].id(),
                            e
                        ),
                    }
                }
            }
            Err(e) => warn!("AI topic relevance failed, scoring as zero: {}", e),
        }
        scores
    }
}

#[async_trait]
impl Filter for TopicRelevanceFilter {
    fn name(&self) -> &'static str {
        "topic relevance"
    }

    fn statistic_key(&self) -> &'static str {
        TOPIC_RELEVANCE_EXCLUDED
    }

    fn uses_ai(&self) -> bool {
        active_ai(self.config.use_ai, &self.ai).is_some()
    }

    async fn apply(&self, records: &mut [ManuscriptRecord]) -> Result<usize, FilterError> {
        let indices = included_indices(records);

        let scores = match active_ai(self.config.use_ai, &self.ai) {
            Some(ai) => self.score_with_ai(records, &indices, ai).await,
            None => indices
                .iter()
                .map(|&index| {
                    self.profile
                        .score(&scoring_fields(&records[index]), &self.config.score_weights)
                })
                .collect(),
        };

        let min_score = self.config.min_score;
        let mut excluded = 0;
        for (&index, score) in indices.iter().zip(scores) {
            let score = score.with_threshold(min_score);
            let record = &mut records[index];
            for (key, value) in score.tag_values() {
                record.add_tag(key, value);
            }
            if !score.is_relevant
                && record.exclude(format!(
                    "Topic relevance score ({:.2}) below minimum threshold ({:.2})",
                    score.overall_score, min_score
                ))
            {
                excluded += 1;
            }
        }

        info!("Topic relevance filter: {} records excluded", excluded);
        Ok(excluded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModelConfig, Provider};
    use crate::extraction::MockExtractor;
    use std::sync::Arc;

    fn topics(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn fields(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_topic_decomposition() {
        let profile = TopicProfile::new(&topics(&["Climate change impacts on biodiversity"])).unwrap();
        assert_eq!(profile.keywords(), &["climate", "change", "impacts", "biodiversity"]);
        assert_eq!(profile.concepts().len(), 7);
        assert_eq!(profile.concepts()[0], "climate change");
        assert!(profile.concepts().contains(&"impacts on biodiversity".to_string()));
    }

    #[test]
    fn test_keywords_are_deduplicated_across_topics() {
        let profile =
            TopicProfile::new(&topics(&["Soil carbon", "Carbon cycle modelling", "  "])).unwrap();
        assert_eq!(profile.keywords(), &["soil", "carbon", "cycle", "modelling"]);
        assert_eq!(profile.topics().len(), 2);
    }

    #[test]
    fn test_no_topics_is_an_error() {
        assert!(matches!(
            TopicProfile::new(&topics(&[" "])),
            Err(FilterError::Config(_))
        ));
    }

    #[test]
    fn test_relevant_manuscript_scores_high() {
        let profile = TopicProfile::new(&topics(&["Climate change impacts on biodiversity"])).unwrap();
        let data = fields(&[
            ("Title", "Climate change and biodiversity loss"),
            ("abstract", "We study how climate change impacts biodiversity in alpine regions."),
        ]);

        let score = profile.score(&data, &ScoreWeights::default());
        assert!(approx(score.component_scores.keyword_match, 1.0));
        assert!(approx(score.component_scores.concept_match, 3.0 / 7.0 * 1.5));
        assert!(approx(score.component_scores.field_relevance, 0.5));
        assert!(approx(score.overall_score, 0.757));
        assert!(approx(score.confidence, 0.298));
        assert!(score.is_relevant);
        assert_eq!(
            score.matched_concepts,
            vec!["climate change", "change impacts", "climate change impacts"]
        );
    }

    #[test]
    fn test_repeated_topic_phrase_is_relevant() {
        let profile = TopicProfile::new(&topics(&["climate change adaptation"])).unwrap();
        let abstract_text = "Climate change adaptation in coastal towns. Funding for climate change \
            adaptation lags behind need. We compare climate change adaptation plans.";

        let score = profile
            .score(&fields(&[("abstract", abstract_text)]), &ScoreWeights::default())
            .with_threshold(0.5);
        assert!(approx(score.component_scores.keyword_match, 1.0));
        assert!(approx(score.component_scores.concept_match, 1.0));
        assert!(score.overall_score >= 0.5);
        assert!(score.is_relevant);
    }

    #[test]
    fn test_whole_word_keyword_matching() {
        let profile = TopicProfile::new(&topics(&["cat behaviour"])).unwrap();
        let score = profile.score(&fields(&[("title", "Concatenated behaviours")]), &ScoreWeights::default());
        assert!(score.matched_keywords.is_empty());
    }

    #[test]
    fn test_field_relevance_bands() {
        let profile = TopicProfile::new(&topics(&["Climate change impacts on biodiversity"])).unwrap();
        let score_for = |journal: &str| {
            profile
                .score(
                    &fields(&[("title", "Something"), ("Journal Name", journal)]),
                    &ScoreWeights::default(),
                )
                .component_scores
                .field_relevance
        };

        assert!(approx(score_for("Poetry Review"), 0.2));
        assert!(approx(score_for("Global Change Biology"), 0.5));
        assert!(approx(score_for("Biodiversity and Climate Change Impacts"), 0.7));
    }

    #[test]
    fn test_zero_weights_fall_back_to_defaults() {
        let profile = TopicProfile::new(&topics(&["soil carbon"])).unwrap();
        let data = fields(&[("title", "Soil carbon stocks")]);
        let zero = ScoreWeights {
            keyword_match: 0.0,
            concept_match: 0.0,
            field_relevance: 0.0,
        };
        assert_eq!(
            profile.score(&data, &zero).overall_score,
            profile.score(&data, &ScoreWeights::default()).overall_score
        );
    }

    #[test]
    fn test_empty_text_scores_zero() {
        let profile = TopicProfile::new(&topics(&["soil carbon"])).unwrap();
        let score = profile.score(&fields(&[("title", ""), ("abstract", "")]), &ScoreWeights::default());
        assert_eq!(score.overall_score, 0.0);
        assert!(approx(score.confidence, 0.5));
        assert!(!score.is_relevant);
    }

    #[test]
    fn test_scoring_fields_adds_text_as_abstract() {
        let record = ManuscriptRecord::from_pairs("1", &[("title", "t")], "body text");
        assert_eq!(scoring_fields(&record).get("abstract").map(String::as_str), Some("body text"));

        let with_abstract = ManuscriptRecord::from_pairs("1", &[("Abstract", "own")], "body text");
        let fields = scoring_fields(&with_abstract);
        assert_eq!(fields.get("Abstract").map(String::as_str), Some("own"));
        assert!(!fields.contains_key("abstract"));
    }

    fn config(use_ai: bool) -> TopicRelevanceConfig {
        TopicRelevanceConfig {
            enabled: true,
            use_ai,
            topics: topics(&["Climate change impacts on biodiversity"]),
            min_score: 0.5,
            score_weights: ScoreWeights::default(),
        }
    }

    #[tokio::test]
    async fn test_filter_excludes_irrelevant() {
        let filter = TopicRelevanceFilter::new(config(false), None).unwrap();
        let mut records = vec![
            ManuscriptRecord::from_pairs(
                "1",
                &[("title", "Climate change and biodiversity loss")],
                "We study how climate change impacts biodiversity in alpine regions.",
            ),
            ManuscriptRecord::from_pairs("2", &[("title", "Medieval poetry in Tuscany")], "A study of sonnets."),
        ];

        let excluded = filter.apply(&mut records).await.unwrap();
        assert_eq!(excluded, 1);
        assert!(records[0].is_included());
        assert_eq!(
            records[1].exclusion_reason(),
            Some("Topic relevance score (0.10) below minimum threshold (0.50)")
        );
        assert!(records[0].tag("topic_relevance_score").is_some());
        assert_eq!(records[1].tag("matched_keywords"), Some(&serde_json::json!([])));
    }

    #[test]
    fn test_invalid_min_score() {
        let mut bad = config(false);
        bad.min_score = 1.5;
        assert!(TopicRelevanceFilter::new(bad, None).is_err());
    }

    #[tokio::test]
    async fn test_ai_mode_recomputes_relevance() {
        let mock = Arc::new(MockExtractor::with_responder(|prompt| {
            if prompt.prompt_content.contains("TITLE: Alpine") {
                Some(r#"{"overall_score": 0.8, "is_relevant": false, "matched_keywords": ["climate"]}"#.into())
            } else if prompt.prompt_content.contains("TITLE: Sonnets") {
                Some(r#"{"overall_score": 0.3, "is_relevant": true}"#.into())
            } else {
                None
            }
        }));
        let ai = AiAssist::new(
            mock.clone(),
            vec![ModelConfig::new(Provider::OpenAi, "gpt-4o-mini").with_api_key("k")],
        );
        let filter = TopicRelevanceFilter::new(config(true), Some(ai)).unwrap();

        let mut records = vec![
            ManuscriptRecord::from_pairs("1", &[("title", "Alpine biodiversity")], "abstract"),
            ManuscriptRecord::from_pairs("2", &[("title", "Sonnets")], "abstract"),
            ManuscriptRecord::from_pairs("3", &[("title", "Unanswered")], "abstract"),
        ];
        let excluded = filter.apply(&mut records).await.unwrap();

        assert_eq!(excluded, 2);
        assert!(records[0].is_included());
        assert_eq!(records[0].tag("matched_keywords"), Some(&serde_json::json!(["climate"])));
        assert_eq!(
            records[1].exclusion_reason(),
            Some("Topic relevance score (0.30) below minimum threshold (0.50)")
        );
        assert_eq!(
            records[2].exclusion_reason(),
            Some("Topic relevance score (0.00) below minimum threshold (0.50)")
        );
        assert_eq!(mock.call_count(), 1);
    }
}
