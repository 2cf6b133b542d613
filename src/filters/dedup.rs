//! Duplicate detection across manuscript records.
//!
//! Records are compared pairwise in input order. A later record that matches
//! an earlier one is flagged as its duplicate; the earlier record is kept.
//! Matching tries, in order:
//!
//! 1. exact DOI match (case and surrounding whitespace ignored)
//! 2. authors + year + (title or abstract), each within one edit
//! 3. every configured field within one edit, ignoring empty values
//!
//! Step 3 only runs when the configured fields do not cover step 2.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{active_ai, included_indices, Filter, FilterError};
use crate::config::DeduplicationConfig;
use crate::extraction::{parse_json_reply, AiAssist};
use crate::models::{ManuscriptRecord, DUPLICATES_FOUND};
use crate::utils::text::{normalize_doi, normalize_text, within_single_edit};

/// Record id to the id of the record it duplicates (`None` when unique).
pub type DuplicateMap = IndexMap<String, Option<String>>;

const EMPTY_COMPARISON: &str = "[No data available for comparison fields]";

/// Which comparisons the configured fields allow.
#[derive(Debug, Clone)]
struct MatchPlan {
    doi: Option<String>,
    bibliographic: Option<Bibliographic>,
    fields: Vec<String>,
}

#[derive(Debug, Clone)]
struct Bibliographic {
    authors: String,
    year: String,
    title: Option<String>,
    abstract_field: Option<String>,
}

fn find_field<'a>(fields: &'a [String], names: &[&str]) -> Option<&'a String> {
    fields
        .iter()
        .find(|f| names.iter().any(|n| f.trim().eq_ignore_ascii_case(n)))
}

impl MatchPlan {
    fn new(compare_fields: &[String]) -> Self {
        let doi = find_field(compare_fields, &["doi"]).cloned();

        let authors = find_field(compare_fields, &["authors", "author"]);
        let year = find_field(compare_fields, &["year", "publication_year"]);
        let title = find_field(compare_fields, &["title"]);
        let abstract_field = find_field(compare_fields, &["abstract"]);

        let bibliographic = match (authors, year) {
            (Some(authors), Some(year)) if title.is_some() || abstract_field.is_some() => {
                Some(Bibliographic {
                    authors: authors.clone(),
                    year: year.clone(),
                    title: title.cloned(),
                    abstract_field: abstract_field.cloned(),
                })
            }
            _ => None,
        };

        let fields = compare_fields
            .iter()
            .filter(|f| !f.trim().eq_ignore_ascii_case("doi") && !f.trim().is_empty())
            .cloned()
            .collect();

        Self {
            doi,
            bibliographic,
            fields,
        }
    }

    fn is_match(&self, a: &ManuscriptRecord, b: &ManuscriptRecord) -> bool {
        if let Some(doi_field) = &self.doi {
            let doi_a = normalize_doi(field_value(a, doi_field));
            let doi_b = normalize_doi(field_value(b, doi_field));
            if !doi_a.is_empty() && doi_a == doi_b {
                return true;
            }
        }

        if let Some(bib) = &self.bibliographic {
            let close = |field: &str| tolerant_match(field_value(a, field), field_value(b, field));
            let title_or_abstract = bib.title.as_deref().is_some_and(|f| close(f))
                || bib.abstract_field.as_deref().is_some_and(|f| close(f));
            return close(&bib.authors) && close(&bib.year) && title_or_abstract;
        }

        let mut compared = 0;
        for field in &self.fields {
            let value_a = normalize_text(field_value(a, field));
            let value_b = normalize_text(field_value(b, field));
            if value_a.is_empty() || value_b.is_empty() {
                continue;
            }
            compared += 1;
            if !within_single_edit(&value_a, &value_b) {
                return false;
            }
        }
        compared > 0
    }
}

/// Field value; `text` names the record's analysis text.
fn field_value<'a>(record: &'a ManuscriptRecord, field: &str) -> &'a str {
    let field = field.trim();
    if field.eq_ignore_ascii_case("text") {
        record.text()
    } else {
        record.field_or_empty(field)
    }
}

/// Within one edit after normalization; two empty values are identical.
fn tolerant_match(a: &str, b: &str) -> bool {
    within_single_edit(&normalize_text(a), &normalize_text(b))
}

/// Rule-based pass over `records`, returning positions of originals.
fn resolve_positions(records: &[&ManuscriptRecord], plan: &MatchPlan) -> Vec<Option<usize>> {
    let mut duplicate_of: Vec<Option<usize>> = vec![None; records.len()];

    for i in 0..records.len() {
        if duplicate_of[i].is_some() {
            continue;
        }
        for j in (i + 1)..records.len() {
            if duplicate_of[j].is_some() {
                continue;
            }
            if plan.is_match(records[i], records[j]) {
                duplicate_of[j] = Some(i);
            }
        }
    }

    duplicate_of
}

fn to_map(records: &[&ManuscriptRecord], positions: &[Option<usize>]) -> DuplicateMap {
    records
        .iter()
        .zip(positions)
        .map(|(record, original)| {
            (
                record.id().to_string(),
                original.map(|i| records[i].id().to_string()),
            )
        })
        .collect()
}

/// Rule-based duplicate detection.
///
/// Every record appears in the result; duplicates map to the id of the
/// earliest record they match.
pub fn find_duplicates(records: &[ManuscriptRecord], compare_fields: &[String]) -> DuplicateMap {
    let refs: Vec<&ManuscriptRecord> = records.iter().collect();
    let plan = MatchPlan::new(compare_fields);
    to_map(&refs, &resolve_positions(&refs, &plan))
}

/// Normalized `FIELD: value` lines used in AI comparison prompts.
pub fn comparison_data(record: &ManuscriptRecord, compare_fields: &[String]) -> String {
    let lines: Vec<String> = compare_fields
        .iter()
        .filter_map(|field| {
            let value = normalize_text(field_value(record, field));
            (!value.is_empty()).then(|| format!("{}: {}", field.trim().to_uppercase(), value))
        })
        .collect();

    if lines.is_empty() {
        EMPTY_COMPARISON.to_string()
    } else {
        lines.join("\n")
    }
}

fn duplicate_prompt(a: &str, b: &str) -> String {
    format!(
        r#"You are an expert in bibliographic deduplication. Decide whether the two records below describe the same manuscript.

GUIDANCE:
- Author names may differ in initials, order, diacritics or transliteration (e.g. "Müller", "Mueller" and "Muller")
- Titles may differ in capitalization, punctuation, abbreviations or minor typos
- A preprint and the published version of the same work are duplicates
- Different DOIs usually indicate different manuscripts
- Similar topics alone do not make two records duplicates

RECORD A:
{}

RECORD B:
{}

Respond with ONLY a JSON object: {{"duplicate": true}} or {{"duplicate": false}}"#,
        a, b
    )
}

#[derive(Debug, Deserialize)]
struct DuplicateReply {
    duplicate: bool,
}

/// Deduplication stage.
#[derive(Debug, Clone)]
pub struct DeduplicationFilter {
    config: DeduplicationConfig,
    ai: Option<AiAssist>,
}

impl DeduplicationFilter {
    pub fn new(config: DeduplicationConfig, ai: Option<AiAssist>) -> Self {
        Self { config, ai }
    }

    /// Rule-based pass followed by one AI batch over the unresolved pairs.
    async fn resolve_with_ai(
        &self,
        records: &[&ManuscriptRecord],
        plan: &MatchPlan,
        ai: &AiAssist,
    ) -> Vec<Option<usize>> {
        let mut duplicate_of = resolve_positions(records, plan);

        let data: Vec<String> = records
            .iter()
            .map(|r| comparison_data(r, &self.config.compare_fields))
            .collect();

        let pairs: Vec<(usize, usize)> = (0..records.len())
            .filter(|&i| duplicate_of[i].is_none())
            .flat_map(|i| ((i + 1)..records.len()).map(move |j| (i, j)))
            .filter(|&(_, j)| duplicate_of[j].is_none())
            .collect();

        if pairs.is_empty() {
            return duplicate_of;
        }

        info!(
            "Comparing {} record pairs for duplicates with {}",
            pairs.len(),
            ai.service_name()
        );
        let prompts = pairs
            .iter()
            .map(|&(i, j)| duplicate_prompt(&data[i], &data[j]))
            .collect();

        let replies = match ai.batch(prompts).await {
            Ok(replies) => replies,
            Err(e) => {
                warn!("AI duplicate detection failed, keeping rule-based result: {}", e);
                return duplicate_of;
            }
        };

        for (&(i, j), reply) in pairs.iter().zip(replies) {
            if duplicate_of[i].is_some() || duplicate_of[j].is_some() {
                continue;
            }
            let Some(reply) = reply else { continue };
            match parse_json_reply::<DuplicateReply>(&reply) {
                Ok(parsed) if parsed.duplicate => duplicate_of[j] = Some(i),
                Ok(_) => {}
                Err(e) => debug!(
                    "Unreadable duplicate reply for {} / {}: {}",
                    records[i].id(),
                    records[j].id(),
                    e
                ),
            }
        }

        duplicate_of
    }
}

#[async_trait]
impl Filter for DeduplicationFilter {
    fn name(&self) -> &'static str {
        "deduplication"
    }

    fn statistic_key(&self) -> &'static str {
        DUPLICATES_FOUND
    }

    fn uses_ai(&self) -> bool {
        active_ai(self.config.use_ai, &self.ai).is_some()
    }

    async fn apply(&self, records: &mut [ManuscriptRecord]) -> Result<usize, FilterError> {
        if self.config.compare_fields.iter().all(|f| f.trim().is_empty()) {
            return Err(FilterError::Config(
                "deduplication requires at least one compare field".to_string(),
            ));
        }

        let indices = included_indices(records);
        let plan = MatchPlan::new(&self.config.compare_fields);

        let originals = {
            let candidates: Vec<&ManuscriptRecord> = indices.iter().map(|&i| &records[i]).collect();
            let positions = match active_ai(self.config.use_ai, &self.ai) {
                Some(ai) => self.resolve_with_ai(&candidates, &plan, ai).await,
                None => resolve_positions(&candidates, &plan),
            };
            to_map(&candidates, &positions)
        };

        let mut duplicates = 0;
        for &index in &indices {
            let record = &mut records[index];
            let Some(Some(original)) = originals.get(record.id()) else {
                continue;
            };
            let original = original.clone();
            debug!("Record {} duplicates {}", record.id(), original);
            record.add_tag("is_duplicate", true);
            record.add_tag("duplicate_of", original.clone());
            if record.exclude(format!("Duplicate of {}", original)) {
                duplicates += 1;
            }
        }

        info!("Deduplication: {} duplicates found", duplicates);
        Ok(duplicates)
    }
}
