//! Language detection and filtering.
//!
//! Rule-based detection votes on common stop words first and falls back to
//! Unicode script proportions. Titles are trusted over abstracts because many
//! databases translate abstracts to English but keep the original title.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{active_ai, included_indices, Filter, FilterError};
use crate::config::LanguageConfig;
use crate::extraction::{parse_json_reply, AiAssist};
use crate::models::{ManuscriptRecord, LANGUAGE_EXCLUDED};
use crate::utils::text::truncate_chars;

/// Result for text that could not be attributed to any language.
pub const UNKNOWN: &str = "unknown";

const MIN_STOP_WORD_MATCHES: usize = 3;

/// Vote order; ties go to the earlier entry.
const STOP_WORDS: &[(&str, &[&str])] = &[
    ("en", &["the", "and", "of", "to", "in", "is", "that", "for", "with", "as", "on", "by", "at", "from"]),
    ("es", &["el", "la", "de", "que", "y", "en", "un", "por", "con", "para", "los", "las", "del"]),
    ("fr", &["le", "de", "et", "la", "les", "des", "est", "un", "une", "dans", "que", "pour", "sur"]),
    ("de", &["der", "die", "und", "das", "den", "dem", "des", "ist", "mit", "von", "für", "auf", "ein"]),
    ("it", &["il", "di", "e", "la", "che", "in", "un", "per", "con", "del", "della", "dei", "delle"]),
    ("pt", &["o", "de", "e", "que", "do", "da", "em", "um", "para", "com", "na", "os", "dos"]),
    ("nl", &["de", "het", "van", "een", "in", "en", "is", "op", "aan", "met", "voor", "zijn", "dat"]),
    ("ru", &["и", "в", "на", "с", "что", "это", "не", "как", "для", "по", "из", "у", "от"]),
    ("zh", &["的", "一", "是", "了", "我", "不", "在", "人", "有", "他", "这", "为", "之"]),
    ("ja", &["の", "に", "は", "を", "が", "と", "で", "て", "も", "な", "い", "か", "ある"]),
    ("ar", &["في", "من", "على", "إلى", "أن", "هذا", "ذلك", "التي", "الذي", "كان", "هو", "هي"]),
];

/// Codes recognized when an AI reply is not valid JSON.
const FALLBACK_CODES: &[&str] = &[
    "en", "es", "fr", "de", "it", "pt", "ru", "zh", "ja", "ar", "nl", "sv", "no", "da", "fi", "pl",
    "cs", "hu", "ro", "el", "tr", "he", "ko",
];

#[derive(Debug, Default, Clone, Copy)]
struct ScriptCounts {
    latin: usize,
    cyrillic: usize,
    greek: usize,
    arabic: usize,
    hebrew: usize,
    cjk: usize,
    letters: usize,
}

impl ScriptCounts {
    fn of(text: &str) -> Self {
        let mut counts = Self::default();
        for c in text.chars().filter(|c| c.is_alphabetic()) {
            counts.letters += 1;
            let cp = c as u32;
            if c.is_ascii_alphabetic() || (0x00C0..=0x024F).contains(&cp) {
                counts.latin += 1;
            } else if (0x0400..=0x052F).contains(&cp) {
                counts.cyrillic += 1;
            } else if (0x0370..=0x03FF).contains(&cp) || (0x1F00..=0x1FFF).contains(&cp) {
                counts.greek += 1;
            } else if is_arabic(cp) {
                counts.arabic += 1;
            } else if (0x0590..=0x05FF).contains(&cp) {
                counts.hebrew += 1;
            } else if is_cjk(cp) {
                counts.cjk += 1;
            }
        }
        counts
    }

    fn share(&self, count: usize) -> f64 {
        if self.letters == 0 {
            0.0
        } else {
            count as f64 / self.letters as f64
        }
    }
}

fn is_arabic(cp: u32) -> bool {
    (0x0600..=0x06FF).contains(&cp)
        || (0x0750..=0x077F).contains(&cp)
        || (0xFB50..=0xFDFF).contains(&cp)
        || (0xFE70..=0xFEFF).contains(&cp)
}

fn is_kana(cp: u32) -> bool {
    (0x3040..=0x30FF).contains(&cp)
}

fn is_hangul(cp: u32) -> bool {
    (0xAC00..=0xD7AF).contains(&cp)
}

fn is_cjk(cp: u32) -> bool {
    (0x4E00..=0x9FFF).contains(&cp) || (0x3400..=0x4DBF).contains(&cp) || is_kana(cp) || is_hangul(cp)
}

fn vote_by_stop_words(text: &str) -> Option<&'static str> {
    let words: Vec<&str> = text
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| c.is_ascii_punctuation()))
        .filter(|w| !w.is_empty())
        .collect();

    let mut best: Option<(&'static str, usize)> = None;
    for &(code, list) in STOP_WORDS {
        let score = words.iter().filter(|w| list.contains(*w)).count();
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((code, score));
        }
    }

    best.filter(|&(_, score)| score >= MIN_STOP_WORD_MATCHES)
        .map(|(code, _)| code)
}

fn disambiguate_cjk(text: &str) -> &'static str {
    let cps = || text.chars().map(|c| c as u32);
    if cps().any(is_kana) {
        "ja"
    } else if cps().any(is_hangul) {
        "ko"
    } else {
        "zh"
    }
}

/// Detect the language of `text` as an ISO 639-1 code, or `"unknown"`.
pub fn detect_language(text: &str) -> &'static str {
    let text = text.trim().to_lowercase();
    if text.is_empty() {
        return UNKNOWN;
    }

    if let Some(code) = vote_by_stop_words(&text) {
        return code;
    }

    let scripts = ScriptCounts::of(&text);
    if scripts.share(scripts.latin) > 0.8 {
        "en"
    } else if scripts.share(scripts.cyrillic) > 0.5 {
        "ru"
    } else if scripts.share(scripts.greek) > 0.5 {
        "el"
    } else if scripts.share(scripts.arabic) > 0.5 {
        "ar"
    } else if scripts.share(scripts.hebrew) > 0.5 {
        "he"
    } else if scripts.share(scripts.cjk) > 0.5 {
        disambiguate_cjk(&text)
    } else {
        UNKNOWN
    }
}

/// English name for a language code.
pub fn language_name(code: &str) -> &'static str {
    match code.trim().to_lowercase().as_str() {
        "en" => "English",
        "es" => "Spanish",
        "fr" => "French",
        "de" => "German",
        "it" => "Italian",
        "pt" => "Portuguese",
        "nl" => "Dutch",
        "ru" => "Russian",
        "zh" => "Chinese",
        "ja" => "Japanese",
        "ko" => "Korean",
        "ar" => "Arabic",
        "he" => "Hebrew",
        "el" => "Greek",
        _ => "Unknown",
    }
}

#[derive(Debug, Deserialize)]
struct LanguageReply {
    #[serde(default)]
    language: String,
}

/// Read a language code from a model reply.
fn read_language_reply(reply: &str) -> Option<String> {
    if let Ok(parsed) = parse_json_reply::<LanguageReply>(reply) {
        let code = parsed.language.trim().to_lowercase();
        return (!code.is_empty()).then_some(code);
    }

    let lowered = reply.to_lowercase();
    FALLBACK_CODES
        .iter()
        .find(|code| {
            lowered.contains(&format!("\"{}\"", code))
                || lowered.contains(&format!("'{}'", code))
                || lowered.contains(&format!(" {} ", code))
        })
        .map(|code| code.to_string())
}

fn detection_data(record: &ManuscriptRecord) -> Option<String> {
    let title = record.field_or_empty("title").trim();
    let abstract_text = match record.field("abstract") {
        Some(value) if !value.trim().is_empty() => value.trim(),
        _ => record.text().trim(),
    };
    let journal = ["journal", "journal_name", "publication"]
        .iter()
        .filter_map(|f| record.field(f))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .unwrap_or("");

    let mut parts = Vec::new();
    if !title.is_empty() {
        parts.push(format!("TITLE: {}", title));
    }
    if !abstract_text.is_empty() {
        parts.push(format!("ABSTRACT: {}", truncate_chars(abstract_text, 500)));
    }
    if !journal.is_empty() {
        parts.push(format!("JOURNAL: {}", journal));
    }

    (!parts.is_empty()).then(|| parts.join("\n"))
}

fn language_prompt(data: &str) -> String {
    format!(
        r#"You are a language detection expert analyzing scientific manuscripts. Identify the primary language of the manuscript from the fields below.

CONTEXT:
- Many bibliographic databases translate abstracts to English but keep the original title
- The title language is usually more reliable than the abstract language
- Journal names can reveal regional publications (e.g. "Revista Española", "Deutsche Zeitschrift")

CONSIDERATIONS:
- If the title is in one language and the abstract is in English, prefer the title language
- Look for language-specific characters (é, ñ, ü, ø and so on)
- Treat scientific Latin terms as part of the surrounding language
- For mixed content, report the dominant language

MANUSCRIPT DATA:
{}

Respond with ONLY a JSON object containing the ISO 639-1 code, for example {{"language": "en"}} or {{"language": "es"}}"#,
        data
    )
}

/// Language stage.
#[derive(Debug, Clone)]
pub struct LanguageFilter {
    config: LanguageConfig,
    ai: Option<AiAssist>,
}

impl LanguageFilter {
    pub fn new(config: LanguageConfig, ai: Option<AiAssist>) -> Self {
        Self { config, ai }
    }

    /// Apply the acceptance rule. Returns `true` if the record was excluded.
    fn judge(&self, record: &mut ManuscriptRecord, language: &str) -> bool {
        if language == UNKNOWN || self.config.accepts(language) {
            return false;
        }
        debug!("Record {} excluded for language {}", record.id(), language);
        record.exclude(format!("Language not accepted: {}", language))
    }

    fn apply_rules(&self, records: &mut [ManuscriptRecord], indices: &[usize]) -> usize {
        let mut excluded = 0;
        for &index in indices {
            let record = &mut records[index];

            let title = record.field_or_empty("title").to_string();
            let title_language = (!title.trim().is_empty()).then(|| detect_language(&title));
            let abstract_language =
                (!record.text().trim().is_empty()).then(|| detect_language(record.text()));

            let language = [title_language, abstract_language]
                .into_iter()
                .flatten()
                .find(|code| *code != UNKNOWN)
                .unwrap_or(UNKNOWN);

            if let Some(code) = title_language {
                record.add_tag("title_language", code);
            }
            if let Some(code) = abstract_language {
                record.add_tag("abstract_language", code);
            }
            record.add_tag("detected_language", language);

            if self.judge(record, language) {
                excluded += 1;
            }
        }
        excluded
    }

    async fn apply_ai(
        &self,
        records: &mut [ManuscriptRecord],
        indices: &[usize],
        ai: &AiAssist,
    ) -> usize {
        let mut languages = vec![UNKNOWN.to_string(); indices.len()];

        let pending: Vec<(usize, String)> = indices
            .iter()
            .enumerate()
            .filter_map(|(slot, &index)| {
                detection_data(&records[index]).map(|data| (slot, language_prompt(&data)))
            })
            .collect();

        if !pending.is_empty() {
            info!(
                "Detecting language of {} manuscripts with {}",
                pending.len(),
                ai.service_name()
            );
            let (slots, prompts): (Vec<usize>, Vec<String>) = pending.into_iter().unzip();
            match ai.batch(prompts).await {
                Ok(replies) => {
                    for (slot, reply) in slots.into_iter().zip(replies) {
                        if let Some(code) = reply.as_deref().and_then(read_language_reply) {
                            languages[slot] = code;
                        }
                    }
                }
                Err(e) => warn!("AI language detection failed, treating languages as unknown: {}", e),
            }
        }

        let mut excluded = 0;
        for (&index, language) in indices.iter().zip(&languages) {
            let record = &mut records[index];
            if language != UNKNOWN {
                record.add_tag("ai_detected_language", language.as_str());
            }
            record.add_tag("detected_language", language.as_str());
            if self.judge(record, language) {
                excluded += 1;
            }
        }
        excluded
    }
}

#[async_trait]
impl Filter for LanguageFilter {
    fn name(&self) -> &'static str {
        "language"
    }

    fn statistic_key(&self) -> &'static str {
        LANGUAGE_EXCLUDED
    }

    fn uses_ai(&self) -> bool {
        active_ai(self.config.use_ai, &self.ai).is_some()
    }

    async fn apply(&self, records: &mut [ManuscriptRecord]) -> Result<usize, FilterError> {
        if self.config.accepted_languages.is_empty() {
            return Err(FilterError::Config(
                "language filter requires at least one accepted language".to_string(),
            ));
        }

        let indices = included_indices(records);
        let excluded = match active_ai(self.config.use_ai, &self.ai) {
            Some(ai) => self.apply_ai(records, &indices, ai).await,
            None => self.apply_rules(records, &indices),
        };

        info!("Language filter: {} records excluded", excluded);
        Ok(excluded)
    }
}
