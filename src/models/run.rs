//! Aggregate result of one screening invocation.

use indexmap::IndexMap;
use serde::Serialize;

use super::ManuscriptRecord;

/// Statistic key for records flagged as duplicates.
pub const DUPLICATES_FOUND: &str = "duplicates_found";
/// Statistic key for records excluded by language.
pub const LANGUAGE_EXCLUDED: &str = "language_excluded";
/// Statistic key for records excluded by article type.
pub const ARTICLE_TYPE_EXCLUDED: &str = "article_type_excluded";
/// Statistic key for records excluded by topic relevance.
pub const TOPIC_RELEVANCE_EXCLUDED: &str = "topic_relevance_excluded";

/// Records plus counters for one pipeline run.
///
/// Serializes to the JSON output document.
#[derive(Debug, Clone, Serialize)]
pub struct ScreeningRun {
    pub total_records: usize,
    pub included_records: usize,
    pub excluded_records: usize,
    pub statistics: IndexMap<String, usize>,
    pub records: Vec<ManuscriptRecord>,
    /// Input column order, when known from the loaded header.
    #[serde(skip)]
    pub columns: Vec<String>,
}

impl ScreeningRun {
    pub fn new(records: Vec<ManuscriptRecord>) -> Self {
        let mut run = Self {
            total_records: records.len(),
            included_records: 0,
            excluded_records: 0,
            statistics: IndexMap::new(),
            records,
            columns: Vec::new(),
        };
        run.finalize();
        run
    }

    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = columns;
        self
    }

    pub fn record_statistic(&mut self, key: &str, count: usize) {
        self.statistics.insert(key.to_string(), count);
    }

    pub fn statistic(&self, key: &str) -> Option<usize> {
        self.statistics.get(key).copied()
    }

    /// Recount included and excluded records.
    pub fn finalize(&mut self) {
        self.total_records = self.records.len();
        self.included_records = self.records.iter().filter(|r| r.is_included()).count();
        self.excluded_records = self.total_records - self.included_records;
    }

    pub fn included(&self) -> impl Iterator<Item = &ManuscriptRecord> {
        self.records.iter().filter(|r| r.is_included())
    }

    pub fn excluded(&self) -> impl Iterator<Item = &ManuscriptRecord> {
        self.records.iter().filter(|r| !r.is_included())
    }

    pub fn find(&self, id: &str) -> Option<&ManuscriptRecord> {
        self.records.iter().find(|r| r.id() == id)
    }
}
