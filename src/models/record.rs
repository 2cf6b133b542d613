//! Manuscript record: one input row plus the tags filters attach to it.

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde_json::Value;
use std::collections::HashMap;

/// A single manuscript flowing through the screening pipeline.
///
/// `original_data` is frozen at construction. Filters only ever add tags or
/// exclude the record; the inclusion flag is derived from the exclusion
/// reason, so the two can never disagree.
#[derive(Debug, Clone, PartialEq)]
pub struct ManuscriptRecord {
    id: String,
    original_data: IndexMap<String, String>,
    field_index: HashMap<String, String>,
    text: String,
    tags: IndexMap<String, Value>,
    exclusion_reason: Option<String>,
}

impl ManuscriptRecord {
    /// Create a record from its row id, ordered columns and analysis text.
    pub fn new(
        id: impl Into<String>,
        original_data: IndexMap<String, String>,
        text: impl Into<String>,
    ) -> Self {
        let field_index = original_data
            .keys()
            .map(|key| (key.to_lowercase(), key.clone()))
            .collect();

        Self {
            id: id.into(),
            original_data,
            field_index,
            text: text.into(),
            tags: IndexMap::new(),
            exclusion_reason: None,
        }
    }

    /// Convenience constructor used by tests and the CLI.
    pub fn from_pairs<K, V>(id: impl Into<String>, pairs: &[(K, V)], text: impl Into<String>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let data = pairs
            .iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
            .collect();
        Self::new(id, data, text)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn original_data(&self) -> &IndexMap<String, String> {
        &self.original_data
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tags(&self) -> &IndexMap<String, Value> {
        &self.tags
    }

    pub fn tag(&self, key: &str) -> Option<&Value> {
        self.tags.get(key)
    }

    /// Original column name for a case-insensitive field name.
    pub fn column_name(&self, field: &str) -> Option<&str> {
        self.field_index
            .get(&field.to_lowercase())
            .map(String::as_str)
    }

    /// Case-insensitive column lookup.
    pub fn field(&self, field: &str) -> Option<&str> {
        self.column_name(field)
            .and_then(|column| self.original_data.get(column))
            .map(String::as_str)
    }

    /// Like [`field`](Self::field) but treats missing columns as empty.
    pub fn field_or_empty(&self, field: &str) -> &str {
        self.field(field).unwrap_or("")
    }

    pub fn is_included(&self) -> bool {
        self.exclusion_reason.is_none()
    }

    pub fn exclusion_reason(&self) -> Option<&str> {
        self.exclusion_reason.as_deref()
    }

    /// Attach a tag. Tags accumulate; nothing in the pipeline removes one.
    pub fn add_tag(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.tags.insert(key.into(), value.into());
    }

    /// Exclude the record unless an earlier filter already did.
    ///
    /// Returns `true` when this call recorded the reason. A blank reason is
    /// replaced so that an excluded record always carries an explanation.
    pub fn exclude(&mut self, reason: impl Into<String>) -> bool {
        if self.exclusion_reason.is_some() {
            return false;
        }
        let reason = reason.into();
        let reason = if reason.trim().is_empty() {
            "Excluded".to_string()
        } else {
            reason
        };
        self.exclusion_reason = Some(reason);
        true
    }
}

impl Serialize for ManuscriptRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ManuscriptRecord", 5)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("original_data", &self.original_data)?;
        state.serialize_field("tags", &self.tags)?;
        state.serialize_field("include", &self.is_included())?;
        state.serialize_field("exclusion_reason", &self.exclusion_reason)?;
        state.end()
    }
}
