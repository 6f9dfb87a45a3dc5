//! Raw import records and per-item reports.

use super::classify::Classification;
use crate::entity::EntityId;
use crate::validation::Violation;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A record as supplied by an external system.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(default, deserialize_with = "lenient_text")]
    pub origin_system: String,
    /// Numeric ids from legacy exports are kept as their decimal text.
    #[serde(default, deserialize_with = "lenient_text")]
    pub origin_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Free-form source metadata; `work_type`, `type` and `medium` are read by
    /// the classifier.
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Why the entry could not be read; such records fail without touching
    /// the store.
    #[serde(skip)]
    pub malformed: Option<String>,
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number, found {}",
            other
        ))),
    }
}

impl RawRecord {
    pub fn new(origin_system: &str, origin_id: &str) -> Self {
        Self {
            origin_system: origin_system.to_string(),
            origin_id: origin_id.to_string(),
            ..Self::default()
        }
    }

    /// An entry that could not be mapped; it is reported as failed.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self {
            malformed: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Map one decoded entry, keeping whatever origin fields are readable
    /// when the rest of it is not.
    pub fn from_value(value: Value) -> Self {
        match serde_json::from_value::<RawRecord>(value.clone()) {
            Ok(record) => record,
            Err(e) => {
                let text = |field: &str| match value.get(field) {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Number(n)) => n.to_string(),
                    _ => String::new(),
                };
                Self {
                    origin_system: text("origin_system"),
                    origin_id: text("origin_id"),
                    ..Self::malformed(e.to_string())
                }
            }
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }

    pub fn with_mime_type(mut self, mime_type: &str) -> Self {
        self.mime_type = Some(mime_type.to_string());
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// Final state of one submitted item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemStatus {
    Created { id: EntityId },
    /// Already imported; `existing_id` is absent when the store reported the
    /// key collision without returning the record.
    Duplicate { existing_id: Option<EntityId> },
    Rejected { violations: Vec<Violation> },
    Failed { reason: String },
}

impl ItemStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ItemStatus::Created { .. } => "created",
            ItemStatus::Duplicate { .. } => "skipped",
            ItemStatus::Rejected { .. } => "rejected",
            ItemStatus::Failed { .. } => "failed",
        }
    }
}

/// Report for one submitted item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemReport {
    /// Position in submission order.
    pub index: usize,
    pub origin_system: String,
    pub origin_id: String,
    pub idempotency_key: Option<String>,
    pub classification: Option<Classification>,
    pub status: ItemStatus,
    /// Violations accepted under WARN mode.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Violation>,
    /// Store attempts made for this item, retries included.
    pub attempts: usize,
}

impl ItemReport {
    pub(crate) fn new(index: usize, raw: &RawRecord, status: ItemStatus) -> Self {
        Self {
            index,
            origin_system: raw.origin_system.clone(),
            origin_id: raw.origin_id.clone(),
            idempotency_key: None,
            classification: None,
            status,
            warnings: Vec::new(),
            attempts: 0,
        }
    }
}

/// Summary of an import run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportRunOutcome {
    pub total: usize,
    pub created: usize,
    pub skipped: usize,
    pub rejected: usize,
    pub failed: usize,
    /// One report per submitted item, in submission order.
    pub items: Vec<ItemReport>,
}

impl ImportRunOutcome {
    pub fn from_reports(mut items: Vec<ItemReport>) -> Self {
        items.sort_by_key(|r| r.index);
        let mut outcome = Self {
            total: items.len(),
            ..Self::default()
        };
        for item in &items {
            match item.status {
                ItemStatus::Created { .. } => outcome.created += 1,
                ItemStatus::Duplicate { .. } => outcome.skipped += 1,
                ItemStatus::Rejected { .. } => outcome.rejected += 1,
                ItemStatus::Failed { .. } => outcome.failed += 1,
            }
        }
        outcome.items = items;
        outcome
    }

    /// Whether every submitted item is accounted for exactly once.
    pub fn is_consistent(&self) -> bool {
        self.created + self.skipped + self.rejected + self.failed == self.total
            && self.items.len() == self.total
    }

    pub fn created_ids(&self) -> Vec<EntityId> {
        self.items
            .iter()
            .filter_map(|item| match item.status {
                ItemStatus::Created { id } => Some(id),
                _ => None,
            })
            .collect()
    }
}
