//! Turning raw records into registry records.

use super::classify::Classification;
use super::idempotency::key_digest;
use super::item::RawRecord;
use crate::entity::{EntityId, EntityRecord, EntityStatus, EntityType};
use chrono::Utc;
use serde_json::{Map, Value};
use unicode_normalization::UnicodeNormalization;

const HANDLE_SLUG_MAX: usize = 48;
const HANDLE_DIGEST_LEN: usize = 16;

/// NFC-normalize, trim and collapse internal whitespace.
pub fn normalize_text(text: &str) -> String {
    text.nfc()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// ASCII slug: alphanumerics lower-cased, runs of anything else become `-`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::new();
    let mut pending_dash = false;
    for c in text.nfkd().filter(|c| !is_combining(*c)) {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
        if slug.len() >= HANDLE_SLUG_MAX {
            break;
        }
    }
    slug.truncate(HANDLE_SLUG_MAX);
    slug.trim_end_matches('-').to_string()
}

fn is_combining(c: char) -> bool {
    ('\u{300}'..='\u{36f}').contains(&c)
}

/// Deterministic handle: title slug plus a short digest of the key.
pub fn derive_handle(raw: &RawRecord, idempotency_key: &str) -> String {
    let base = raw
        .title
        .as_deref()
        .map(slugify)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| slugify(&raw.origin_id));
    let digest = key_digest(idempotency_key);
    let short = &digest[..digest.len().min(HANDLE_DIGEST_LEN)];
    if base.is_empty() {
        format!("work-{}", short)
    } else {
        format!("{}-{}", base, short)
    }
}

fn put_text(attributes: &mut Map<String, Value>, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        let value = normalize_text(value);
        if !value.is_empty() {
            attributes.insert(key.to_string(), Value::String(value));
        }
    }
}

/// Build the `creations` record for an imported item.
///
/// Missing source fields stay missing; the validation gate decides whether
/// that is acceptable.
pub fn build_creation(
    raw: &RawRecord,
    id: EntityId,
    idempotency_key: &str,
    classification: &Classification,
) -> EntityRecord {
    let mut attributes = Map::new();
    put_text(&mut attributes, "title", raw.title.as_deref());
    put_text(&mut attributes, "description", raw.description.as_deref());
    put_text(&mut attributes, "creator", raw.creator.as_deref());
    if let Some(url) = raw.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        attributes.insert("url".to_string(), Value::String(url.to_string()));
    }

    let mut tags: Vec<String> = raw
        .tags
        .iter()
        .map(|t| normalize_text(t).to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    tags.sort();
    tags.dedup();
    if !tags.is_empty() {
        attributes.insert(
            "tags".to_string(),
            Value::Array(tags.into_iter().map(Value::String).collect()),
        );
    }

    attributes.insert(
        "work_type".to_string(),
        Value::String(classification.work_type.as_str().to_string()),
    );
    attributes.insert(
        "medium".to_string(),
        Value::String(classification.medium.as_str().to_string()),
    );
    attributes.insert(
        "origin_system".to_string(),
        Value::String(normalize_text(&raw.origin_system).to_lowercase()),
    );
    attributes.insert(
        "origin_id".to_string(),
        Value::String(raw.origin_id.trim().to_string()),
    );
    put_text(&mut attributes, "origin_created_at", raw.created_at.as_deref());

    let now = Utc::now();
    EntityRecord {
        id,
        entity_type: EntityType::Creation,
        handle: derive_handle(raw, idempotency_key),
        status: EntityStatus::Active,
        idempotency_key: Some(idempotency_key.to_string()),
        attributes,
        violations: Vec::new(),
        created_at: now,
        updated_at: now,
    }
}
