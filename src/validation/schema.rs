//! Collection schemas and field checks.

use super::{Violation, ViolationKind};
use crate::importer::classify::{Medium, WorkType};
use serde_json::Value;
use std::collections::HashMap;

const STATUSES: &[&str] = &["draft", "active", "suspended", "archived"];

/// Expected shape of a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Boolean,
    /// Array of strings.
    List,
    /// String drawn from a fixed vocabulary.
    OneOf(&'static [&'static str]),
    /// Absolute http(s) URL.
    Url,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRule {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    /// Character limit for text, item limit for lists.
    pub max_len: Option<usize>,
}

impl FieldRule {
    pub fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            max_len: None,
        }
    }

    pub fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            max_len: None,
        }
    }

    pub fn max(mut self, max_len: usize) -> Self {
        self.max_len = Some(max_len);
        self
    }

    fn check(&self, value: Option<&Value>, violations: &mut Vec<Violation>) {
        let value = match value {
            None | Some(Value::Null) => {
                if self.required {
                    violations.push(Violation::new(
                        self.name,
                        ViolationKind::Missing,
                        "required field is missing",
                    ));
                }
                return;
            }
            Some(v) => v,
        };

        match self.kind {
            FieldKind::Text => match value.as_str() {
                Some(text) => {
                    if self.required && text.trim().is_empty() {
                        violations.push(Violation::new(
                            self.name,
                            ViolationKind::Empty,
                            "must not be empty",
                        ));
                    }
                    self.check_len(text.chars().count(), violations);
                }
                None => violations.push(self.wrong_type("string")),
            },
            FieldKind::Number => {
                if !value.is_number() {
                    violations.push(self.wrong_type("number"));
                }
            }
            FieldKind::Boolean => {
                if !value.is_boolean() {
                    violations.push(self.wrong_type("boolean"));
                }
            }
            FieldKind::List => match value.as_array() {
                Some(items) => {
                    if items.iter().any(|item| !item.is_string()) {
                        violations.push(self.wrong_type("list of strings"));
                    }
                    self.check_len(items.len(), violations);
                }
                None => violations.push(self.wrong_type("list")),
            },
            FieldKind::OneOf(allowed) => match value.as_str() {
                Some(text) if allowed.contains(&text) => {}
                Some(text) => violations.push(Violation::new(
                    self.name,
                    ViolationKind::NotAllowed,
                    format!("'{}' is not one of: {}", text, allowed.join(", ")),
                )),
                None => violations.push(self.wrong_type("string")),
            },
            FieldKind::Url => match value.as_str() {
                Some(text) if is_http_url(text) => {}
                Some(text) => violations.push(Violation::new(
                    self.name,
                    ViolationKind::InvalidUrl,
                    format!("'{}' is not an absolute http(s) URL", text),
                )),
                None => violations.push(self.wrong_type("string")),
            },
        }
    }

    fn check_len(&self, len: usize, violations: &mut Vec<Violation>) {
        if let Some(max) = self.max_len {
            if len > max {
                violations.push(Violation::new(
                    self.name,
                    ViolationKind::TooLong,
                    format!("length {} exceeds maximum {}", len, max),
                ));
            }
        }
    }

    fn wrong_type(&self, expected: &str) -> Violation {
        Violation::new(
            self.name,
            ViolationKind::WrongType,
            format!("expected {}", expected),
        )
    }
}

/// Accepts `http://` or `https://` followed by a non-empty host without whitespace.
pub fn is_http_url(text: &str) -> bool {
    let rest = text
        .strip_prefix("https://")
        .or_else(|| text.strip_prefix("http://"));
    match rest {
        Some(rest) => {
            let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
            !host.is_empty() && !rest.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

/// Field rules for one collection. Fields not listed are accepted as-is.
#[derive(Debug, Clone)]
pub struct CollectionSchema {
    pub collection: String,
    pub fields: Vec<FieldRule>,
}

impl CollectionSchema {
    pub fn new(collection: impl Into<String>, fields: Vec<FieldRule>) -> Self {
        Self {
            collection: collection.into(),
            fields,
        }
    }

    /// Check a payload, returning every violation found.
    pub fn check(&self, payload: &Value) -> Vec<Violation> {
        let Some(object) = payload.as_object() else {
            return vec![Violation::new(
                "$",
                ViolationKind::WrongType,
                "payload must be a JSON object",
            )];
        };
        let mut violations = Vec::new();
        for rule in &self.fields {
            rule.check(object.get(rule.name), &mut violations);
        }
        violations
    }
}

/// Schemas keyed by collection name.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, CollectionSchema>,
}

impl SchemaRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Schemas for the built-in collections.
    pub fn builtin() -> Self {
        use FieldKind::*;
        use FieldRule as F;

        let mut registry = Self::empty();
        registry.register(CollectionSchema::new(
            "profiles",
            vec![
                F::required("handle", Text).max(64),
                F::required("display_name", Text).max(120),
                F::optional("bio", Text).max(2000),
                F::optional("avatar_url", Url),
                F::optional("status", OneOf(STATUSES)),
            ],
        ));
        registry.register(CollectionSchema::new(
            "creations",
            vec![
                F::required("handle", Text).max(96),
                F::required("title", Text).max(300),
                F::optional("description", Text).max(10_000),
                F::required("work_type", OneOf(WorkType::SLUGS)),
                F::required("medium", OneOf(Medium::SLUGS)),
                F::optional("creator", Text).max(200),
                F::optional("url", Url),
                F::optional("tags", List).max(50),
                F::optional("origin_system", Text).max(64),
                F::optional("origin_id", Text).max(256),
                F::optional("status", OneOf(STATUSES)),
            ],
        ));
        registry.register(CollectionSchema::new(
            "applications",
            vec![
                F::required("handle", Text).max(64),
                F::required("name", Text).max(120),
                F::required("url", Url),
                F::optional("description", Text).max(2000),
                F::optional("status", OneOf(STATUSES)),
            ],
        ));
        registry.register(CollectionSchema::new(
            "webhooks",
            vec![
                F::required("handle", Text).max(64),
                F::required("url", Url),
                F::required("events", List).max(32),
                F::optional("active", Boolean),
                F::optional("status", OneOf(STATUSES)),
            ],
        ));
        registry
    }

    pub fn register(&mut self, schema: CollectionSchema) {
        self.schemas.insert(schema.collection.clone(), schema);
    }

    pub fn get(&self, collection: &str) -> Option<&CollectionSchema> {
        self.schemas.get(collection)
    }

    /// Check a payload against a collection; unknown collections yield a
    /// single `unknown_collection` violation.
    pub fn check(&self, collection: &str, payload: &Value) -> Vec<Violation> {
        match self.get(collection) {
            Some(schema) => schema.check(payload),
            None => vec![Violation::new(
                "$",
                ViolationKind::UnknownCollection,
                format!("no schema registered for collection '{}'", collection),
            )],
        }
    }

    pub fn collections(&self) -> Vec<String> {
        let mut names: Vec<String> = self.schemas.keys().cloned().collect();
        names.sort();
        names
    }
}
