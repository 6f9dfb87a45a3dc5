//! Validation Gate
//!
//! Every write consults the gate before it is persisted. The gate resolves an
//! effective enforcement mode per collection (emergency bypass, then global
//! disable, then the configured collection mode, then the default) and checks
//! the payload against the collection schema when the mode asks for it.

pub mod gate;
pub mod policy;
pub mod schema;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use gate::{Decision, ValidationGate, ValidationStatus};
pub use policy::{
    BypassReason, EnforcementMode, OverrideChange, OverrideKind, OverrideState, ValidationPolicy,
};
pub use schema::{CollectionSchema, FieldKind, FieldRule, SchemaRegistry};

/// Category of a schema violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Missing,
    WrongType,
    Empty,
    TooLong,
    NotAllowed,
    InvalidUrl,
    UnknownCollection,
}

/// A single failed schema check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub field: String,
    pub kind: ViolationKind,
    pub message: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}
