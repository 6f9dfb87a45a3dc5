//! Enforcement modes, policy configuration and the two process-wide overrides.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// How a collection treats schema violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EnforcementMode {
    /// Violations reject the write.
    #[default]
    #[serde(alias = "ENFORCE")]
    Enforce,
    /// Violations are reported but the write is allowed.
    #[serde(alias = "WARN")]
    Warn,
    /// No schema check.
    #[serde(alias = "BYPASS")]
    Bypass,
}

impl fmt::Display for EnforcementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnforcementMode::Enforce => write!(f, "ENFORCE"),
            EnforcementMode::Warn => write!(f, "WARN"),
            EnforcementMode::Bypass => write!(f, "BYPASS"),
        }
    }
}

impl std::str::FromStr for EnforcementMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "enforce" => Ok(EnforcementMode::Enforce),
            "warn" => Ok(EnforcementMode::Warn),
            "bypass" => Ok(EnforcementMode::Bypass),
            other => Err(format!(
                "Invalid enforcement mode: {} (must be 'enforce', 'warn' or 'bypass')",
                other
            )),
        }
    }
}

/// Why a write skipped schema checks. Kept distinct for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BypassReason {
    EmergencyBypass,
    GlobalDisable,
    CollectionPolicy,
}

impl fmt::Display for BypassReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BypassReason::EmergencyBypass => write!(f, "emergency_bypass"),
            BypassReason::GlobalDisable => write!(f, "global_disable"),
            BypassReason::CollectionPolicy => write!(f, "collection_policy"),
        }
    }
}

/// Policy as loaded from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ValidationPolicy {
    /// Mode for collections without an explicit entry.
    #[serde(default)]
    pub default_mode: EnforcementMode,

    /// Per-collection modes.
    #[serde(default)]
    pub collections: BTreeMap<String, EnforcementMode>,

    /// Standing policy change: validation off everywhere.
    #[serde(default)]
    pub global_disable: bool,

    /// Incident response: validation off everywhere, audited separately.
    #[serde(default)]
    pub emergency_bypass: bool,
}

impl ValidationPolicy {
    pub fn with_collection(mut self, collection: &str, mode: EnforcementMode) -> Self {
        self.collections.insert(collection.to_string(), mode);
        self
    }
}

/// Which override an administrative change touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideKind {
    EmergencyBypass,
    GlobalDisable,
    CollectionMode,
}

/// Current state of one override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideState {
    pub active: bool,
    pub changed_by: Option<String>,
    pub changed_at: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

/// Audit record of an administrative policy change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideChange {
    pub kind: OverrideKind,
    /// Collection name for `CollectionMode` changes.
    pub collection: Option<String>,
    pub previous: String,
    pub new: String,
    pub changed_by: String,
    pub changed_at: DateTime<Utc>,
    pub reason: Option<String>,
}

struct Activation {
    changed_by: String,
    changed_at: DateTime<Utc>,
    reason: Option<String>,
}

/// Lock-free readable on/off switch with activation metadata.
pub(crate) struct OverrideSwitch {
    active: AtomicBool,
    last_change: RwLock<Option<Activation>>,
}

impl OverrideSwitch {
    pub(crate) fn new(initially_active: bool) -> Self {
        Self {
            active: AtomicBool::new(initially_active),
            last_change: RwLock::new(None),
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Set the switch, returning the previous value.
    pub(crate) fn set(&self, active: bool, changed_by: &str, reason: Option<&str>) -> bool {
        let previous = self.active.swap(active, Ordering::AcqRel);
        *self.last_change.write() = Some(Activation {
            changed_by: changed_by.to_string(),
            changed_at: Utc::now(),
            reason: reason.map(str::to_string),
        });
        previous
    }

    pub(crate) fn state(&self) -> OverrideState {
        let last = self.last_change.read();
        OverrideState {
            active: self.is_active(),
            changed_by: last.as_ref().map(|a| a.changed_by.clone()),
            changed_at: last.as_ref().map(|a| a.changed_at),
            reason: last.as_ref().and_then(|a| a.reason.clone()),
        }
    }
}
