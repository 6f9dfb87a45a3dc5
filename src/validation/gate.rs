//! Write-path gate and its administrative surface.

use super::policy::{
    BypassReason, EnforcementMode, OverrideChange, OverrideKind, OverrideState, OverrideSwitch,
    ValidationPolicy,
};
use super::schema::SchemaRegistry;
use super::Violation;
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Audit log target for bypassed writes and policy changes.
pub const AUDIT_TARGET: &str = "agent_registry::audit";

/// Override changes kept in memory; older entries remain in the audit log only.
pub const HISTORY_LIMIT: usize = 256;

/// Outcome of [`ValidationGate::check_write`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub allow: bool,
    pub mode: EnforcementMode,
    pub violations: Vec<Violation>,
    /// Set whenever the schema check was skipped.
    pub bypass: Option<BypassReason>,
}

impl Decision {
    pub fn is_bypassed(&self) -> bool {
        self.bypass.is_some()
    }
}

/// Snapshot returned by [`ValidationGate::validation_status`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationStatus {
    pub default_mode: EnforcementMode,
    /// Explicitly configured per-collection modes.
    pub collections: BTreeMap<String, EnforcementMode>,
    /// Mode each known collection would use right now, overrides applied.
    pub effective: BTreeMap<String, EnforcementMode>,
    pub emergency_bypass: OverrideState,
    pub global_disable: OverrideState,
    pub history: Vec<OverrideChange>,
}

/// Validation gate consulted by every write.
///
/// The collection map sits behind an `Arc` that is swapped on change, so a
/// reader holds the lock only long enough to clone the pointer; both override
/// flags are atomics.
pub struct ValidationGate {
    default_mode: EnforcementMode,
    collections: RwLock<Arc<BTreeMap<String, EnforcementMode>>>,
    emergency_bypass: OverrideSwitch,
    global_disable: OverrideSwitch,
    schemas: SchemaRegistry,
    history: RwLock<VecDeque<OverrideChange>>,
}

impl ValidationGate {
    /// Create a gate over the built-in collection schemas.
    pub fn new(policy: ValidationPolicy) -> Self {
        Self::with_schemas(policy, SchemaRegistry::builtin())
    }

    pub fn with_schemas(policy: ValidationPolicy, schemas: SchemaRegistry) -> Self {
        if policy.emergency_bypass {
            warn!(target: AUDIT_TARGET, "Emergency bypass active from configuration");
        }
        if policy.global_disable {
            warn!(target: AUDIT_TARGET, "Global validation disable active from configuration");
        }
        Self {
            default_mode: policy.default_mode,
            collections: RwLock::new(Arc::new(policy.collections)),
            emergency_bypass: OverrideSwitch::new(policy.emergency_bypass),
            global_disable: OverrideSwitch::new(policy.global_disable),
            schemas,
            history: RwLock::new(VecDeque::with_capacity(HISTORY_LIMIT)),
        }
    }

    fn collection_modes(&self) -> Arc<BTreeMap<String, EnforcementMode>> {
        Arc::clone(&self.collections.read())
    }

    /// Resolve the mode a write to `collection` would use, most specific last:
    /// emergency bypass, global disable, collection mode, default.
    pub fn effective_mode(&self, collection: &str) -> (EnforcementMode, Option<BypassReason>) {
        if self.emergency_bypass.is_active() {
            return (EnforcementMode::Bypass, Some(BypassReason::EmergencyBypass));
        }
        if self.global_disable.is_active() {
            return (EnforcementMode::Bypass, Some(BypassReason::GlobalDisable));
        }
        let mode = self
            .collection_modes()
            .get(collection)
            .copied()
            .unwrap_or(self.default_mode);
        if mode == EnforcementMode::Bypass {
            (mode, Some(BypassReason::CollectionPolicy))
        } else {
            (mode, None)
        }
    }

    /// Decide whether a write may proceed.
    pub fn check_write(&self, collection: &str, payload: &Value) -> Decision {
        let (mode, bypass) = self.effective_mode(collection);

        match mode {
            EnforcementMode::Bypass => {
                info!(
                    target: AUDIT_TARGET,
                    collection,
                    reason = %bypass.unwrap_or(BypassReason::CollectionPolicy),
                    "Validation bypassed"
                );
                Decision {
                    allow: true,
                    mode,
                    violations: Vec::new(),
                    bypass,
                }
            }
            EnforcementMode::Warn => {
                let violations = self.schemas.check(collection, payload);
                if !violations.is_empty() {
                    warn!(
                        collection,
                        violation_count = violations.len(),
                        fields = ?violations.iter().map(|v| v.field.as_str()).collect::<Vec<_>>(),
                        "Write accepted with validation warnings"
                    );
                }
                Decision {
                    allow: true,
                    mode,
                    violations,
                    bypass: None,
                }
            }
            EnforcementMode::Enforce => {
                let violations = self.schemas.check(collection, payload);
                let allow = violations.is_empty();
                if allow {
                    debug!(collection, "Write passed validation");
                } else {
                    info!(
                        collection,
                        violation_count = violations.len(),
                        fields = ?violations.iter().map(|v| v.field.as_str()).collect::<Vec<_>>(),
                        "Write rejected by validation"
                    );
                }
                Decision {
                    allow,
                    mode,
                    violations,
                    bypass: None,
                }
            }
        }
    }

    /// Full policy view for operational status reporting.
    pub fn validation_status(&self) -> ValidationStatus {
        let collections = (*self.collection_modes()).clone();
        let mut known: Vec<String> = self.schemas.collections();
        known.extend(collections.keys().cloned());
        known.sort();
        known.dedup();

        let effective = known
            .into_iter()
            .map(|name| {
                let (mode, _) = self.effective_mode(&name);
                (name, mode)
            })
            .collect();

        ValidationStatus {
            default_mode: self.default_mode,
            collections,
            effective,
            emergency_bypass: self.emergency_bypass.state(),
            global_disable: self.global_disable.state(),
            history: self.history(),
        }
    }

    pub fn is_emergency_bypass_active(&self) -> bool {
        self.emergency_bypass.is_active()
    }

    pub fn is_global_disable_active(&self) -> bool {
        self.global_disable.is_active()
    }

    /// Turn the emergency bypass on or off.
    pub fn set_emergency_bypass(&self, active: bool, actor: &str, reason: Option<&str>) {
        let previous = self.emergency_bypass.set(active, actor, reason);
        self.record_flag_change(OverrideKind::EmergencyBypass, previous, active, actor, reason);
    }

    /// Turn the standing global disable on or off.
    pub fn set_global_disable(&self, active: bool, actor: &str, reason: Option<&str>) {
        let previous = self.global_disable.set(active, actor, reason);
        self.record_flag_change(OverrideKind::GlobalDisable, previous, active, actor, reason);
    }

    /// Change the configured mode of a single collection.
    pub fn set_collection_mode(&self, collection: &str, mode: EnforcementMode, actor: &str) {
        let previous = {
            let mut guard = self.collections.write();
            let mut next = (**guard).clone();
            let previous = next.insert(collection.to_string(), mode);
            *guard = Arc::new(next);
            previous
        };
        let previous = previous.unwrap_or(self.default_mode);

        warn!(
            target: AUDIT_TARGET,
            collection,
            previous = %previous,
            new = %mode,
            changed_by = actor,
            "Collection enforcement mode changed"
        );
        self.push_history(OverrideChange {
            kind: OverrideKind::CollectionMode,
            collection: Some(collection.to_string()),
            previous: previous.to_string(),
            new: mode.to_string(),
            changed_by: actor.to_string(),
            changed_at: Utc::now(),
            reason: None,
        });
    }

    /// Administrative change log, oldest first, holding at most [`HISTORY_LIMIT`] entries.
    pub fn history(&self) -> Vec<OverrideChange> {
        self.history.read().iter().cloned().collect()
    }

    fn push_history(&self, change: OverrideChange) {
        let mut history = self.history.write();
        if history.len() == HISTORY_LIMIT {
            history.pop_front();
        }
        history.push_back(change);
    }

    fn record_flag_change(
        &self,
        kind: OverrideKind,
        previous: bool,
        active: bool,
        actor: &str,
        reason: Option<&str>,
    ) {
        warn!(
            target: AUDIT_TARGET,
            kind = ?kind,
            previous,
            active,
            changed_by = actor,
            reason = reason.unwrap_or(""),
            "Validation override changed"
        );
        self.push_history(OverrideChange {
            kind,
            collection: None,
            previous: previous.to_string(),
            new: active.to_string(),
            changed_by: actor.to_string(),
            changed_at: Utc::now(),
            reason: reason.map(str::to_string),
        });
    }
}

impl Default for ValidationGate {
    fn default() -> Self {
        Self::new(ValidationPolicy::default())
    }
}
