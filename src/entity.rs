//! Entity Model
//!
//! Records tracked by the registry (profiles, creative works, applications,
//! webhooks), their identifiers, and the static table describing how each
//! entity type is stored and resolved.

pub mod id;
pub mod record;
pub mod registration;

pub use id::EntityId;
pub use record::{EntityPatch, EntityRecord, EntityStatus, EntityType};
pub use registration::{EntityTypeConfig, EntityTypeRegistry};
