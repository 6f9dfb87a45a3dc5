//! Agent Registry: resilient resolution and validation core
//!
//! Resolves agent records through an ordered chain of sources (primary store,
//! remote registry, embedded static table), gates every write through a
//! per-collection validation policy with operator overrides, and imports
//! external creations idempotently.

pub mod concurrency;
pub mod config;
pub mod entity;
pub mod error;
pub mod importer;
pub mod logging;
pub mod registry;
pub mod resolver;
pub mod source;
pub mod store;
pub mod tooling;
pub mod validation;

pub use error::{ApiError, StorageError};
pub use registry::{HealthReport, RegistryService};
pub use resolver::{FallbackResolver, ResolutionResult, ResolutionSource};
