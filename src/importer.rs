//! Bulk Importer
//!
//! Imports externally sourced records into the `creations` collection exactly
//! once each. Every item gets a deterministic idempotency key and a
//! rule-based classification before it passes through the validation gate;
//! re-running an import after a partial failure only creates what is missing.

pub mod batch;
pub mod classify;
pub mod idempotency;
pub mod item;
pub mod normalize;

pub use batch::BulkImporter;
pub use classify::{classify, Classification, ClassificationRule, Medium, WorkType};
pub use idempotency::{derive_key, KeyError};
pub use item::{ImportRunOutcome, ItemReport, ItemStatus, RawRecord};
