//! Integration tests for the agent registry core

mod import_idempotency;
mod resolution_fallback;
mod sled_store;
mod support;
mod validation_gate;
