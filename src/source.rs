//! Source Clients
//!
//! Places a record can be fetched from: the primary registry store, the remote
//! registry API, and the embedded static fallback table. Clients report found,
//! absent or unavailable; ordering and provenance belong to the resolver.

pub mod contract;
pub mod fallback;
pub mod primary;
pub mod remote;

pub use contract::{SourceClient, SourceError, SourceKind};
pub use fallback::StaticFallbackSource;
pub use primary::StoreSource;
pub use remote::RemoteSource;
