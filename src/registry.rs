//! Registry Service
//!
//! Composes the store, validation gate, resolver and importer. Every write
//! made through the service passes the gate first; reads go through the
//! resolver so callers always learn where data came from.

use crate::config::{RegistryConfig, StorageBackend};
use crate::entity::{EntityId, EntityPatch, EntityRecord, EntityStatus, EntityType, EntityTypeRegistry};
use crate::error::ApiError;
use crate::importer::{BulkImporter, ImportRunOutcome, RawRecord};
use crate::resolver::{FallbackResolver, ResolutionResult};
use crate::source::{RemoteSource, SourceClient, SourceKind, StaticFallbackSource, StoreSource};
use crate::store::{MemoryRegistryStore, RegistryStore, SledRegistryStore};
use crate::validation::{ValidationGate, ValidationStatus};
use futures::future::join_all;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Reachability of one source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceHealth {
    pub source: SourceKind,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

/// Operational status: source probes plus the validation policy view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub sources: Vec<SourceHealth>,
    pub validation: ValidationStatus,
}

pub struct RegistryService {
    store: Arc<dyn RegistryStore>,
    gate: Arc<ValidationGate>,
    resolver: FallbackResolver,
    importer: BulkImporter,
    types: EntityTypeRegistry,
    probe_timeout: Duration,
}

impl RegistryService {
    /// Open the configured store and build every component from `config`.
    pub fn open(config: &RegistryConfig) -> Result<Self, ApiError> {
        let store: Arc<dyn RegistryStore> = match config.storage.backend {
            StorageBackend::Memory => Arc::new(MemoryRegistryStore::new()),
            StorageBackend::Sled => {
                let path = config.storage.resolve_path()?;
                info!(path = %path.display(), "Opening sled store");
                Arc::new(SledRegistryStore::open(&path)?)
            }
        };
        Self::with_store(config, store)
    }

    /// Build every component from `config` around an existing store.
    pub fn with_store(config: &RegistryConfig, store: Arc<dyn RegistryStore>) -> Result<Self, ApiError> {
        let mut sources: Vec<Arc<dyn SourceClient>> = vec![Arc::new(StoreSource::new(store.clone()))];
        if let Some(url) = &config.resolution.remote_url {
            sources.push(Arc::new(RemoteSource::new(url, config.resolution.timeout())?));
        }
        if config.resolution.static_fallback {
            sources.push(Arc::new(StaticFallbackSource::embedded()?));
        }

        let gate = Arc::new(ValidationGate::new(config.validation.clone()));
        let resolver = FallbackResolver::new(
            sources,
            EntityTypeRegistry::new(),
            config.resolution.timeout(),
            config.concurrency_limit,
        )
        .with_default_deadline(config.resolution.default_deadline());
        let importer = BulkImporter::new(
            store.clone(),
            gate.clone(),
            config.import.clone(),
            config.concurrency_limit,
        );

        Ok(Self::new(store, gate, resolver, importer).with_probe_timeout(config.resolution.timeout()))
    }

    /// Assemble from prebuilt components.
    pub fn new(
        store: Arc<dyn RegistryStore>,
        gate: Arc<ValidationGate>,
        resolver: FallbackResolver,
        importer: BulkImporter,
    ) -> Self {
        Self {
            store,
            gate,
            resolver,
            importer,
            types: EntityTypeRegistry::new(),
            probe_timeout: Duration::from_secs(2),
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn gate(&self) -> &Arc<ValidationGate> {
        &self.gate
    }

    pub fn store(&self) -> &Arc<dyn RegistryStore> {
        &self.store
    }

    pub fn resolver(&self) -> &FallbackResolver {
        &self.resolver
    }

    /// Gate and persist a new record.
    pub async fn create(&self, mut record: EntityRecord) -> Result<EntityRecord, ApiError> {
        let collection = self.types.collection_for(record.entity_type);
        let decision = self.gate.check_write(collection, &record.to_payload());
        if !decision.allow {
            return Err(ApiError::ValidationRejected {
                collection: collection.to_string(),
                violations: decision.violations,
            });
        }
        record.violations = decision.violations;
        self.store.create(collection, &record).await?;
        debug!(collection, id = %record.id, handle = %record.handle, "Record created");
        Ok(record)
    }

    /// Gate the patched record and persist the patch.
    pub async fn update(
        &self,
        entity_type: EntityType,
        identifier: &str,
        patch: EntityPatch,
    ) -> Result<EntityRecord, ApiError> {
        let collection = self.types.collection_for(entity_type);
        let current = self.find_stored(collection, identifier).await?;
        let candidate = current.patched(&patch);

        let decision = self.gate.check_write(collection, &candidate.to_payload());
        if !decision.allow {
            return Err(ApiError::ValidationRejected {
                collection: collection.to_string(),
                violations: decision.violations,
            });
        }
        let patch = EntityPatch {
            violations: Some(decision.violations),
            ..patch
        };
        let updated = self.store.update(collection, &current.id, &patch).await?;
        debug!(collection, id = %updated.id, "Record updated");
        Ok(updated)
    }

    /// Archive a record; records are never physically removed.
    pub async fn archive(&self, entity_type: EntityType, identifier: &str) -> Result<EntityRecord, ApiError> {
        let archived = self
            .update(entity_type, identifier, EntityPatch::status(EntityStatus::Archived))
            .await?;
        info!(entity_type = %entity_type, id = %archived.id, "Record archived");
        Ok(archived)
    }

    async fn find_stored(&self, collection: &str, identifier: &str) -> Result<EntityRecord, ApiError> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(ApiError::InvalidIdentifier(
                "identifier must not be empty".to_string(),
            ));
        }
        let found = match identifier.parse::<EntityId>() {
            Ok(id) => self.store.get(collection, &id).await?,
            Err(_) => self.store.find_by_handle(collection, identifier).await?,
        };
        found.ok_or_else(|| ApiError::EntityNotFound(format!("{}/{}", collection, identifier)))
    }

    pub async fn resolve(
        &self,
        entity_type: EntityType,
        identifier: &str,
    ) -> Result<ResolutionResult, ApiError> {
        self.resolver.resolve(entity_type, identifier).await
    }

    pub async fn resolve_many(
        &self,
        entity_type: EntityType,
        identifiers: &[String],
    ) -> Vec<Result<ResolutionResult, ApiError>> {
        self.resolver.resolve_many(entity_type, identifiers, None).await
    }

    pub async fn import(&self, items: Vec<RawRecord>) -> ImportRunOutcome {
        self.importer.import_batch(items).await
    }

    pub async fn import_stream<S>(&self, items: S, deadline: Option<tokio::time::Instant>) -> ImportRunOutcome
    where
        S: Stream<Item = RawRecord>,
    {
        self.importer.import_stream(items, deadline).await
    }

    pub fn validation_status(&self) -> ValidationStatus {
        self.gate.validation_status()
    }

    /// Probe every source and snapshot the validation policy.
    pub async fn health(&self) -> HealthReport {
        let probes = self.resolver.sources().iter().map(|source| async move {
            let started = Instant::now();
            let result = tokio::time::timeout(self.probe_timeout, source.probe()).await;
            let error = match result {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(_) => Some(format!("probe timed out after {:?}", self.probe_timeout)),
            };
            if let Some(error) = &error {
                warn!(source = %source.kind(), error = %error, "Source probe failed");
            }
            SourceHealth {
                source: source.kind(),
                healthy: error.is_none(),
                error,
                elapsed_ms: started.elapsed().as_millis() as u64,
            }
        });
        let sources = join_all(probes).await;
        let validation = self.validation_status();
        HealthReport {
            healthy: sources.iter().all(|s| s.healthy),
            sources,
            validation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ResolutionSource;
    use crate::validation::{EnforcementMode, ViolationKind};

    fn memory_config() -> RegistryConfig {
        let mut config = RegistryConfig::default();
        config.storage.backend = StorageBackend::Memory;
        config
    }

    fn service(config: &RegistryConfig) -> RegistryService {
        RegistryService::open(config).unwrap()
    }

    fn profile(handle: &str) -> EntityRecord {
        EntityRecord::new(EntityType::Profile, handle).with_attribute("display_name", "Ada Lovelace")
    }

    #[tokio::test]
    async fn test_create_then_resolve_from_primary() {
        let service = service(&memory_config());
        let created = service.create(profile("ada")).await.unwrap();

        let result = service.resolve(EntityType::Profile, "ada").await.unwrap();
        assert_eq!(result.source, ResolutionSource::Primary);
        assert_eq!(result.data.unwrap().id, created.id);
    }

    #[tokio::test]
    async fn test_create_rejected_under_enforce() {
        let service = service(&memory_config());
        let err = service
            .create(EntityRecord::new(EntityType::Profile, "ada"))
            .await
            .unwrap_err();
        match err {
            ApiError::ValidationRejected { collection, violations } => {
                assert_eq!(collection, "profiles");
                assert!(violations
                    .iter()
                    .any(|v| v.field == "display_name" && v.kind == ViolationKind::Missing));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_update_records_warnings_under_warn() {
        let mut config = memory_config();
        config.validation = config
            .validation
            .clone()
            .with_collection("profiles", EnforcementMode::Warn);
        let service = service(&config);
        service.create(profile("ada")).await.unwrap();

        let mut patch = EntityPatch::default();
        patch
            .attributes
            .insert("display_name".to_string(), serde_json::Value::Null);
        let updated = service.update(EntityType::Profile, "ada", patch).await.unwrap();
        assert!(updated.attributes.get("display_name").is_none());
        assert!(updated.violations.iter().any(|v| v.field == "display_name"));
    }

    #[tokio::test]
    async fn test_archive_keeps_record() {
        let service = service(&memory_config());
        let created = service.create(profile("ada")).await.unwrap();

        let archived = service
            .archive(EntityType::Profile, &created.id.to_string())
            .await
            .unwrap();
        assert!(archived.is_archived());

        let resolved = service.resolve(EntityType::Profile, "ada").await.unwrap();
        assert!(resolved.data.unwrap().is_archived());
    }

    #[tokio::test]
    async fn test_archive_unknown_record() {
        let service = service(&memory_config());
        assert!(matches!(
            service.archive(EntityType::Profile, "nobody").await,
            Err(ApiError::EntityNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_static_fallback_serves_when_store_empty() {
        let service = service(&memory_config());
        let result = service.resolve(EntityType::Profile, "registry").await.unwrap();
        assert_eq!(result.source, ResolutionSource::StaticFallback);
    }

    #[tokio::test]
    async fn test_health_reports_sources_and_policy() {
        let service = service(&memory_config());
        service
            .gate()
            .set_emergency_bypass(true, "oncall", Some("incident 12"));

        let report = service.health().await;
        assert!(report.healthy);
        assert_eq!(
            report.sources.iter().map(|s| s.source).collect::<Vec<_>>(),
            vec![SourceKind::Primary, SourceKind::StaticFallback]
        );
        assert!(report.validation.emergency_bypass.active);
        assert_eq!(report.validation.history.len(), 1);
    }
}
