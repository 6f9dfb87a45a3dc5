//! Import run execution.
//!
//! Items run concurrently up to the configured limit. Items sharing an
//! idempotency key are serialized through [`KeyLockManager`], and the store's
//! key uniqueness decides any race that gets past the lock.

use super::classify::classify;
use super::idempotency::derive_key;
use super::item::{ImportRunOutcome, ItemReport, ItemStatus, RawRecord};
use super::normalize::build_creation;
use crate::concurrency::KeyLockManager;
use crate::config::ImportConfig;
use crate::entity::{EntityId, EntityType, EntityTypeRegistry};
use crate::error::StorageError;
use crate::store::RegistryStore;
use crate::validation::ValidationGate;
use futures::stream::{self, Stream, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, sleep_until, timeout_at, Instant};
use tracing::{debug, info, warn};

const DEADLINE_EXCEEDED: &str = "deadline exceeded";

/// Bulk importer for historical datasets.
pub struct BulkImporter {
    store: Arc<dyn RegistryStore>,
    gate: Arc<ValidationGate>,
    config: ImportConfig,
    concurrency: usize,
    collection: &'static str,
    locks: KeyLockManager,
}

impl BulkImporter {
    pub fn new(
        store: Arc<dyn RegistryStore>,
        gate: Arc<ValidationGate>,
        config: ImportConfig,
        concurrency: usize,
    ) -> Self {
        Self {
            store,
            gate,
            config,
            concurrency: concurrency.max(1),
            collection: EntityTypeRegistry::new().collection_for(EntityType::Creation),
            locks: KeyLockManager::new(),
        }
    }

    pub fn collection(&self) -> &'static str {
        self.collection
    }

    /// Import a fully materialized batch.
    pub async fn import_batch(&self, items: Vec<RawRecord>) -> ImportRunOutcome {
        self.import_stream(stream::iter(items), None).await
    }

    /// Import items as they arrive.
    ///
    /// Once `deadline` passes no further items are pulled from `items`, and
    /// items still in flight are reported as failed.
    pub async fn import_stream<S>(&self, items: S, deadline: Option<Instant>) -> ImportRunOutcome
    where
        S: Stream<Item = RawRecord>,
    {
        let started = std::time::Instant::now();
        info!(
            collection = self.collection,
            concurrency = self.concurrency,
            has_deadline = deadline.is_some(),
            "Import run started"
        );

        let items = match deadline {
            Some(deadline) => items.take_until(sleep_until(deadline)).left_stream(),
            None => items.right_stream(),
        };

        let reports: Vec<ItemReport> = items
            .enumerate()
            .map(|(index, raw)| self.run_item(index, raw, deadline))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        self.locks.prune();
        let outcome = ImportRunOutcome::from_reports(reports);
        info!(
            total = outcome.total,
            created = outcome.created,
            skipped = outcome.skipped,
            rejected = outcome.rejected,
            failed = outcome.failed,
            duration_ms = started.elapsed().as_millis() as u64,
            "Import run finished"
        );
        outcome
    }

    async fn run_item(&self, index: usize, raw: RawRecord, deadline: Option<Instant>) -> ItemReport {
        let Some(deadline) = deadline else {
            return self.process_item(index, &raw).await;
        };
        if Instant::now() >= deadline {
            return Self::deadline_report(index, &raw);
        }
        match timeout_at(deadline, self.process_item(index, &raw)).await {
            Ok(report) => report,
            Err(_) => {
                warn!(
                    index,
                    origin_system = %raw.origin_system,
                    origin_id = %raw.origin_id,
                    "Import item abandoned at deadline"
                );
                Self::deadline_report(index, &raw)
            }
        }
    }

    fn deadline_report(index: usize, raw: &RawRecord) -> ItemReport {
        let mut report = ItemReport::new(
            index,
            raw,
            ItemStatus::Failed {
                reason: DEADLINE_EXCEEDED.to_string(),
            },
        );
        report.idempotency_key = derive_key(&raw.origin_system, &raw.origin_id).ok();
        report
    }

    async fn process_item(&self, index: usize, raw: &RawRecord) -> ItemReport {
        if let Some(reason) = &raw.malformed {
            warn!(index, reason = %reason, "Import item could not be read");
            return ItemReport::new(
                index,
                raw,
                ItemStatus::Failed {
                    reason: format!("unreadable item: {}", reason),
                },
            );
        }
        let key = match derive_key(&raw.origin_system, &raw.origin_id) {
            Ok(key) => key,
            Err(e) => {
                warn!(index, error = %e, "Import item has no usable origin");
                return ItemReport::new(
                    index,
                    raw,
                    ItemStatus::Failed {
                        reason: e.to_string(),
                    },
                );
            }
        };

        let classification = classify(raw);
        let mut report = ItemReport::new(
            index,
            raw,
            ItemStatus::Failed {
                reason: String::new(),
            },
        );
        report.idempotency_key = Some(key.clone());
        report.classification = Some(classification);

        let _guard = self.locks.lock(&key).await;

        let lookup = self
            .with_retry(&mut report.attempts, "find_by_key", || {
                self.store.find_by_key(self.collection, &key)
            })
            .await;
        match lookup {
            Ok(Some(existing)) => {
                debug!(index, key = %key, existing_id = %existing.id, "Import item already present");
                report.status = ItemStatus::Duplicate {
                    existing_id: Some(existing.id),
                };
                return report;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(index, key = %key, error = %e, "Import lookup failed");
                report.status = ItemStatus::Failed {
                    reason: format!("lookup failed: {}", e),
                };
                return report;
            }
        }

        let id = EntityId::generate();
        let mut record = build_creation(raw, id, &key, &classification);

        let decision = self.gate.check_write(self.collection, &record.to_payload());
        if !decision.allow {
            report.status = ItemStatus::Rejected {
                violations: decision.violations,
            };
            return report;
        }
        if !decision.violations.is_empty() {
            record.violations = decision.violations.clone();
            report.warnings = decision.violations;
        }

        let created = self
            .with_retry(&mut report.attempts, "create", || {
                self.store.create(self.collection, &record)
            })
            .await;
        report.status = match created {
            Ok(()) => {
                debug!(
                    index,
                    key = %key,
                    id = %id,
                    work_type = classification.work_type.as_str(),
                    rule = ?classification.rule,
                    "Import item created"
                );
                ItemStatus::Created { id }
            }
            Err(StorageError::DuplicateKey { .. }) => {
                debug!(index, key = %key, "Import item lost create race");
                ItemStatus::Duplicate { existing_id: None }
            }
            Err(e) => {
                warn!(index, key = %key, error = %e, attempts = report.attempts, "Import item failed");
                ItemStatus::Failed {
                    reason: e.to_string(),
                }
            }
        };
        report
    }

    /// Run a store operation, retrying transient failures within the budget.
    async fn with_retry<T, F, Fut>(
        &self,
        attempts: &mut usize,
        operation: &str,
        mut op: F,
    ) -> Result<T, StorageError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StorageError>>,
    {
        let mut retries = 0;
        loop {
            *attempts += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && retries < self.config.retry_budget => {
                    retries += 1;
                    warn!(
                        operation,
                        retry = retries,
                        budget = self.config.retry_budget,
                        error = %e,
                        "Transient store failure, retrying"
                    );
                    sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityPatch, EntityRecord};
    use crate::store::MemoryRegistryStore;
    use crate::validation::{EnforcementMode, ValidationPolicy, ViolationKind};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config() -> ImportConfig {
        ImportConfig {
            retry_budget: 2,
            retry_delay_ms: 1,
        }
    }

    fn importer_with(store: Arc<dyn RegistryStore>, policy: ValidationPolicy) -> BulkImporter {
        BulkImporter::new(store, Arc::new(ValidationGate::new(policy)), config(), 4)
    }

    fn item(id: &str, title: &str) -> RawRecord {
        RawRecord::new("archive", id).with_title(title)
    }

    /// Store wrapper failing the first `failures` creates with a transient error.
    struct FlakyStore {
        inner: MemoryRegistryStore,
        failures: AtomicUsize,
        permanent: bool,
        /// Lookups miss and creates report the key as taken, as when another
        /// writer wins between the two.
        key_race: bool,
        create_delay: Option<Duration>,
    }

    impl FlakyStore {
        fn new(failures: usize) -> Self {
            Self {
                inner: MemoryRegistryStore::new(),
                failures: AtomicUsize::new(failures),
                permanent: false,
                key_race: false,
                create_delay: None,
            }
        }
    }

    #[async_trait]
    impl RegistryStore for FlakyStore {
        async fn get(&self, c: &str, id: &EntityId) -> Result<Option<EntityRecord>, StorageError> {
            self.inner.get(c, id).await
        }

        async fn find_by_key(&self, c: &str, k: &str) -> Result<Option<EntityRecord>, StorageError> {
            if self.key_race {
                return Ok(None);
            }
            self.inner.find_by_key(c, k).await
        }

        async fn find_by_handle(
            &self,
            c: &str,
            h: &str,
        ) -> Result<Option<EntityRecord>, StorageError> {
            self.inner.find_by_handle(c, h).await
        }

        async fn create(&self, c: &str, record: &EntityRecord) -> Result<(), StorageError> {
            if let Some(delay) = self.create_delay {
                sleep(delay).await;
            }
            if self.key_race {
                return Err(StorageError::DuplicateKey {
                    collection: c.to_string(),
                    key: record.idempotency_key.clone().unwrap_or_default(),
                });
            }
            if self.permanent {
                return Err(StorageError::Corrupt {
                    collection: c.to_string(),
                    reason: "read-only".to_string(),
                });
            }
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(StorageError::Unavailable("connection reset".to_string()));
            }
            self.inner.create(c, record).await
        }

        async fn update(
            &self,
            c: &str,
            id: &EntityId,
            patch: &EntityPatch,
        ) -> Result<EntityRecord, StorageError> {
            self.inner.update(c, id, patch).await
        }

        async fn list(&self, c: &str) -> Result<Vec<EntityRecord>, StorageError> {
            self.inner.list(c).await
        }
    }

    #[tokio::test]
    async fn test_duplicate_within_batch_is_skipped() {
        let store = Arc::new(MemoryRegistryStore::new());
        let importer = importer_with(store.clone(), ValidationPolicy::default());

        let outcome = importer
            .import_batch(vec![item("1", "Harbor"), item("2", "Field"), item("1", "Harbor")])
            .await;

        assert_eq!((outcome.created, outcome.skipped), (2, 1));
        assert!(outcome.is_consistent());
        assert_eq!(store.list("creations").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rerun_creates_nothing() {
        let store = Arc::new(MemoryRegistryStore::new());
        let importer = importer_with(store.clone(), ValidationPolicy::default());
        let batch = vec![item("1", "Harbor"), item("2", "Field")];

        let first = importer.import_batch(batch.clone()).await;
        let second = importer.import_batch(batch).await;

        assert_eq!(first.created, 2);
        assert_eq!((second.created, second.skipped), (0, 2));
        for report in &second.items {
            assert!(matches!(
                report.status,
                ItemStatus::Duplicate {
                    existing_id: Some(_)
                }
            ));
        }
    }

    #[tokio::test]
    async fn test_missing_origin_fails_item_only() {
        let importer = importer_with(
            Arc::new(MemoryRegistryStore::new()),
            ValidationPolicy::default(),
        );
        let outcome = importer
            .import_batch(vec![item("", "No id"), item("1", "Harbor")])
            .await;
        assert_eq!((outcome.failed, outcome.created), (1, 1));
        assert!(outcome.items[0].idempotency_key.is_none());
    }

    #[tokio::test]
    async fn test_malformed_item_fails_alone() {
        let store = Arc::new(MemoryRegistryStore::new());
        let importer = importer_with(store.clone(), ValidationPolicy::default());
        let outcome = importer
            .import_batch(vec![
                RawRecord::malformed("expected value at line 1 column 1"),
                item("1", "Harbor"),
            ])
            .await;
        assert_eq!((outcome.failed, outcome.created, outcome.total), (1, 1, 2));
        assert!(matches!(
            &outcome.items[0].status,
            ItemStatus::Failed { reason } if reason.starts_with("unreadable item")
        ));
        assert_eq!(store.list("creations").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_enforce_rejects_missing_title() {
        let importer = importer_with(
            Arc::new(MemoryRegistryStore::new()),
            ValidationPolicy::default(),
        );
        let outcome = importer
            .import_batch(vec![RawRecord::new("archive", "1")])
            .await;
        assert_eq!(outcome.rejected, 1);
        match &outcome.items[0].status {
            ItemStatus::Rejected { violations } => {
                assert!(violations
                    .iter()
                    .any(|v| v.field == "title" && v.kind == ViolationKind::Missing));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_warn_persists_with_violations() {
        let store = Arc::new(MemoryRegistryStore::new());
        let policy = ValidationPolicy::default().with_collection("creations", EnforcementMode::Warn);
        let importer = importer_with(store.clone(), policy);

        let outcome = importer
            .import_batch(vec![RawRecord::new("archive", "1")])
            .await;
        assert_eq!(outcome.created, 1);
        assert!(!outcome.items[0].warnings.is_empty());

        let stored = store.list("creations").await.unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].violations.iter().any(|v| v.field == "title"));
    }

    #[tokio::test]
    async fn test_transient_failures_retried_within_budget() {
        let store = Arc::new(FlakyStore::new(2));
        let importer = importer_with(store.clone(), ValidationPolicy::default());

        let outcome = importer.import_batch(vec![item("1", "Harbor")]).await;
        assert_eq!(outcome.created, 1);
        // lookup + three create attempts
        assert_eq!(outcome.items[0].attempts, 4);
    }

    #[tokio::test]
    async fn test_retry_budget_exhausted() {
        let store = Arc::new(FlakyStore::new(10));
        let importer = importer_with(store.clone(), ValidationPolicy::default());

        let outcome = importer.import_batch(vec![item("1", "Harbor")]).await;
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.items[0].attempts, 1 + 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_not_retried() {
        let mut flaky = FlakyStore::new(0);
        flaky.permanent = true;
        let importer = importer_with(Arc::new(flaky), ValidationPolicy::default());

        let outcome = importer.import_batch(vec![item("1", "Harbor")]).await;
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.items[0].attempts, 2);
    }

    #[tokio::test]
    async fn test_duplicate_key_on_create_counts_as_skipped() {
        let mut racing = FlakyStore::new(0);
        racing.key_race = true;
        let importer = importer_with(Arc::new(racing), ValidationPolicy::default());

        let outcome = importer.import_batch(vec![item("1", "Harbor")]).await;
        assert_eq!((outcome.skipped, outcome.failed), (1, 0));
        assert_eq!(
            outcome.items[0].status,
            ItemStatus::Duplicate { existing_id: None }
        );
        // DuplicateKey is permanent: no retry after the single create.
        assert_eq!(outcome.items[0].attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_past_deadline_fails_in_flight_items() {
        let mut slow = FlakyStore::new(0);
        slow.create_delay = Some(Duration::from_secs(5));
        let importer = importer_with(Arc::new(slow), ValidationPolicy::default());
        let deadline = Instant::now() + Duration::from_millis(100);

        let started = Instant::now();
        let outcome = importer
            .import_stream(
                stream::iter(vec![item("1", "Harbor"), item("2", "Field")]),
                Some(deadline),
            )
            .await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!((outcome.total, outcome.failed), (2, 2));
        for report in &outcome.items {
            assert_eq!(
                report.status,
                ItemStatus::Failed {
                    reason: DEADLINE_EXCEEDED.to_string()
                }
            );
            assert!(report.idempotency_key.is_some());
        }
    }

    #[tokio::test]
    async fn test_pending_stream_cut_at_deadline() {
        let importer = importer_with(
            Arc::new(MemoryRegistryStore::new()),
            ValidationPolicy::default(),
        );
        // Pending stream keeps the run open until the deadline cuts it off.
        let items = stream::iter(vec![item("1", "Harbor")]).chain(stream::pending());
        let deadline = Instant::now() + Duration::from_millis(50);

        let outcome = importer.import_stream(items, Some(deadline)).await;
        assert_eq!(outcome.total, 1);
        assert!(outcome.is_consistent());
    }

    #[tokio::test]
    async fn test_expired_deadline_reports_failed() {
        let importer = importer_with(
            Arc::new(MemoryRegistryStore::new()),
            ValidationPolicy::default(),
        );
        let deadline = Instant::now();
        let outcome = importer
            .run_item(0, item("1", "Harbor"), Some(deadline - Duration::from_millis(1)))
            .await;
        assert_eq!(
            outcome.status,
            ItemStatus::Failed {
                reason: DEADLINE_EXCEEDED.to_string()
            }
        );
        assert!(outcome.idempotency_key.is_some());
    }
}
