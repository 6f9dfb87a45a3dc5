use agent_registry::config::RegistryConfig;
use agent_registry::entity::{EntityRecord, EntityType};
use agent_registry::importer::{ItemStatus, RawRecord};
use agent_registry::validation::{BypassReason, EnforcementMode};
use agent_registry::{ApiError, RegistryService};
use serde_json::json;

use crate::support::memory_config;

fn untitled() -> RawRecord {
    RawRecord::new("archive", "untitled-1").with_mime_type("image/png")
}

#[tokio::test]
async fn enforce_rejects_malformed_import() {
    let service = RegistryService::open(&memory_config()).unwrap();
    let outcome = service.import(vec![untitled()]).await;
    assert_eq!(outcome.rejected, 1);
    match &outcome.items[0].status {
        ItemStatus::Rejected { violations } => {
            assert!(violations.iter().any(|v| v.field == "title"));
        }
        other => panic!("unexpected status: {:?}", other),
    }
}

#[tokio::test]
async fn warn_persists_malformed_import_with_violations() {
    let mut config: RegistryConfig = memory_config();
    config.validation = config
        .validation
        .clone()
        .with_collection("creations", EnforcementMode::Warn);
    let service = RegistryService::open(&config).unwrap();

    let outcome = service.import(vec![untitled()]).await;
    assert_eq!(outcome.created, 1);
    let id = outcome.created_ids()[0];

    let stored = service.store().get("creations", &id).await.unwrap().unwrap();
    assert!(stored.violations.iter().any(|v| v.field == "title"));
}

#[tokio::test]
async fn emergency_bypass_allows_empty_payload() {
    let mut config = memory_config();
    config.validation.emergency_bypass = true;
    let service = RegistryService::open(&config).unwrap();

    for collection in ["profiles", "creations", "applications", "webhooks", "unknown"] {
        let decision = service.gate().check_write(collection, &json!({}));
        assert!(decision.allow, "{} should allow", collection);
        assert_eq!(decision.bypass, Some(BypassReason::EmergencyBypass));
    }

    // A bare record with no attributes is stored.
    service
        .create(EntityRecord::new(EntityType::Profile, "bare"))
        .await
        .unwrap();
}

#[tokio::test]
async fn runtime_toggle_applies_to_next_write() {
    let service = RegistryService::open(&memory_config()).unwrap();
    let bare = || EntityRecord::new(EntityType::Application, "console-2");

    assert!(matches!(
        service.create(bare()).await,
        Err(ApiError::ValidationRejected { .. })
    ));

    service
        .gate()
        .set_global_disable(true, "oncall", Some("schema migration"));
    service.create(bare()).await.unwrap();

    let status = service.validation_status();
    assert!(status.global_disable.active);
    assert_eq!(status.history.len(), 1);
}
