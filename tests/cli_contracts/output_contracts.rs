use std::fs;

use agent_registry::config::{RegistryConfig, StorageBackend};
use agent_registry::entity::EntityType;
use agent_registry::tooling::cli::{CliContext, Commands, ValidationCommands};
use tempfile::TempDir;

fn json_context() -> CliContext {
    let mut config = RegistryConfig::default();
    config.storage.backend = StorageBackend::Memory;
    CliContext::from_config(&config, "json").unwrap()
}

#[test]
fn resolve_json_contract_has_required_fields() {
    let cli = json_context();
    let output = cli
        .execute(&Commands::Resolve {
            entity_type: EntityType::Profile,
            identifiers: vec!["registry".to_string(), "nobody".to_string()],
            deadline_ms: None,
        })
        .unwrap();

    let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
    let entries = parsed.as_array().unwrap();
    assert_eq!(entries.len(), 2);

    let found = &entries[0]["result"];
    assert_eq!(found["source"], "static_fallback");
    assert!(found["data"]["id"].as_str().is_some());
    let attempts = found["attempts"].as_array().unwrap();
    assert_eq!(attempts[0]["source"], "primary");
    assert_eq!(attempts[0]["outcome"], "absent");
    assert!(attempts[0]["elapsed_ms"].as_u64().is_some());

    let missing = &entries[1]["result"];
    assert_eq!(missing["source"], "none");
    assert!(missing["data"].is_null());
}

#[test]
fn import_json_contract_has_required_fields() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("items.json");
    fs::write(
        &file,
        r#"[
            {"origin_system": "archive", "origin_id": "1", "title": "Harbor", "mime_type": "image/jpeg"},
            {"origin_system": "archive", "origin_id": "1", "title": "Harbor", "mime_type": "image/jpeg"},
            {"origin_system": "archive", "origin_id": "2", "title": "Quay", "url": "https://cdn.example/quay.mp4"}
        ]"#,
    )
    .unwrap();

    let cli = json_context();
    let output = cli
        .execute(&Commands::Import {
            file,
            deadline_ms: None,
        })
        .unwrap();

    let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
    for field in ["total", "created", "skipped", "rejected", "failed"] {
        assert!(parsed[field].as_u64().is_some(), "missing {}", field);
    }
    assert_eq!(parsed["created"], 2);
    assert_eq!(parsed["skipped"], 1);
    let items = parsed["items"].as_array().unwrap();
    assert_eq!(items.len(), 3);
    assert!(items[0]["idempotency_key"].as_str().is_some());
    assert_eq!(items[0]["status"]["status"], "created");
}

#[test]
fn import_rejects_unreadable_file() {
    let cli = json_context();
    let result = cli.execute(&Commands::Import {
        file: "/nonexistent/items.json".into(),
        deadline_ms: None,
    });
    assert!(result.is_err());
}

#[test]
fn validation_status_json_contract_has_required_fields() {
    let cli = json_context();
    let output = cli
        .execute(&Commands::Validation {
            command: ValidationCommands::Status,
        })
        .unwrap();

    let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(parsed["default_mode"], "enforce");
    assert_eq!(parsed["emergency_bypass"]["active"], false);
    assert_eq!(parsed["global_disable"]["active"], false);
    assert!(parsed["effective"]["creations"].as_str().is_some());
    assert!(parsed["history"].as_array().is_some());
}

#[test]
fn health_json_contract_has_required_fields() {
    let cli = json_context();
    let output = cli.execute(&Commands::Health).unwrap();

    let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(parsed["healthy"], true);
    let sources = parsed["sources"].as_array().unwrap();
    assert_eq!(sources[0]["source"], "primary");
    assert!(parsed["validation"].is_object());
}
