use agent_registry::config::RegistryConfig;
use agent_registry::entity::{EntityRecord, EntityType};
use agent_registry::resolver::AttemptOutcome;
use agent_registry::source::SourceKind;
use agent_registry::{RegistryService, ResolutionSource};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::support::memory_config;

fn with_remote(server: &MockServer) -> RegistryConfig {
    let mut config = memory_config();
    config.resolution.remote_url = Some(server.uri());
    config.resolution.timeout_ms = 500;
    config
}

async fn mount_profile(server: &MockServer, handle: &str, display_name: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/profiles/{}", handle)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "id": agent_registry::entity::EntityId::generate().to_string(),
                "handle": handle,
                "attributes": {"display_name": display_name}
            }
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn primary_wins_without_merging() {
    let server = MockServer::start().await;
    // "registry" also exists in the embedded static table.
    mount_profile(&server, "registry", "Remote Copy").await;
    let service = RegistryService::open(&with_remote(&server)).unwrap();
    service
        .create(
            EntityRecord::new(EntityType::Profile, "registry")
                .with_attribute("display_name", "Primary Copy"),
        )
        .await
        .unwrap();

    let result = service.resolve(EntityType::Profile, "registry").await.unwrap();
    assert_eq!(result.source, ResolutionSource::Primary);
    let data = result.data.unwrap();
    assert_eq!(data.attributes["display_name"], json!("Primary Copy"));
    assert_eq!(result.attempts.len(), 1);
}

#[tokio::test]
async fn remote_serves_when_primary_misses() {
    let server = MockServer::start().await;
    mount_profile(&server, "grace", "Grace Hopper").await;
    let service = RegistryService::open(&with_remote(&server)).unwrap();

    let result = service.resolve(EntityType::Profile, "grace").await.unwrap();
    assert_eq!(result.source, ResolutionSource::Remote);
    assert_eq!(
        result.attempts.iter().map(|a| a.source).collect::<Vec<_>>(),
        vec![SourceKind::Primary, SourceKind::Remote]
    );
    assert_eq!(result.attempts[0].outcome, AttemptOutcome::Absent);
}

#[tokio::test]
async fn remote_outage_falls_through_to_static() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let service = RegistryService::open(&with_remote(&server)).unwrap();

    let result = service.resolve(EntityType::Profile, "registry").await.unwrap();
    assert_eq!(result.source, ResolutionSource::StaticFallback);
    assert!(matches!(
        result.attempts[1].outcome,
        AttemptOutcome::Unavailable { .. }
    ));

    let health = service.health().await;
    assert!(!health.healthy);
    assert!(health
        .sources
        .iter()
        .any(|s| s.source == SourceKind::Remote && !s.healthy));
}

#[tokio::test]
async fn unknown_everywhere_is_clean_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let service = RegistryService::open(&with_remote(&server)).unwrap();

    let result = service.resolve(EntityType::Profile, "nobody").await.unwrap();
    assert!(result.is_not_found());
    assert_eq!(result.source, ResolutionSource::None);
    assert!(result.error.is_none());
    assert_eq!(result.attempts.len(), 3);
}
