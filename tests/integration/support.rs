use agent_registry::config::{RegistryConfig, StorageBackend};
use agent_registry::importer::RawRecord;
use agent_registry::RegistryService;

pub fn memory_config() -> RegistryConfig {
    let mut config = RegistryConfig::default();
    config.storage.backend = StorageBackend::Memory;
    config.import.retry_delay_ms = 1;
    config
}

pub fn memory_service() -> RegistryService {
    RegistryService::open(&memory_config()).unwrap()
}

pub fn song(origin_id: &str, title: &str) -> RawRecord {
    RawRecord::new("archive", origin_id)
        .with_title(title)
        .with_mime_type("audio/mpeg")
}
