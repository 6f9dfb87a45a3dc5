use agent_registry::config::StorageBackend;
use agent_registry::entity::EntityType;
use agent_registry::{RegistryService, ResolutionSource};
use tempfile::TempDir;

use crate::support::{memory_config, song};

#[tokio::test]
async fn imports_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let mut config = memory_config();
    config.storage.backend = StorageBackend::Sled;
    config.storage.path = Some(dir.path().join("store"));

    let handle = {
        let service = RegistryService::open(&config).unwrap();
        let outcome = service.import(vec![song("1", "Night Train")]).await;
        assert_eq!(outcome.created, 1);
        let id = outcome.created_ids()[0];
        service
            .store()
            .get("creations", &id)
            .await
            .unwrap()
            .unwrap()
            .handle
    };

    let service = RegistryService::open(&config).unwrap();
    let rerun = service.import(vec![song("1", "Night Train")]).await;
    assert_eq!((rerun.created, rerun.skipped), (0, 1));

    let result = service.resolve(EntityType::Creation, &handle).await.unwrap();
    assert_eq!(result.source, ResolutionSource::Primary);
    assert_eq!(result.data.unwrap().handle, handle);
}
