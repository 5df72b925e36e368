//! A gate backed by the SQLite catalog survives a restart.

mod common;

use std::sync::Arc;
use std::time::Duration;

use sigil::catalog::{MemoryStorage, SqliteCatalog};
use sigil::core::Clock;
use sigil::{AccessPolicy, Collaborators, ContentId, ContentMetadata, Gate, GateConfig};
use sigil_testkit::{CountingSigner, Network, TestWallet};

fn gate(network: &Network, storage: Arc<MemoryStorage>, path: &std::path::Path) -> Gate {
    let parts = Collaborators {
        key_servers: network.key_servers(),
        ledger: network.ledger.clone(),
        catalog: Arc::new(SqliteCatalog::open(path).unwrap()),
        storage,
        clock: network.clock(),
    };
    Gate::new(network.namespace, GateConfig::default(), parts).unwrap()
}

#[tokio::test]
async fn test_published_content_is_viewable_after_reopen() {
    common::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.db");
    let network = Network::new(1);
    let storage = Arc::new(MemoryStorage::new());
    let resource = network.resource(0x42);
    let id = ContentId::new("letter-7").unwrap();

    let record = {
        let gate = gate(&network, storage.clone(), &path);
        gate.publish(
            id.clone(),
            b"dear subscribers",
            resource,
            AccessPolicy::SubscriberGated,
            ContentMetadata::new("letter.txt", "text/plain", network.clock().now_millis()),
        )
        .await
        .unwrap()
    };
    assert!(record.encrypted);

    let reopened = gate(&network, storage, &path);
    assert_eq!(reopened.catalog().count().await.unwrap(), 1);
    assert_eq!(reopened.catalog().get(&id).await.unwrap(), Some(record));

    let wallet = TestWallet::new();
    network.subscribe(&wallet, resource, Duration::from_secs(3600));
    let signer = CountingSigner::new(wallet);
    let bytes = reopened.view(&id, &signer.address(), &signer).await.unwrap();
    assert_eq!(&bytes[..], b"dear subscribers");
    assert_eq!(signer.calls(), 1);
}
