//! Shared setup for the Gate integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use sigil::catalog::{MemoryCatalog, MemoryStorage};
use sigil::core::{Clock, ManualClock};
use sigil::{Collaborators, Gate, GateConfig};
use sigil_testkit::network::EPOCH_MS;
use sigil_testkit::Network;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub struct Harness {
    pub network: Network,
    pub gate: Gate,
    pub storage: Arc<MemoryStorage>,
    /// The client's clock. Key servers run on `network.clock`.
    pub client_clock: ManualClock,
}

impl Harness {
    pub fn new(servers: usize, config: GateConfig) -> Self {
        init_tracing();
        let network = Network::new(servers);
        let client_clock = ManualClock::new(EPOCH_MS);
        let storage = Arc::new(MemoryStorage::new());
        let parts = Collaborators {
            key_servers: network.key_servers(),
            ledger: network.ledger.clone(),
            catalog: Arc::new(MemoryCatalog::new()),
            storage: storage.clone(),
            clock: Arc::new(client_clock.clone()) as Arc<dyn Clock>,
        };
        let gate = Gate::new(network.namespace, config, parts).unwrap();
        Self {
            network,
            gate,
            storage,
            client_clock,
        }
    }

    /// Move the client and the key servers forward together.
    pub fn advance(&self, by: std::time::Duration) {
        self.client_clock.advance(by);
        self.network.clock.advance(by);
    }
}

pub fn threshold(threshold: u32) -> GateConfig {
    GateConfig {
        threshold,
        ..Default::default()
    }
}
