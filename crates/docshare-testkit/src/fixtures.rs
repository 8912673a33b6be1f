//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use docshare::{DocShare, ShareConfig};
use docshare_core::PeerId;
use docshare_document::{Document, MemoryDocument};
use docshare_sync::{MemoryChannel, MemoryNetwork};

/// A deterministic peer id.
pub fn peer(byte: u8) -> PeerId {
    PeerId::from_bytes([byte; 32])
}

/// Two parties on one in-memory network. Alice initiates, Bob receives.
pub struct TwoPartyFixture {
    pub network: Arc<MemoryNetwork>,
    pub alice_id: PeerId,
    pub bob_id: PeerId,
    pub alice: DocShare<MemoryChannel>,
    pub bob: DocShare<MemoryChannel>,
    pub alice_doc: Arc<MemoryDocument>,
    pub bob_doc: Arc<MemoryDocument>,
}

impl TwoPartyFixture {
    /// Both parties idle; Alice's document holds `initial`.
    pub fn idle(initial: &str) -> Self {
        Self::with_config(initial, ShareConfig::default())
    }

    pub fn with_config(initial: &str, config: ShareConfig) -> Self {
        let network = MemoryNetwork::new();
        let alice_id = peer(0xA1);
        let bob_id = peer(0xB0);
        Self {
            alice: DocShare::new(network.create_channel(alice_id), config.clone()),
            bob: DocShare::new(network.create_channel(bob_id), config),
            network,
            alice_id,
            bob_id,
            alice_doc: Arc::new(MemoryDocument::new(initial)),
            bob_doc: Arc::new(MemoryDocument::default()),
        }
    }

    /// Alice has offered her document; Bob has not seen the request yet.
    pub fn offered(initial: &str) -> Self {
        let fixture = Self::idle(initial);
        fixture.start();
        fixture
    }

    /// A fully established session: offered, delivered and accepted.
    pub fn sharing(initial: &str) -> Self {
        let fixture = Self::offered(initial);
        fixture.pump();
        fixture
            .bob
            .accept_share(fixture.bob_doc.clone())
            .expect("accept pending share");
        fixture
    }

    /// Alice offers her document to Bob.
    pub fn start(&self) {
        self.alice
            .start_share(
                self.alice_id,
                Some("alice"),
                self.bob_id,
                "shared.txt",
                self.alice_doc.clone(),
            )
            .expect("start share");
    }

    /// Deliver queued messages in both directions until none are left.
    ///
    /// Returns the number of events handled.
    pub fn pump(&self) -> usize {
        let mut total = 0;
        loop {
            let handled = self.alice.pump().unwrap_or(0) + self.bob.pump().unwrap_or(0);
            if handled == 0 {
                return total;
            }
            total += handled;
        }
    }

    /// Deliver only what is queued for Alice.
    pub fn pump_alice(&self) -> usize {
        self.alice.pump().unwrap_or(0)
    }

    /// Deliver only what is queued for Bob.
    pub fn pump_bob(&self) -> usize {
        self.bob.pump().unwrap_or(0)
    }

    /// Both documents hold the same text.
    pub fn converged(&self) -> bool {
        self.alice_doc.text() == self.bob_doc.text()
    }
}
