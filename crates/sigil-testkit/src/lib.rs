//! # Sigil Testkit
//!
//! Testing utilities for Sigil.
//!
//! ## Overview
//!
//! - **Wallets**: [`TestWallet`] signs personal messages like a real wallet;
//!   [`CountingSigner`] counts prompts and can decline, stall or sign with
//!   the wrong key.
//! - **Network**: [`Network`] runs N in-memory key servers over one
//!   [`MemoryLedger`](sigil_keyserver::MemoryLedger) and a shared
//!   [`ManualClock`].
//! - **Generators**: proptest strategies for ids, payloads and metadata.
//!
//! ## Test Fixtures
//!
//! ```rust
//! use sigil_testkit::{Network, TestWallet};
//!
//! let network = Network::new(3);
//! let creator = TestWallet::from_seed([7; 32]);
//! let resource = network.resource(0xab);
//! let cap = network.mint_cap(&creator, resource);
//! assert!(cap.to_string().starts_with("cap_0x"));
//! ```

pub mod generators;
pub mod network;
pub mod wallet;

pub use network::Network;
pub use sigil_core::ManualClock;
pub use wallet::{CountingSigner, SignerMode, TestWallet};
