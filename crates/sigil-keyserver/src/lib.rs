//! # Sigil Key Server
//!
//! The client-facing side of the threshold decryption network.
//!
//! ## Protocol
//!
//! - [`KeyServer::info`] publishes a server's X25519 encryption key with a
//!   proof of possession signed by its Ed25519 identity key.
//! - Encrypting clients seal one Shamir share of each content key to each
//!   server ([`WrappedShare`], [`ShareLeg::ToServer`]).
//! - Decrypting clients send a [`FetchKeyRequest`]: session certificate,
//!   proof transaction, identity, the server's sealed share and a fresh
//!   response key, all signed by the session key.
//! - The server checks the certificate and signature, dry-runs the proof
//!   against the [`Ledger`], and returns its share sealed to the response
//!   key ([`ShareLeg::ToClient`]).
//!
//! [`server::memory::MemoryKeyServer`] and [`ledger::memory::MemoryLedger`]
//! implement the network in process.

pub mod error;
pub mod ledger;
pub mod messages;
pub mod server;
pub mod share;

pub use error::{KeyServerError, Result};
pub use ledger::memory::MemoryLedger;
pub use ledger::Ledger;
pub use messages::{FetchKeyRequest, FetchKeyResponse, KeyServerId, KeyServerInfo};
pub use server::memory::MemoryKeyServer;
pub use server::{KeyServer, KeyServerSet};
pub use share::{identity, ShareLeg, WrappedShare};
