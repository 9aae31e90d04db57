//! Core of the encrypted data-point ledger.
//!
//! This crate contains:
//! - The append-only ledger of encrypted, time-stamped data points.
//! - The asynchronous, proof-gated reveal protocol spoken with an external decryption oracle.
//! - Homomorphic per-series accumulators and plaintext window queries over revealed points.
//! - Reference implementations of the crypto/oracle boundary for tests and local development.
//!
//! Ciphertext arithmetic, decryption and proof generation are never performed here; they sit
//! behind the traits in [`crypto`].

pub mod constants;
pub mod crypto;
pub mod dev;
pub mod error;
pub mod events;
pub mod ledger;
pub mod payload;
pub mod reveal;
pub mod series;
pub mod store;
pub mod types;
pub mod window;

pub use error::{LedgerError, LedgerResult, Missing};
pub use ledger::{Ledger, LedgerConfig};
