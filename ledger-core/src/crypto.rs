//! Boundary contracts towards the external collaborators.
//!
//! The ledger only ever talks to three things it does not implement:
//! - a homomorphic-crypto provider that owns ciphertext arithmetic,
//! - an oracle channel that accepts decryption requests and answers later through a callback,
//! - a proof verifier that authenticates the oracle's answers.
//!
//! The Poseidon digest at the bottom is shared by series correlation keys and by the
//! reference attestation scheme in [`crate::dev`].

use crate::constants::{poseidon_config, BYTES_PER_FIELD_ELEM};
use crate::error::LedgerResult;
use crate::types::{Callback, Handle, RequestId};
use ark_bn254::Fr;
use ark_crypto_primitives::sponge::poseidon::{PoseidonConfig, PoseidonSponge};
use ark_crypto_primitives::sponge::CryptographicSponge;
use ark_ff::{BigInteger, PrimeField};
use std::sync::OnceLock;

/// Homomorphic-crypto provider. Never sees plaintext.
pub trait CryptoProvider {
    /// A fresh encryption of zero.
    fn encrypted_zero(&self) -> Handle;

    /// A fresh encryption of one.
    fn encrypted_one(&self) -> Handle;

    /// Homomorphic addition.
    fn add(&self, lhs: &Handle, rhs: &Handle) -> Handle;

    /// Whether `handle` refers to an initialized ciphertext.
    fn is_initialized(&self, handle: &Handle) -> bool;
}

/// Fire-and-forget decryption requests.
///
/// The answer arrives later as a call to `Ledger::complete_reveal` or
/// `Ledger::complete_series_stats_reveal`, chosen by `callback`.
pub trait OracleChannel {
    fn request_decryption(&mut self, handles: &[Handle], callback: Callback) -> LedgerResult<RequestId>;
}

/// Authoritative check of an oracle answer.
pub trait ProofVerifier {
    fn verify(&self, request_id: RequestId, payload: &[u8], proof: &[u8]) -> bool;
}

fn cached_poseidon_config() -> &'static PoseidonConfig<Fr> {
    static CONFIG: OnceLock<PoseidonConfig<Fr>> = OnceLock::new();
    CONFIG.get_or_init(poseidon_config)
}

/// Poseidon digest of `parts` under a domain separator.
///
/// Each part is length-prefixed and packed into 31-byte field elements.
pub fn poseidon_digest(domain: u64, parts: &[&[u8]]) -> Fr {
    let mut sponge = PoseidonSponge::<Fr>::new(cached_poseidon_config());
    sponge.absorb(&Fr::from(domain));

    for part in parts {
        sponge.absorb(&Fr::from(part.len() as u64));
        for chunk in part.chunks(BYTES_PER_FIELD_ELEM) {
            sponge.absorb(&Fr::from_le_bytes_mod_order(chunk));
        }
    }

    let out: Vec<Fr> = sponge.squeeze_field_elements(1);
    out[0]
}

/// Canonical little-endian encoding of a field element.
pub fn field_to_bytes(x: &Fr) -> [u8; 32] {
    let le = x.into_bigint().to_bytes_le();
    let mut out = [0u8; 32];
    let n = le.len().min(out.len());
    out[..n].copy_from_slice(&le[..n]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic_and_domain_separated() {
        let a = poseidon_digest(1, &[b"glucose".as_slice()]);
        let b = poseidon_digest(1, &[b"glucose".as_slice()]);
        let c = poseidon_digest(2, &[b"glucose".as_slice()]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn digest_respects_part_boundaries() {
        let joined = poseidon_digest(7, &[b"ab".as_slice(), b"c".as_slice()]);
        let split = poseidon_digest(7, &[b"a".as_slice(), b"bc".as_slice()]);
        assert_ne!(joined, split);
    }
}
