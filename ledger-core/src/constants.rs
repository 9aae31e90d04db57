//! Crate-wide constants shared by the ledger and the reference oracle.

use ark_bn254::Fr;
use ark_crypto_primitives::sponge::poseidon::{find_poseidon_ark_and_mds, PoseidonConfig};
use ark_ff::PrimeField;

/// Number of payload bytes packed into one field element before absorption.
///
/// 31 bytes always fit below the BN254 scalar modulus, so packing is injective.
pub const BYTES_PER_FIELD_ELEM: usize = 31;

/// Domain separator for series-name correlation keys ("SERIES_K").
pub const SERIES_KEY_DOMAIN: u64 = 0x5345_5249_4553_5f4b;

/// Domain separator for oracle attestations ("ORACLE_A").
pub const ATTESTATION_DOMAIN: u64 = 0x4f52_4143_4c45_5f41;

/// Length in bytes of an oracle attestation key.
pub const ORACLE_KEY_LEN: usize = 32;

// Poseidon sponge configuration.
//
// Width-3 sponge (rate=2, capacity=1), same instantiation for key derivation and attestations.
pub const POSEIDON_RATE: usize = 2;
pub const POSEIDON_CAPACITY: usize = 1;
pub const POSEIDON_FULL_ROUNDS: u64 = 8;
pub const POSEIDON_PARTIAL_ROUNDS: u64 = 57;

/// Poseidon S-box exponent (alpha).
pub const POSEIDON_ALPHA: u64 = 5;

/// Deterministically derive Poseidon parameters for BN254::Fr.
pub fn poseidon_config() -> PoseidonConfig<Fr> {
    let prime_bits = Fr::MODULUS_BIT_SIZE as u64;

    let (ark, mds) = find_poseidon_ark_and_mds::<Fr>(
        prime_bits,
        POSEIDON_RATE,
        POSEIDON_FULL_ROUNDS,
        POSEIDON_PARTIAL_ROUNDS,
        0,
    );

    PoseidonConfig::new(
        POSEIDON_FULL_ROUNDS as usize,
        POSEIDON_PARTIAL_ROUNDS as usize,
        POSEIDON_ALPHA,
        mds,
        ark,
        POSEIDON_RATE,
        POSEIDON_CAPACITY,
    )
}
