//! Reference implementations of the external collaborators.
//!
//! SECURITY NOTE: nothing here is real cryptography. Handles produced by
//! [`TransparentProvider`] carry their plaintext, and the attestation is a symmetric keyed
//! digest. They exist so the protocol can be exercised end to end in tests and in the
//! backend's local development mode.

use crate::constants::{ATTESTATION_DOMAIN, ORACLE_KEY_LEN};
use crate::crypto::{field_to_bytes, poseidon_digest, CryptoProvider, OracleChannel, ProofVerifier};
use crate::error::{LedgerError, LedgerResult};
use crate::payload;
use crate::types::{Callback, Handle, RequestId, RevealedPoint};
use serde::Serialize;
use std::collections::VecDeque;

const TAG_U64: u8 = 0x01;
const TAG_STR: u8 = 0x02;

/// Decoded content of a transparent handle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Plaintext {
    U64(u64),
    Str(String),
}

/// "Encryption" that tags and stores the plaintext. Addition wraps on overflow.
#[derive(Clone, Copy, Debug, Default)]
pub struct TransparentProvider;

impl TransparentProvider {
    pub fn encrypt_u64(&self, v: u64) -> Handle {
        let mut bytes = Vec::with_capacity(9);
        bytes.push(TAG_U64);
        bytes.extend_from_slice(&v.to_le_bytes());
        Handle::from_bytes(bytes)
    }

    pub fn encrypt_str(&self, s: &str) -> Handle {
        let mut bytes = Vec::with_capacity(1 + s.len());
        bytes.push(TAG_STR);
        bytes.extend_from_slice(s.as_bytes());
        Handle::from_bytes(bytes)
    }

    pub fn decrypt(&self, handle: &Handle) -> Option<Plaintext> {
        let (tag, body) = handle.as_bytes().split_first()?;
        match *tag {
            TAG_U64 => {
                let arr: [u8; 8] = body.try_into().ok()?;
                Some(Plaintext::U64(u64::from_le_bytes(arr)))
            }
            TAG_STR => String::from_utf8(body.to_vec()).ok().map(Plaintext::Str),
            _ => None,
        }
    }

    fn decrypt_u64(&self, handle: &Handle) -> LedgerResult<u64> {
        match self.decrypt(handle) {
            Some(Plaintext::U64(v)) => Ok(v),
            _ => Err(LedgerError::MalformedPayload(format!("{handle:?} is not an integer ciphertext"))),
        }
    }

    fn decrypt_str(&self, handle: &Handle) -> LedgerResult<String> {
        match self.decrypt(handle) {
            Some(Plaintext::Str(s)) => Ok(s),
            _ => Err(LedgerError::MalformedPayload(format!("{handle:?} is not a string ciphertext"))),
        }
    }
}

impl CryptoProvider for TransparentProvider {
    fn encrypted_zero(&self) -> Handle {
        self.encrypt_u64(0)
    }

    fn encrypted_one(&self) -> Handle {
        self.encrypt_u64(1)
    }

    fn add(&self, lhs: &Handle, rhs: &Handle) -> Handle {
        match (self.decrypt(lhs), self.decrypt(rhs)) {
            (Some(Plaintext::U64(a)), Some(Plaintext::U64(b))) => self.encrypt_u64(a.wrapping_add(b)),
            // Not an integer ciphertext: the result is uninitialized.
            _ => Handle::from_bytes(Vec::new()),
        }
    }

    fn is_initialized(&self, handle: &Handle) -> bool {
        self.decrypt(handle).is_some()
    }
}

/// Symmetric key shared by the reference oracle and its verifier.
#[derive(Clone)]
pub struct OracleKey([u8; ORACLE_KEY_LEN]);

impl OracleKey {
    pub fn from_bytes(bytes: [u8; ORACLE_KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; ORACLE_KEY_LEN] {
        &self.0
    }

    fn digest(&self, request_id: RequestId, payload: &[u8]) -> [u8; 32] {
        let rid = request_id.0.to_le_bytes();
        let d = poseidon_digest(ATTESTATION_DOMAIN, &[self.0.as_slice(), rid.as_slice(), payload]);
        field_to_bytes(&d)
    }
}

impl std::fmt::Debug for OracleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("OracleKey(..)")
    }
}

/// Oracle side: produces the authenticity proof for a payload.
#[derive(Clone, Debug)]
pub struct PoseidonAttestor {
    key: OracleKey,
}

impl PoseidonAttestor {
    pub fn new(key: OracleKey) -> Self {
        Self { key }
    }

    pub fn attest(&self, request_id: RequestId, payload: &[u8]) -> Vec<u8> {
        self.key.digest(request_id, payload).to_vec()
    }
}

/// Ledger side: accepts a proof iff it is the keyed digest of `(request_id, payload)`.
#[derive(Clone, Debug)]
pub struct PoseidonVerifier {
    key: OracleKey,
}

impl PoseidonVerifier {
    pub fn new(key: OracleKey) -> Self {
        Self { key }
    }
}

impl ProofVerifier for PoseidonVerifier {
    fn verify(&self, request_id: RequestId, payload: &[u8], proof: &[u8]) -> bool {
        let expected = self.key.digest(request_id, payload);
        // Fold over every byte so the comparison time does not depend on the mismatch position.
        proof.len() == expected.len()
            && proof.iter().zip(expected.iter()).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
    }
}

/// A decryption request as the oracle receives it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DecryptionJob {
    pub request_id: RequestId,
    pub handles: Vec<Handle>,
    pub callback: Callback,
}

/// What the oracle sends back through the callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OracleResponse {
    pub request_id: RequestId,
    pub payload: Vec<u8>,
    pub proof: Vec<u8>,
}

/// Oracle channel that hands out sequential request ids and queues jobs for someone else to
/// answer.
#[derive(Debug)]
pub struct RecordingOracle {
    next_id: u64,
    forced_id: Option<RequestId>,
    jobs: VecDeque<DecryptionJob>,
}

impl Default for RecordingOracle {
    fn default() -> Self {
        Self {
            next_id: 1,
            forced_id: None,
            jobs: VecDeque::new(),
        }
    }
}

impl RecordingOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next request reuse `id`. Simulates a misbehaving oracle.
    pub fn force_next_id(&mut self, id: RequestId) {
        self.forced_id = Some(id);
    }

    pub fn pop_job(&mut self) -> Option<DecryptionJob> {
        self.jobs.pop_front()
    }

    pub fn take_jobs(&mut self) -> Vec<DecryptionJob> {
        self.jobs.drain(..).collect()
    }

    pub fn queued(&self) -> usize {
        self.jobs.len()
    }
}

impl OracleChannel for RecordingOracle {
    fn request_decryption(&mut self, handles: &[Handle], callback: Callback) -> LedgerResult<RequestId> {
        let request_id = match self.forced_id.take() {
            Some(id) => id,
            None => {
                let id = RequestId(self.next_id);
                self.next_id += 1;
                id
            }
        };

        self.jobs.push_back(DecryptionJob {
            request_id,
            handles: handles.to_vec(),
            callback,
        });
        Ok(request_id)
    }
}

/// Play the oracle for one job: decrypt the handles, encode the payload, attest it.
pub fn fulfil(
    job: &DecryptionJob,
    provider: &TransparentProvider,
    attestor: &PoseidonAttestor,
) -> LedgerResult<OracleResponse> {
    let payload = match (job.callback, job.handles.as_slice()) {
        (Callback::RevealDataPoint, [value, timestamp, series_id]) => payload::encode_point(&RevealedPoint {
            value: provider.decrypt_u64(value)?,
            timestamp: provider.decrypt_u64(timestamp)?,
            series_id: provider.decrypt_str(series_id)?,
        })?,
        (Callback::RevealSeriesStat, [stat]) => payload::encode_series_stat(provider.decrypt_u64(stat)?)?,
        (callback, handles) => {
            return Err(LedgerError::Oracle(format!(
                "{callback:?} expects a different number of handles, got {}",
                handles.len()
            )));
        }
    };

    let proof = attestor.attest(job.request_id, &payload);
    Ok(OracleResponse {
        request_id: job.request_id,
        payload,
        proof,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(b: u8) -> OracleKey {
        OracleKey::from_bytes([b; ORACLE_KEY_LEN])
    }

    #[test]
    fn transparent_handles_decrypt() {
        let p = TransparentProvider;
        assert_eq!(p.decrypt(&p.encrypt_u64(42)), Some(Plaintext::U64(42)));
        assert_eq!(p.decrypt(&p.encrypt_str("A")), Some(Plaintext::Str("A".into())));
        assert!(!p.is_initialized(&Handle::from_bytes(vec![])));
        assert!(!p.is_initialized(&Handle::from_bytes(vec![0x09, 1])));
    }

    #[test]
    fn transparent_add_wraps() {
        let p = TransparentProvider;
        let sum = p.add(&p.encrypt_u64(u64::MAX), &p.encrypted_one());
        assert_eq!(p.decrypt(&sum), Some(Plaintext::U64(0)));
        assert!(!p.is_initialized(&p.add(&p.encrypt_str("x"), &p.encrypted_one())));
    }

    #[test]
    fn verifier_binds_key_request_and_payload() {
        let attestor = PoseidonAttestor::new(key(1));
        let verifier = PoseidonVerifier::new(key(1));
        let proof = attestor.attest(RequestId(5), b"payload");

        assert!(verifier.verify(RequestId(5), b"payload", &proof));
        assert!(!verifier.verify(RequestId(6), b"payload", &proof));
        assert!(!verifier.verify(RequestId(5), b"payloae", &proof));
        assert!(!verifier.verify(RequestId(5), b"payload", &proof[..31]));
        assert!(!PoseidonVerifier::new(key(2)).verify(RequestId(5), b"payload", &proof));
    }

    #[test]
    fn recording_oracle_assigns_sequential_ids() {
        let mut oracle = RecordingOracle::new();
        let a = oracle.request_decryption(&[], Callback::RevealDataPoint).unwrap();
        oracle.force_next_id(a);
        let b = oracle.request_decryption(&[], Callback::RevealDataPoint).unwrap();
        let c = oracle.request_decryption(&[], Callback::RevealSeriesStat).unwrap();
        assert_eq!((a, b, c), (RequestId(1), RequestId(1), RequestId(2)));
        assert_eq!(oracle.queued(), 3);
    }

    #[test]
    fn fulfil_rejects_wrong_arity() {
        let p = TransparentProvider;
        let job = DecryptionJob {
            request_id: RequestId(1),
            handles: vec![p.encrypt_u64(1)],
            callback: Callback::RevealDataPoint,
        };
        assert!(matches!(
            fulfil(&job, &p, &PoseidonAttestor::new(key(0))),
            Err(LedgerError::Oracle(_))
        ));
    }
}
