//! Reveal oracle protocol.
//!
//! Per target the flow is: request (oracle gets the handles, we remember the request id) ->
//! callback (look up request, verify proof, decode, commit). Every check runs before the first
//! write, so a rejected callback changes nothing.
//!
//! Policies:
//! - one outstanding request per target; a second request fails with `RevealInFlight`;
//! - a committed request moves to a settled tombstone, so replays are reported as
//!   `AlreadyRevealed` / `AlreadySettled` instead of `UnknownRequest`;
//! - a callback rejected for its proof or payload keeps the request pending.

use crate::crypto::{CryptoProvider, OracleChannel, ProofVerifier};
use crate::error::{LedgerError, LedgerResult};
use crate::events::LedgerEvent;
use crate::ledger::Ledger;
use crate::payload;
use crate::series::RevealedStat;
use crate::types::{DataPointId, Handle, PendingRequest, RequestId, RevealTarget, RevealedPoint, SeriesKey};
use chrono::Utc;
use std::collections::HashMap;
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum TargetKey {
    Point(DataPointId),
    Series(SeriesKey),
}

impl From<&RevealTarget> for TargetKey {
    fn from(t: &RevealTarget) -> Self {
        match t {
            RevealTarget::DataPoint { id } => TargetKey::Point(*id),
            RevealTarget::SeriesStat { key, .. } => TargetKey::Series(*key),
        }
    }
}

/// In-flight and settled oracle requests.
#[derive(Debug, Default)]
pub struct PendingTable {
    pending: HashMap<RequestId, PendingRequest>,
    in_flight: HashMap<TargetKey, RequestId>,
    settled: HashMap<RequestId, RevealTarget>,
}

impl PendingTable {
    fn in_flight(&self, key: TargetKey) -> Option<RequestId> {
        self.in_flight.get(&key).copied()
    }

    fn is_known(&self, request_id: RequestId) -> bool {
        self.pending.contains_key(&request_id) || self.settled.contains_key(&request_id)
    }

    fn insert(&mut self, request: PendingRequest) {
        self.in_flight.insert(TargetKey::from(&request.target), request.request_id);
        self.pending.insert(request.request_id, request);
    }

    fn settle(&mut self, request_id: RequestId) {
        if let Some(req) = self.pending.remove(&request_id) {
            self.in_flight.remove(&TargetKey::from(&req.target));
            self.settled.insert(request_id, req.target);
        }
    }

    pub fn get(&self, request_id: RequestId) -> Option<&PendingRequest> {
        self.pending.get(&request_id)
    }

    pub fn settled(&self, request_id: RequestId) -> Option<&RevealTarget> {
        self.settled.get(&request_id)
    }

    pub fn outstanding(&self) -> Vec<&PendingRequest> {
        let mut out: Vec<_> = self.pending.values().collect();
        out.sort_by_key(|r| r.request_id);
        out
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Resolve the target of a callback, reporting replays of settled requests.
    fn target_for(&self, request_id: RequestId) -> LedgerResult<&RevealTarget> {
        if let Some(req) = self.pending.get(&request_id) {
            return Ok(&req.target);
        }
        match self.settled.get(&request_id) {
            Some(RevealTarget::DataPoint { id }) => Err(LedgerError::AlreadyRevealed(*id)),
            Some(RevealTarget::SeriesStat { .. }) => Err(LedgerError::AlreadySettled(request_id)),
            None => Err(LedgerError::UnknownRequest(request_id)),
        }
    }
}

impl<C, O, V> Ledger<C, O, V>
where
    C: CryptoProvider,
    O: OracleChannel,
    V: ProofVerifier,
{
    /// Ask the oracle to decrypt a pending point. Returns without waiting for the answer.
    pub fn request_reveal(&mut self, id: DataPointId) -> LedgerResult<RequestId> {
        if self.store.reveal_state(id)?.is_revealed() {
            return Err(LedgerError::AlreadyRevealed(id));
        }
        if let Some(outstanding) = self.pending.in_flight(TargetKey::Point(id)) {
            return Err(LedgerError::RevealInFlight(outstanding));
        }

        let handles = self.store.get(id)?.handles();
        let target = RevealTarget::DataPoint { id };
        let request_id = self.issue(&handles, target)?;

        info!(%id, %request_id, "reveal requested");
        self.outbox.push(LedgerEvent::AnalysisRequested { id, request_id });
        Ok(request_id)
    }

    /// Oracle callback for a point reveal.
    ///
    /// Commits `(value, timestamp, series_id)` exactly once and advances the series accumulator.
    pub fn complete_reveal(
        &mut self,
        request_id: RequestId,
        plaintext_payload: &[u8],
        authenticity_proof: &[u8],
    ) -> LedgerResult<RevealedPoint> {
        let id = match self.pending.target_for(request_id)? {
            RevealTarget::DataPoint { id } => *id,
            RevealTarget::SeriesStat { .. } => return Err(LedgerError::CallbackMismatch(request_id)),
        };

        if self.store.reveal_state(id)?.is_revealed() {
            return Err(LedgerError::AlreadyRevealed(id));
        }

        if !self.verifier.verify(request_id, plaintext_payload, authenticity_proof) {
            warn!(%id, %request_id, "rejected reveal callback: invalid proof");
            return Err(LedgerError::InvalidProof(request_id));
        }

        let revealed = payload::decode_point(plaintext_payload).inspect_err(|e| {
            warn!(%id, %request_id, error = %e, "rejected reveal callback: bad payload");
        })?;
        let encrypted_value = self.store.get(id)?.encrypted_value.clone();

        // Commit point. Nothing below can fail.
        let now = Utc::now();
        self.store.commit_reveal(id, revealed.clone())?;
        self.pending.settle(request_id);
        let steps = self
            .series
            .ensure_and_increment(&revealed.series_id, &encrypted_value, &self.crypto, now);

        info!(%id, %request_id, series_id = %revealed.series_id, steps, "data point revealed");
        self.outbox.push(LedgerEvent::DataPointRevealed {
            id,
            series_id: revealed.series_id.clone(),
        });
        Ok(revealed)
    }

    /// Ask the oracle to decrypt a series accumulator as it stands now.
    pub fn request_series_stats_reveal(&mut self, series_name: &str) -> LedgerResult<RequestId> {
        let acc = self.series.get(series_name)?;
        let key = acc.key;
        let target = RevealTarget::SeriesStat { key, steps: acc.steps };
        let handle = acc.encrypted_stat.clone();

        if let Some(outstanding) = self.pending.in_flight(TargetKey::Series(key)) {
            return Err(LedgerError::RevealInFlight(outstanding));
        }

        let request_id = self.issue(&[handle], target)?;

        info!(series_id = series_name, %request_id, "series stats reveal requested");
        self.outbox.push(LedgerEvent::SeriesStatsRequested {
            series_id: series_name.to_string(),
            request_id,
        });
        Ok(request_id)
    }

    /// Oracle callback for a series-stat reveal. The decrypted statistic is stored on the
    /// accumulator together with the step count it covers.
    pub fn complete_series_stats_reveal(
        &mut self,
        request_id: RequestId,
        plaintext_stat: &[u8],
        proof: &[u8],
    ) -> LedgerResult<RevealedStat> {
        let (key, steps) = match self.pending.target_for(request_id)? {
            RevealTarget::SeriesStat { key, steps } => (*key, *steps),
            RevealTarget::DataPoint { .. } => return Err(LedgerError::CallbackMismatch(request_id)),
        };

        let series_id = self.series.resolve(&key)?.series_id.clone();

        if !self.verifier.verify(request_id, plaintext_stat, proof) {
            warn!(%series_id, %request_id, "rejected series stats callback: invalid proof");
            return Err(LedgerError::InvalidProof(request_id));
        }

        let stat = payload::decode_series_stat(plaintext_stat)?;

        let revealed = RevealedStat {
            series_id: series_id.clone(),
            stat,
            steps,
            request_id,
            revealed_at: Utc::now(),
        };
        self.series.record_revealed_stat(&key, revealed.clone())?;
        self.pending.settle(request_id);

        info!(%series_id, %request_id, stat, steps, "series stats revealed");
        self.outbox.push(LedgerEvent::SeriesStatsRevealed { series_id, stat, steps });
        Ok(revealed)
    }

    fn issue(&mut self, handles: &[Handle], target: RevealTarget) -> LedgerResult<RequestId> {
        let request_id = self.oracle.request_decryption(handles, target.callback())?;
        if self.pending.is_known(request_id) {
            warn!(%request_id, "oracle reused a request id");
            return Err(LedgerError::DuplicateRequestId(request_id));
        }

        self.pending.insert(PendingRequest {
            request_id,
            target,
            requested_at: Utc::now(),
        });
        Ok(request_id)
    }
}
