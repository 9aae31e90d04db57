//! The ledger: a single-writer state machine over data points, pending oracle requests and
//! series accumulators.
//!
//! All mutations take `&mut self`, so whoever owns the value (or the lock around it) gives them a
//! total order. The reveal protocol lives in [`crate::reveal`].

use crate::crypto::{CryptoProvider, OracleChannel, ProofVerifier};
use crate::error::{LedgerError, LedgerResult};
use crate::events::{LedgerEvent, Outbox};
use crate::reveal::PendingTable;
use crate::series::{SeriesAccumulator, SeriesBook};
use crate::store::LedgerStore;
use crate::types::{DataPoint, DataPointId, Handle, PendingRequest, RevealState, SeriesStatistic};
use crate::window::{self, WindowStats};
use chrono::Utc;
use tracing::{debug, info};

#[derive(Clone, Debug, Default)]
pub struct LedgerConfig {
    pub statistic: SeriesStatistic,
    /// Highest data point id issued by a previous run; new points are numbered after it.
    pub last_point_id: u64,
}

pub struct Ledger<C, O, V> {
    pub(crate) crypto: C,
    pub(crate) oracle: O,
    pub(crate) verifier: V,
    pub(crate) store: LedgerStore,
    pub(crate) series: SeriesBook,
    pub(crate) pending: PendingTable,
    pub(crate) outbox: Outbox,
}

impl<C, O, V> Ledger<C, O, V>
where
    C: CryptoProvider,
    O: OracleChannel,
    V: ProofVerifier,
{
    pub fn new(crypto: C, oracle: O, verifier: V, config: LedgerConfig) -> Self {
        Self {
            crypto,
            oracle,
            verifier,
            store: LedgerStore::starting_after(config.last_point_id),
            series: SeriesBook::new(config.statistic),
            pending: PendingTable::default(),
            outbox: Outbox::default(),
        }
    }

    /// Append an encrypted measurement. The point starts out pending.
    pub fn submit(
        &mut self,
        encrypted_value: Handle,
        encrypted_timestamp: Handle,
        encrypted_series_id: Handle,
    ) -> LedgerResult<DataPointId> {
        for (name, handle) in [
            ("encrypted_value", &encrypted_value),
            ("encrypted_timestamp", &encrypted_timestamp),
            ("encrypted_series_id", &encrypted_series_id),
        ] {
            if !self.crypto.is_initialized(handle) {
                return Err(LedgerError::UninitializedHandle(name));
            }
        }

        let stored_at = Utc::now();
        let id = self
            .store
            .insert(encrypted_value, encrypted_timestamp, encrypted_series_id, stored_at);

        info!(%id, "data point stored");
        self.outbox.push(LedgerEvent::DataPointAdded { id, stored_at });
        Ok(id)
    }

    pub fn get_data_point(&self, id: DataPointId) -> LedgerResult<&DataPoint> {
        self.store.get(id)
    }

    pub fn get_reveal_state(&self, id: DataPointId) -> LedgerResult<&RevealState> {
        debug!(%id, "reveal state lookup");
        self.store.reveal_state(id)
    }

    pub fn series_accumulator(&self, series_id: &str) -> LedgerResult<&SeriesAccumulator> {
        self.series.get(series_id)
    }

    /// Series names in the order they were first revealed.
    pub fn series_names(&self) -> &[String] {
        self.series.index().names()
    }

    pub fn statistic(&self) -> SeriesStatistic {
        self.series.statistic()
    }

    /// Outstanding oracle requests, oldest first.
    pub fn pending_requests(&self) -> Vec<&PendingRequest> {
        self.pending.outstanding()
    }

    pub fn average_in_window(&self, series_id: &str, start: u64, end: u64) -> u64 {
        window::average_in_window(self.store.revealed().map(|(_, p)| p), series_id, start, end)
    }

    pub fn window_stats(&self, series_id: &str, start: u64, end: u64) -> WindowStats {
        let stats = window::window_stats(self.store.revealed().map(|(_, p)| p), series_id, start, end);
        debug!(series_id, start, end, count = stats.count, "window query");
        stats
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Hand over the events produced since the last drain, in emission order.
    pub fn drain_events(&mut self) -> Vec<LedgerEvent> {
        self.outbox.drain()
    }

    pub fn crypto(&self) -> &C {
        &self.crypto
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }
}
