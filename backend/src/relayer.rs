//! Oracle plumbing between the ledger and whoever answers decryption requests.
//!
//! In local mode the decryption jobs travel over an mpsc channel to a background task that
//! plays the oracle with the reference implementation and calls back into the ledger. In
//! external mode they are parked on the oracle until an outside service fetches them and posts
//! the callback over HTTP.
//!
//! A job that fails here is only logged. Its request stays in flight, so the point or series
//! it targets answers `RevealInFlight` to every later reveal request until the process restarts.

use crate::state::AppState;
use ledger_core::crypto::OracleChannel;
use ledger_core::dev::{fulfil, DecryptionJob, PoseidonAttestor, TransparentProvider};
use ledger_core::types::{Callback, Handle, RequestId};
use ledger_core::{LedgerError, LedgerResult};
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

enum Delivery {
    Relay(UnboundedSender<DecryptionJob>),
    Park(Vec<DecryptionJob>),
}

pub struct ChannelOracle {
    next_id: u64,
    delivery: Delivery,
}

impl ChannelOracle {
    /// Request ids start right after `last_id`, the highest one a previous run issued.
    pub fn local(last_id: u64) -> (Self, UnboundedReceiver<DecryptionJob>) {
        let (tx, rx) = unbounded_channel();
        let oracle = Self {
            next_id: last_id + 1,
            delivery: Delivery::Relay(tx),
        };
        (oracle, rx)
    }

    pub fn external(last_id: u64) -> Self {
        Self {
            next_id: last_id + 1,
            delivery: Delivery::Park(Vec::new()),
        }
    }

    /// Parked jobs whose request is still outstanding; answered ones are dropped.
    pub fn open_jobs(&mut self, outstanding: &HashSet<RequestId>) -> Vec<DecryptionJob> {
        match &mut self.delivery {
            Delivery::Park(jobs) => {
                jobs.retain(|j| outstanding.contains(&j.request_id));
                jobs.clone()
            }
            Delivery::Relay(_) => Vec::new(),
        }
    }
}

impl OracleChannel for ChannelOracle {
    fn request_decryption(&mut self, handles: &[Handle], callback: Callback) -> LedgerResult<RequestId> {
        let request_id = RequestId(self.next_id);
        let job = DecryptionJob {
            request_id,
            handles: handles.to_vec(),
            callback,
        };

        match &mut self.delivery {
            Delivery::Relay(tx) => tx
                .send(job)
                .map_err(|_| LedgerError::Oracle("relayer is not running".to_string()))?,
            Delivery::Park(jobs) => jobs.push(job),
        }

        self.next_id += 1;
        debug!(%request_id, ?callback, "decryption job dispatched");
        Ok(request_id)
    }
}

/// Background task: answer every job after `delay`, each on its own task.
pub async fn run(state: AppState, mut jobs: UnboundedReceiver<DecryptionJob>, attestor: PoseidonAttestor, delay: Duration) {
    info!(?delay, "local oracle relayer started");

    while let Some(job) = jobs.recv().await {
        let state = state.clone();
        let attestor = attestor.clone();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = relay_one(&state, &job, &attestor).await {
                warn!(request_id = %job.request_id, error = %e, "oracle callback rejected");
            }
        });
    }

    info!("local oracle relayer stopped");
}

/// Decrypt one job with the reference oracle and deliver the callback.
pub async fn relay_one(state: &AppState, job: &DecryptionJob, attestor: &PoseidonAttestor) -> LedgerResult<()> {
    let resp = fulfil(job, &TransparentProvider, attestor)?;

    let mut ledger = state.ledger.lock().await;
    match job.callback {
        Callback::RevealDataPoint => {
            ledger.complete_reveal(resp.request_id, &resp.payload, &resp.proof)?;
        }
        Callback::RevealSeriesStat => {
            ledger.complete_series_stats_reveal(resp.request_id, &resp.payload, &resp.proof)?;
        }
    }
    state.record_events(&mut ledger).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db;
    use crate::state::AppLedger;
    use ledger_core::constants::ORACLE_KEY_LEN;
    use ledger_core::dev::{OracleKey, PoseidonVerifier};
    use ledger_core::types::{RevealState, SeriesStatistic};
    use ledger_core::{Ledger, LedgerConfig};

    async fn local_state(key: &OracleKey) -> (AppState, UnboundedReceiver<DecryptionJob>) {
        let db = db::connect("sqlite::memory:").await.unwrap();
        db::init_schema(&db).await.unwrap();
        state_on(db, key).await
    }

    /// Boot a ledger on `db` the way `main` does, numbering ids after whatever the journal holds.
    async fn state_on(db: db::Db, key: &OracleKey) -> (AppState, UnboundedReceiver<DecryptionJob>) {
        let issued = db::last_issued_ids(&db).await.unwrap();
        let (oracle, rx) = ChannelOracle::local(issued.request);
        let ledger: AppLedger = Ledger::new(
            TransparentProvider,
            oracle,
            PoseidonVerifier::new(key.clone()),
            LedgerConfig {
                statistic: SeriesStatistic::Count,
                last_point_id: issued.data_point,
            },
        );
        let config = Config::from_lookup(|_| None).unwrap();
        (AppState::new(ledger, db, config), rx)
    }

    #[tokio::test]
    async fn relays_point_and_series_reveals() {
        let key = OracleKey::from_bytes([3u8; ORACLE_KEY_LEN]);
        let attestor = PoseidonAttestor::new(key.clone());
        let (state, mut rx) = local_state(&key).await;
        let p = TransparentProvider;

        let id = {
            let mut ledger = state.ledger.lock().await;
            let id = ledger
                .submit(p.encrypt_u64(10), p.encrypt_u64(5), p.encrypt_str("A"))
                .unwrap();
            ledger.request_reveal(id).unwrap();
            state.record_events(&mut ledger).await;
            id
        };

        let job = rx.recv().await.unwrap();
        relay_one(&state, &job, &attestor).await.unwrap();
        assert!(matches!(
            state.ledger.lock().await.get_reveal_state(id).unwrap(),
            RevealState::Revealed(p) if p.value == 10
        ));

        // Replays through the relayer are rejected by the ledger.
        assert_eq!(
            relay_one(&state, &job, &attestor).await.unwrap_err(),
            LedgerError::AlreadyRevealed(id)
        );

        state.ledger.lock().await.request_series_stats_reveal("A").unwrap();
        let job = rx.recv().await.unwrap();
        relay_one(&state, &job, &attestor).await.unwrap();

        {
            let mut ledger = state.ledger.lock().await;
            let acc = ledger.series_accumulator("A").unwrap();
            assert_eq!(acc.last_revealed.as_ref().map(|r| r.stat), Some(1));
            state.record_events(&mut ledger).await;
        }

        assert_eq!(db::count_events(&state.db).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn wrong_key_is_rejected() {
        let key = OracleKey::from_bytes([3u8; ORACLE_KEY_LEN]);
        let rogue = PoseidonAttestor::new(OracleKey::from_bytes([4u8; ORACLE_KEY_LEN]));
        let (state, mut rx) = local_state(&key).await;
        let p = TransparentProvider;

        let id = {
            let mut ledger = state.ledger.lock().await;
            let id = ledger
                .submit(p.encrypt_u64(1), p.encrypt_u64(1), p.encrypt_str("A"))
                .unwrap();
            ledger.request_reveal(id).unwrap();
            id
        };

        let job = rx.recv().await.unwrap();
        assert!(matches!(
            relay_one(&state, &job, &rogue).await,
            Err(LedgerError::InvalidProof(_))
        ));
        assert_eq!(
            state.ledger.lock().await.get_reveal_state(id).unwrap(),
            &RevealState::Pending
        );
    }

    #[tokio::test]
    async fn callback_from_before_restart_is_unknown() {
        let key = OracleKey::from_bytes([3u8; ORACLE_KEY_LEN]);
        let attestor = PoseidonAttestor::new(key.clone());
        let p = TransparentProvider;
        let (before, mut rx) = local_state(&key).await;

        {
            let mut ledger = before.ledger.lock().await;
            let id = ledger
                .submit(p.encrypt_u64(10), p.encrypt_u64(5), p.encrypt_str("A"))
                .unwrap();
            ledger.request_reveal(id).unwrap();
            before.record_events(&mut ledger).await;
        }
        // The oracle answers only after the process went down.
        let stale = fulfil(&rx.recv().await.unwrap(), &p, &attestor).unwrap();
        assert_eq!(stale.request_id, RequestId(1));

        let (after, _rx) = state_on(before.db.clone(), &key).await;
        drop(before);

        let mut ledger = after.ledger.lock().await;
        let id = ledger
            .submit(p.encrypt_u64(99), p.encrypt_u64(7), p.encrypt_str("B"))
            .unwrap();
        let request_id = ledger.request_reveal(id).unwrap();
        assert_eq!(id, ledger_core::types::DataPointId(2));
        assert_eq!(request_id, RequestId(2));

        assert_eq!(
            ledger.complete_reveal(stale.request_id, &stale.payload, &stale.proof).unwrap_err(),
            LedgerError::UnknownRequest(RequestId(1))
        );
        assert_eq!(ledger.get_reveal_state(id).unwrap(), &RevealState::Pending);
    }

    #[test]
    fn external_oracle_parks_jobs_until_answered() {
        let mut oracle = ChannelOracle::external(0);
        let a = oracle.request_decryption(&[], Callback::RevealDataPoint).unwrap();
        let b = oracle.request_decryption(&[], Callback::RevealSeriesStat).unwrap();

        let open = oracle.open_jobs(&HashSet::from([a, b]));
        assert_eq!(open.len(), 2);

        let open = oracle.open_jobs(&HashSet::from([b]));
        assert_eq!(open.iter().map(|j| j.request_id).collect::<Vec<_>>(), vec![b]);
    }
}
