use crate::config::Config;
use crate::db::{self, Db};
use crate::errors::ApiError;
use crate::relayer::ChannelOracle;
use ledger_core::constants::ORACLE_KEY_LEN;
use ledger_core::dev::{OracleKey, PoseidonVerifier, TransparentProvider};
use ledger_core::Ledger;
use rand::rngs::OsRng;
use rand::RngCore;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

pub type AppLedger = Ledger<TransparentProvider, ChannelOracle, PoseidonVerifier>;

#[derive(Clone)]
pub struct AppState {
    /// Single writer: every ledger operation runs under this lock, which totally orders them.
    pub ledger: Arc<Mutex<AppLedger>>,
    pub db: Db,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(ledger: AppLedger, db: Db, config: Config) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(ledger)),
            db,
            config: Arc::new(config),
        }
    }

    /// Move pending ledger events into the audit journal.
    ///
    /// Call with the ledger lock held so journal order matches ledger order. A journal failure
    /// is logged, not returned: the in-memory ledger already committed.
    pub async fn record_events(&self, ledger: &mut AppLedger) {
        let events = ledger.drain_events();
        if let Err(e) = db::append_events(&self.db, &events).await {
            tracing::error!(error = %e, dropped = events.len(), "failed to journal ledger events");
        }
    }
}

/// Load the oracle attestation key from `<data_dir>/keys`, generating it on first start.
pub fn load_or_create_oracle_key(data_dir: &Path) -> Result<OracleKey, ApiError> {
    let keys_dir = data_dir.join("keys");
    std::fs::create_dir_all(&keys_dir).map_err(|_| ApiError::Internal)?;

    let key_path = keys_dir.join("oracle_key.bin");

    if key_path.exists() {
        let bytes = std::fs::read(&key_path).map_err(|_| ApiError::Internal)?;
        return OracleKey::from_slice(&bytes)
            .ok_or_else(|| ApiError::Config(format!("{} must hold {ORACLE_KEY_LEN} bytes", key_path.display())));
    }

    let mut bytes = [0u8; ORACLE_KEY_LEN];
    OsRng.fill_bytes(&mut bytes);
    std::fs::write(&key_path, bytes).map_err(|_| ApiError::Internal)?;

    tracing::info!(path = %key_path.display(), "generated oracle attestation key");
    Ok(OracleKey::from_bytes(bytes))
}
