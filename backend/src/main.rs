mod api;
mod config;
mod db;
mod errors;
mod models;
mod relayer;
mod state;

use crate::config::{Config, OracleMode};
use crate::errors::ApiError;
use crate::relayer::ChannelOracle;
use crate::state::AppState;
use ledger_core::dev::{PoseidonAttestor, PoseidonVerifier, TransparentProvider};
use ledger_core::{Ledger, LedgerConfig};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    let directive: Directive = "info".parse().map_err(|_| ApiError::Internal)?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive))
        .init();

    let config = Config::from_env()?;

    // Local state lives under the data dir (ignored by git).
    std::fs::create_dir_all(&config.data_dir).map_err(|_| ApiError::Internal)?;

    let db_path = config.data_dir.join("ledger.sqlite");
    let db_url = format!("sqlite:{}?mode=rwc", db_path.to_string_lossy());

    let db = db::connect(&db_url).await?;
    db::init_schema(&db).await?;

    let oracle_key = state::load_or_create_oracle_key(&config.data_dir)?;
    let verifier = PoseidonVerifier::new(oracle_key.clone());

    // The key outlives the process, so ids must too.
    let issued = db::last_issued_ids(&db).await?;
    let ledger_config = LedgerConfig {
        statistic: config.statistic,
        last_point_id: issued.data_point,
    };

    let (oracle, jobs) = match config.oracle_mode {
        OracleMode::Local => {
            let (oracle, rx) = ChannelOracle::local(issued.request);
            (oracle, Some(rx))
        }
        OracleMode::External => (ChannelOracle::external(issued.request), None),
    };

    if issued != db::IssuedIds::default() {
        tracing::info!(last_point_id = issued.data_point, last_request_id = issued.request, "resuming id sequence from journal");
    }

    let ledger = Ledger::new(TransparentProvider, oracle, verifier, ledger_config);
    let state = AppState::new(ledger, db, config.clone());

    if let Some(rx) = jobs {
        tokio::spawn(relayer::run(
            state.clone(),
            rx,
            PoseidonAttestor::new(oracle_key),
            config.relay_delay,
        ));
    }

    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.addr)
        .await
        .map_err(|_| ApiError::Internal)?;

    tracing::info!(addr = %config.addr, statistic = ?config.statistic, oracle = ?config.oracle_mode, "backend listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|_| ApiError::Internal)?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::warn!("failed to install ctrl-c handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
