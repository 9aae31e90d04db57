use crate::config::OracleMode;
use crate::db;
use crate::errors::ApiError;
use crate::models::*;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use ledger_core::dev::TransparentProvider;
use ledger_core::series::{RevealedStat, SeriesAccumulator};
use ledger_core::types::DataPointId;
use std::collections::HashSet;
use tower_http::cors::{Any, CorsLayer};

pub fn router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/api/v1/points", post(submit_point))
        .route("/api/v1/points/:id/reveal", post(request_reveal))
        .route("/api/v1/series/:name/reveal", post(request_series_reveal))
        .route("/api/v1/oracle/jobs", get(list_oracle_jobs))
        .route("/api/v1/oracle/points", post(point_callback))
        .route("/api/v1/oracle/series", post(series_callback))
        .route("/api/v1/dev/encrypt", post(dev_encrypt))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/v1/points/:id", get(get_point))
        .route("/api/v1/series", get(list_series))
        .route("/api/v1/series/:name", get(get_series))
        .route("/api/v1/series/:name/window", get(window_query))
        .route("/api/v1/events", get(list_events))
        .merge(protected_routes)
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if let Some(provided_key) = headers.get("X-API-KEY") {
        if provided_key == state.config.api_key.as_str() {
            return Ok(next.run(request).await);
        }
    }

    tracing::warn!(path = %request.uri().path(), "unauthorized access attempt");
    Err(StatusCode::UNAUTHORIZED)
}

fn decode_b64(field: &str, value: &str) -> Result<Vec<u8>, ApiError> {
    base64::engine::general_purpose::STANDARD
        .decode(value)
        .map_err(|_| ApiError::BadRequest(format!("invalid {field}")))
}

async fn submit_point(State(state): State<AppState>, Json(req): Json<SubmitRequest>) -> Result<Json<SubmitResponse>, ApiError> {
    let mut ledger = state.ledger.lock().await;

    let id = ledger.submit(req.encrypted_value, req.encrypted_timestamp, req.encrypted_series_id)?;
    let stored_at = ledger.get_data_point(id)?.stored_at;
    state.record_events(&mut ledger).await;

    Ok(Json(SubmitResponse { id, stored_at }))
}

async fn get_point(State(state): State<AppState>, Path(id): Path<u64>) -> Result<Json<DataPointResponse>, ApiError> {
    let ledger = state.ledger.lock().await;
    let id = DataPointId(id);

    Ok(Json(DataPointResponse {
        point: ledger.get_data_point(id)?.clone(),
        reveal: ledger.get_reveal_state(id)?.clone(),
    }))
}

async fn request_reveal(State(state): State<AppState>, Path(id): Path<u64>) -> Result<Json<RevealRequestedResponse>, ApiError> {
    let mut ledger = state.ledger.lock().await;

    let request_id = ledger.request_reveal(DataPointId(id))?;
    state.record_events(&mut ledger).await;

    Ok(Json(RevealRequestedResponse { request_id }))
}

async fn list_oracle_jobs(State(state): State<AppState>) -> Result<Json<OracleJobsResponse>, ApiError> {
    if state.config.oracle_mode != OracleMode::External {
        return Err(ApiError::Conflict("oracle jobs are relayed in-process in local mode".to_string()));
    }

    let mut ledger = state.ledger.lock().await;
    let outstanding: HashSet<_> = ledger.pending_requests().iter().map(|r| r.request_id).collect();
    let jobs = ledger.oracle_mut().open_jobs(&outstanding);

    Ok(Json(OracleJobsResponse { jobs }))
}

async fn point_callback(State(state): State<AppState>, Json(req): Json<OracleCallbackRequest>) -> Result<Json<PointRevealedResponse>, ApiError> {
    let payload = decode_b64("payload_b64", &req.payload_b64)?;
    let proof = decode_b64("proof_b64", &req.proof_b64)?;

    let mut ledger = state.ledger.lock().await;
    let revealed = ledger.complete_reveal(req.request_id, &payload, &proof)?;
    state.record_events(&mut ledger).await;

    Ok(Json(PointRevealedResponse {
        request_id: req.request_id,
        revealed,
    }))
}

async fn series_callback(State(state): State<AppState>, Json(req): Json<OracleCallbackRequest>) -> Result<Json<RevealedStat>, ApiError> {
    let payload = decode_b64("payload_b64", &req.payload_b64)?;
    let proof = decode_b64("proof_b64", &req.proof_b64)?;

    let mut ledger = state.ledger.lock().await;
    let revealed = ledger.complete_series_stats_reveal(req.request_id, &payload, &proof)?;
    state.record_events(&mut ledger).await;

    Ok(Json(revealed))
}

async fn list_series(State(state): State<AppState>) -> Json<SeriesListResponse> {
    let ledger = state.ledger.lock().await;
    Json(SeriesListResponse {
        statistic: ledger.statistic(),
        series: ledger.series_names().to_vec(),
    })
}

async fn get_series(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<SeriesAccumulator>, ApiError> {
    let ledger = state.ledger.lock().await;
    Ok(Json(ledger.series_accumulator(&name)?.clone()))
}

async fn request_series_reveal(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<RevealRequestedResponse>, ApiError> {
    let mut ledger = state.ledger.lock().await;

    let request_id = ledger.request_series_stats_reveal(&name)?;
    state.record_events(&mut ledger).await;

    Ok(Json(RevealRequestedResponse { request_id }))
}

async fn window_query(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<WindowParams>,
) -> Result<Json<WindowResponse>, ApiError> {
    if params.start > params.end {
        return Err(ApiError::BadRequest("start must not be after end".to_string()));
    }

    let ledger = state.ledger.lock().await;
    let stats = ledger.window_stats(&name, params.start, params.end);

    Ok(Json(WindowResponse {
        series_id: name,
        start: params.start,
        end: params.end,
        count: stats.count,
        sum: stats.sum,
        average: stats.average,
    }))
}

async fn list_events(
    State(state): State<AppState>,
    Query(params): Query<ListEventsParams>,
) -> Result<Json<EventListResponse>, ApiError> {
    let offset = params.offset.unwrap_or(0);
    let limit = params.limit.unwrap_or(50).min(500);

    let total = db::count_events(&state.db).await?;
    let events = db::list_events(&state.db, offset, limit).await?;

    Ok(Json(EventListResponse {
        offset,
        limit,
        total,
        events,
    }))
}

async fn dev_encrypt(Json(req): Json<EncryptRequest>) -> Json<EncryptResponse> {
    let provider = TransparentProvider;
    let handle = match req.value {
        DevPlaintext::Number(v) => provider.encrypt_u64(v),
        DevPlaintext::Text(s) => provider.encrypt_str(&s),
    };

    Json(EncryptResponse { handle })
}
