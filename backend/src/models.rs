use chrono::{DateTime, Utc};
use ledger_core::dev::DecryptionJob;
use ledger_core::types::{DataPoint, DataPointId, Handle, RequestId, RevealState, RevealedPoint, SeriesStatistic};
use serde::{Deserialize, Serialize};

use crate::db::JournalEntry;

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// Hex-encoded ciphertext handles.
    pub encrypted_value: Handle,
    pub encrypted_timestamp: Handle,
    pub encrypted_series_id: Handle,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub id: DataPointId,
    pub stored_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct DataPointResponse {
    #[serde(flatten)]
    pub point: DataPoint,
    pub reveal: RevealState,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RevealRequestedResponse {
    pub request_id: RequestId,
}

/// Oracle callback body. Payload and proof are base64 (standard alphabet).
#[derive(Debug, Serialize, Deserialize)]
pub struct OracleCallbackRequest {
    pub request_id: RequestId,
    pub payload_b64: String,
    pub proof_b64: String,
}

#[derive(Debug, Serialize)]
pub struct PointRevealedResponse {
    pub request_id: RequestId,
    pub revealed: RevealedPoint,
}

#[derive(Debug, Serialize)]
pub struct OracleJobsResponse {
    pub jobs: Vec<DecryptionJob>,
}

#[derive(Debug, Serialize)]
pub struct SeriesListResponse {
    pub statistic: SeriesStatistic,
    /// Names in the order they were first revealed.
    pub series: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WindowParams {
    pub start: u64,
    pub end: u64,
}

#[derive(Debug, Serialize)]
pub struct WindowResponse {
    pub series_id: String,
    pub start: u64,
    pub end: u64,
    pub count: u64,
    pub sum: u128,
    /// Integer-truncated mean; 0 when no revealed point matches.
    pub average: u64,
}

#[derive(Debug, Deserialize)]
pub struct ListEventsParams {
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct EventListResponse {
    pub offset: u64,
    pub limit: u64,
    pub total: u64,
    pub events: Vec<JournalEntry>,
}

/// Plaintext for the development provider: a number or a series name.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DevPlaintext {
    Number(u64),
    Text(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EncryptRequest {
    pub value: DevPlaintext,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EncryptResponse {
    pub handle: Handle,
}
