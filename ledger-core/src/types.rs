//! Types shared by the ledger, the reveal protocol and the service layer.

use crate::constants::SERIES_KEY_DOMAIN;
use crate::crypto::{field_to_bytes, poseidon_digest};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Ledger-assigned data point identifier. Starts at 1, never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataPointId(pub u64);

impl fmt::Display for DataPointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Oracle-assigned request identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque ciphertext handle.
///
/// The bytes belong to the crypto provider; the ledger only stores, compares and forwards them.
/// Serialized as lowercase hex.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Handle(Vec<u8>);

impl Handle {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        Ok(Self(hex::decode(s)?))
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        if hex.len() > 16 {
            write!(f, "Handle(0x{}..)", &hex[..16])
        } else {
            write!(f, "Handle(0x{hex})")
        }
    }
}

impl Serialize for Handle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Handle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Handle::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Numeric correlation key for a series name.
///
/// Oracle callbacks only carry numbers, so series-stat requests are correlated through this key
/// and resolved back to the name by the series index.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey([u8; 32]);

impl SeriesKey {
    pub fn for_name(name: &str) -> Self {
        let digest = poseidon_digest(SERIES_KEY_DOMAIN, &[name.as_bytes()]);
        Self(field_to_bytes(&digest))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SeriesKey(0x{}..)", &self.to_hex()[..12])
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl Serialize for SeriesKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// One encrypted measurement. Immutable once stored.
#[derive(Clone, Debug, Serialize)]
pub struct DataPoint {
    pub id: DataPointId,
    pub encrypted_value: Handle,
    pub encrypted_timestamp: Handle,
    pub encrypted_series_id: Handle,
    /// Ledger ingestion time.
    pub stored_at: DateTime<Utc>,
}

impl DataPoint {
    /// Handles in the order the oracle decrypts them: value, timestamp, series id.
    pub fn handles(&self) -> [Handle; 3] {
        [
            self.encrypted_value.clone(),
            self.encrypted_timestamp.clone(),
            self.encrypted_series_id.clone(),
        ]
    }
}

/// Plaintext of a revealed data point.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealedPoint {
    pub value: u64,
    pub timestamp: u64,
    pub series_id: String,
}

/// Reveal state machine of a data point: `Pending` -> `Revealed`, terminal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RevealState {
    Pending,
    Revealed(RevealedPoint),
}

impl RevealState {
    pub fn is_revealed(&self) -> bool {
        matches!(self, RevealState::Revealed(_))
    }

    pub fn revealed(&self) -> Option<&RevealedPoint> {
        match self {
            RevealState::Revealed(p) => Some(p),
            RevealState::Pending => None,
        }
    }
}

/// Callback selector handed to the oracle with each decryption request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Callback {
    RevealDataPoint,
    RevealSeriesStat,
}

/// What an in-flight oracle request will reveal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RevealTarget {
    DataPoint { id: DataPointId },
    /// `steps` is the accumulator's step count when the request was issued.
    SeriesStat { key: SeriesKey, steps: u64 },
}

impl RevealTarget {
    pub fn callback(&self) -> Callback {
        match self {
            RevealTarget::DataPoint { .. } => Callback::RevealDataPoint,
            RevealTarget::SeriesStat { .. } => Callback::RevealSeriesStat,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct PendingRequest {
    pub request_id: RequestId,
    pub target: RevealTarget,
    pub requested_at: DateTime<Utc>,
}

/// Which statistic series accumulators carry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesStatistic {
    /// One homomorphic "+1" per revealed point.
    #[default]
    Count,
    /// The revealed point's encrypted value is added.
    Sum,
}

impl SeriesStatistic {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "count" => Some(SeriesStatistic::Count),
            "sum" => Some(SeriesStatistic::Sum),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_hex_roundtrips_through_json() {
        let h = Handle::from_bytes(vec![0xde, 0xad, 0xbe, 0xef]);
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, "\"deadbeef\"");
        let back: Handle = serde_json::from_str("\"0xdeadbeef\"").unwrap();
        assert_eq!(back, h);
    }

    #[test]
    fn series_key_depends_only_on_name() {
        assert_eq!(SeriesKey::for_name("A"), SeriesKey::for_name("A"));
        assert_ne!(SeriesKey::for_name("A"), SeriesKey::for_name("B"));
    }

    #[test]
    fn reveal_state_serializes_tagged() {
        let v = serde_json::to_value(RevealState::Pending).unwrap();
        assert_eq!(v["state"], "pending");

        let v = serde_json::to_value(RevealState::Revealed(RevealedPoint {
            value: 3,
            timestamp: 9,
            series_id: "A".to_string(),
        }))
        .unwrap();
        assert_eq!(v["state"], "revealed");
        assert_eq!(v["value"], 3);
    }

    #[test]
    fn statistic_parses_case_insensitively() {
        assert_eq!(SeriesStatistic::parse("Sum"), Some(SeriesStatistic::Sum));
        assert_eq!(SeriesStatistic::parse(" count "), Some(SeriesStatistic::Count));
        assert_eq!(SeriesStatistic::parse("mean"), None);
    }
}
