//! Plaintext payloads carried by oracle callbacks.
//!
//! Payloads are JSON. The proof covers the raw bytes, so decoding only happens after
//! verification succeeded.

use crate::error::{LedgerError, LedgerResult};
use crate::types::RevealedPoint;
use serde::{Deserialize, Serialize};

/// Decrypted statistic of a series accumulator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesStatPayload {
    pub stat: u64,
}

pub fn decode_point(payload: &[u8]) -> LedgerResult<RevealedPoint> {
    serde_json::from_slice(payload).map_err(|e| LedgerError::MalformedPayload(format!("{e}")))
}

pub fn encode_point(point: &RevealedPoint) -> LedgerResult<Vec<u8>> {
    serde_json::to_vec(point).map_err(|e| LedgerError::MalformedPayload(format!("{e}")))
}

pub fn decode_series_stat(payload: &[u8]) -> LedgerResult<u64> {
    let p: SeriesStatPayload =
        serde_json::from_slice(payload).map_err(|e| LedgerError::MalformedPayload(format!("{e}")))?;
    Ok(p.stat)
}

pub fn encode_series_stat(stat: u64) -> LedgerResult<Vec<u8>> {
    serde_json::to_vec(&SeriesStatPayload { stat }).map_err(|e| LedgerError::MalformedPayload(format!("{e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_point_payload() {
        let p = decode_point(br#"{"value":10,"timestamp":5,"series_id":"A"}"#).unwrap();
        assert_eq!(p.value, 10);
        assert_eq!(p.timestamp, 5);
        assert_eq!(p.series_id, "A");
    }

    #[test]
    fn rejects_missing_fields_and_negative_values() {
        assert!(matches!(
            decode_point(br#"{"value":10,"timestamp":5}"#),
            Err(LedgerError::MalformedPayload(_))
        ));
        assert!(matches!(
            decode_point(br#"{"value":-1,"timestamp":5,"series_id":"A"}"#),
            Err(LedgerError::MalformedPayload(_))
        ));
        assert!(matches!(decode_series_stat(b"7"), Err(LedgerError::MalformedPayload(_))));
    }

    #[test]
    fn series_stat_payload_shape() {
        let bytes = encode_series_stat(42).unwrap();
        assert_eq!(bytes, br#"{"stat":42}"#.to_vec());
        assert_eq!(decode_series_stat(&bytes).unwrap(), 42);
    }
}
