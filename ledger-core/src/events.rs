//! Ledger notifications.
//!
//! For a single data point the order is always added, requested, revealed; each at most once.

use crate::types::{DataPointId, RequestId};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    DataPointAdded {
        id: DataPointId,
        stored_at: DateTime<Utc>,
    },
    AnalysisRequested {
        id: DataPointId,
        request_id: RequestId,
    },
    DataPointRevealed {
        id: DataPointId,
        series_id: String,
    },
    SeriesStatsRequested {
        series_id: String,
        request_id: RequestId,
    },
    SeriesStatsRevealed {
        series_id: String,
        stat: u64,
        steps: u64,
    },
}

impl LedgerEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerEvent::DataPointAdded { .. } => "data_point_added",
            LedgerEvent::AnalysisRequested { .. } => "analysis_requested",
            LedgerEvent::DataPointRevealed { .. } => "data_point_revealed",
            LedgerEvent::SeriesStatsRequested { .. } => "series_stats_requested",
            LedgerEvent::SeriesStatsRevealed { .. } => "series_stats_revealed",
        }
    }
}

/// Buffer of events not yet handed to the caller.
#[derive(Debug, Default)]
pub struct Outbox {
    events: Vec<LedgerEvent>,
}

impl Outbox {
    pub fn push(&mut self, event: LedgerEvent) {
        tracing::info!(kind = event.kind(), ?event, "ledger event");
        self.events.push(event);
    }

    pub fn drain(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_empties_outbox_in_order() {
        let mut outbox = Outbox::default();
        outbox.push(LedgerEvent::AnalysisRequested { id: DataPointId(1), request_id: RequestId(1) });
        outbox.push(LedgerEvent::DataPointRevealed { id: DataPointId(1), series_id: "A".into() });

        let drained = outbox.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].kind(), "analysis_requested");
        assert_eq!(drained[1].kind(), "data_point_revealed");
        assert!(outbox.is_empty());
    }

    #[test]
    fn events_serialize_with_tag() {
        let v = serde_json::to_value(LedgerEvent::SeriesStatsRevealed {
            series_id: "A".into(),
            stat: 2,
            steps: 2,
        })
        .unwrap();
        assert_eq!(v["event"], "series_stats_revealed");
        assert_eq!(v["stat"], 2);
    }
}
