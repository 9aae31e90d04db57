//! Append-only table of data points and their reveal state.

use crate::error::{LedgerError, LedgerResult, Missing};
use crate::types::{DataPoint, DataPointId, Handle, RevealState, RevealedPoint};
use chrono::{DateTime, Utc};

#[derive(Debug)]
struct Entry {
    point: DataPoint,
    state: RevealState,
}

/// Data points indexed by id. Ids are dense: id `base + n` lives at position `n - 1`.
#[derive(Debug, Default)]
pub struct LedgerStore {
    base: u64,
    entries: Vec<Entry>,
}

impl LedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose first point gets id `base + 1`. Ids at or below `base` were handed out by an
    /// earlier run and are never found here.
    pub fn starting_after(base: u64) -> Self {
        Self { base, entries: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Store a new point with an unrevealed state and return its id.
    pub fn insert(
        &mut self,
        encrypted_value: Handle,
        encrypted_timestamp: Handle,
        encrypted_series_id: Handle,
        stored_at: DateTime<Utc>,
    ) -> DataPointId {
        let id = DataPointId(self.base + self.entries.len() as u64 + 1);
        self.entries.push(Entry {
            point: DataPoint {
                id,
                encrypted_value,
                encrypted_timestamp,
                encrypted_series_id,
                stored_at,
            },
            state: RevealState::Pending,
        });
        id
    }

    fn position(&self, id: DataPointId) -> LedgerResult<usize> {
        id.0.checked_sub(self.base)
            .and_then(|n| n.checked_sub(1))
            .and_then(|p| usize::try_from(p).ok())
            .filter(|p| *p < self.entries.len())
            .ok_or(LedgerError::NotFound(Missing::DataPoint(id)))
    }

    pub fn get(&self, id: DataPointId) -> LedgerResult<&DataPoint> {
        let pos = self.position(id)?;
        Ok(&self.entries[pos].point)
    }

    pub fn reveal_state(&self, id: DataPointId) -> LedgerResult<&RevealState> {
        let pos = self.position(id)?;
        Ok(&self.entries[pos].state)
    }

    /// Pending -> Revealed. The only write to a reveal state.
    pub(crate) fn commit_reveal(&mut self, id: DataPointId, revealed: RevealedPoint) -> LedgerResult<()> {
        let pos = self.position(id)?;
        let entry = &mut self.entries[pos];
        match entry.state {
            RevealState::Revealed(_) => Err(LedgerError::AlreadyRevealed(id)),
            RevealState::Pending => {
                entry.state = RevealState::Revealed(revealed);
                Ok(())
            }
        }
    }

    /// Revealed plaintexts in id order. Pending points never show up here.
    pub fn revealed(&self) -> impl Iterator<Item = (DataPointId, &RevealedPoint)> + '_ {
        self.entries
            .iter()
            .filter_map(|e| e.state.revealed().map(|p| (e.point.id, p)))
    }
}
