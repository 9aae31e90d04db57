//! Homomorphic per-series accumulators.
//!
//! An accumulator exists iff at least one point naming its series has been revealed. The only
//! write path is [`SeriesBook::ensure_and_increment`], driven by a committed reveal.

use crate::crypto::CryptoProvider;
use crate::error::{LedgerError, LedgerResult, Missing};
use crate::types::{Handle, RequestId, SeriesKey, SeriesStatistic};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// Decrypted accumulator value delivered by the oracle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RevealedStat {
    pub series_id: String,
    pub stat: u64,
    /// Accumulation steps the decrypted ciphertext covered.
    pub steps: u64,
    pub request_id: RequestId,
    pub revealed_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SeriesAccumulator {
    pub series_id: String,
    pub key: SeriesKey,
    pub encrypted_stat: Handle,
    /// Number of homomorphic additions applied so far.
    pub steps: u64,
    pub updated_at: DateTime<Utc>,
    pub last_revealed: Option<RevealedStat>,
}

/// Series names in first-seen order, with a direct key -> position map for reverse lookup.
#[derive(Debug, Default)]
pub struct SeriesIndex {
    names: Vec<String>,
    positions: HashMap<SeriesKey, usize>,
}

impl SeriesIndex {
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn position(&self, key: &SeriesKey) -> Option<usize> {
        self.positions.get(key).copied()
    }

    pub fn resolve(&self, key: &SeriesKey) -> Option<&str> {
        self.position(key).map(|i| self.names[i].as_str())
    }

    fn append(&mut self, name: &str, key: SeriesKey) -> usize {
        let pos = self.names.len();
        self.names.push(name.to_string());
        self.positions.insert(key, pos);
        pos
    }
}

#[derive(Debug, Default)]
pub struct SeriesBook {
    statistic: SeriesStatistic,
    index: SeriesIndex,
    accumulators: Vec<SeriesAccumulator>,
}

impl SeriesBook {
    pub fn new(statistic: SeriesStatistic) -> Self {
        Self {
            statistic,
            ..Self::default()
        }
    }

    pub fn statistic(&self) -> SeriesStatistic {
        self.statistic
    }

    pub fn index(&self) -> &SeriesIndex {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.accumulators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accumulators.is_empty()
    }

    pub fn get(&self, series_id: &str) -> LedgerResult<&SeriesAccumulator> {
        self.index
            .position(&SeriesKey::for_name(series_id))
            .map(|i| &self.accumulators[i])
            .filter(|acc| acc.series_id == series_id)
            .ok_or_else(|| LedgerError::NotFound(Missing::Series(series_id.to_string())))
    }

    pub fn resolve(&self, key: &SeriesKey) -> LedgerResult<&SeriesAccumulator> {
        self.index
            .position(key)
            .map(|i| &self.accumulators[i])
            .ok_or_else(|| LedgerError::SeriesNotFound(key.to_string()))
    }

    /// Create the accumulator on first sight (encrypted zero), then apply one step.
    ///
    /// `encrypted_value` is only used when the book accumulates sums. Returns the new step count.
    pub(crate) fn ensure_and_increment<C: CryptoProvider>(
        &mut self,
        series_id: &str,
        encrypted_value: &Handle,
        crypto: &C,
        now: DateTime<Utc>,
    ) -> u64 {
        let key = SeriesKey::for_name(series_id);
        let pos = match self.index.position(&key) {
            Some(pos) => pos,
            None => {
                let pos = self.index.append(series_id, key);
                self.accumulators.push(SeriesAccumulator {
                    series_id: series_id.to_string(),
                    key,
                    encrypted_stat: crypto.encrypted_zero(),
                    steps: 0,
                    updated_at: now,
                    last_revealed: None,
                });
                tracing::info!(series_id, key = %key, "series accumulator created");
                pos
            }
        };

        let increment = match self.statistic {
            SeriesStatistic::Count => crypto.encrypted_one(),
            SeriesStatistic::Sum => encrypted_value.clone(),
        };

        let acc = &mut self.accumulators[pos];
        acc.encrypted_stat = crypto.add(&acc.encrypted_stat, &increment);
        acc.steps += 1;
        acc.updated_at = now;
        acc.steps
    }

    pub(crate) fn record_revealed_stat(&mut self, key: &SeriesKey, revealed: RevealedStat) -> LedgerResult<()> {
        let pos = self
            .index
            .position(key)
            .ok_or_else(|| LedgerError::SeriesNotFound(key.to_string()))?;
        self.accumulators[pos].last_revealed = Some(revealed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dev::{Plaintext, TransparentProvider};

    #[test]
    fn count_accumulator_counts_steps() {
        let crypto = TransparentProvider;
        let mut book = SeriesBook::new(SeriesStatistic::Count);
        let v = crypto.encrypt_u64(40);

        assert_eq!(
            book.get("A").unwrap_err(),
            LedgerError::NotFound(Missing::Series("A".into()))
        );
        for _ in 0..3 {
            book.ensure_and_increment("A", &v, &crypto, Utc::now());
        }

        let acc = book.get("A").unwrap();
        assert_eq!(acc.steps, 3);
        assert_eq!(crypto.decrypt(&acc.encrypted_stat), Some(Plaintext::U64(3)));
    }

    #[test]
    fn sum_accumulator_adds_encrypted_values() {
        let crypto = TransparentProvider;
        let mut book = SeriesBook::new(SeriesStatistic::Sum);
        book.ensure_and_increment("A", &crypto.encrypt_u64(10), &crypto, Utc::now());
        book.ensure_and_increment("A", &crypto.encrypt_u64(20), &crypto, Utc::now());

        let acc = book.get("A").unwrap();
        assert_eq!(crypto.decrypt(&acc.encrypted_stat), Some(Plaintext::U64(30)));
    }

    #[test]
    fn index_keeps_first_seen_order_and_resolves_keys() {
        let crypto = TransparentProvider;
        let mut book = SeriesBook::new(SeriesStatistic::Count);
        let one = crypto.encrypted_one();
        for name in ["B", "A", "B", "C"] {
            book.ensure_and_increment(name, &one, &crypto, Utc::now());
        }

        assert_eq!(book.index().names(), ["B", "A", "C"]);
        assert_eq!(book.index().resolve(&SeriesKey::for_name("A")), Some("A"));
        assert_eq!(book.resolve(&SeriesKey::for_name("B")).unwrap().steps, 2);
        assert!(matches!(
            book.resolve(&SeriesKey::for_name("Z")),
            Err(LedgerError::SeriesNotFound(_))
        ));
    }
}
