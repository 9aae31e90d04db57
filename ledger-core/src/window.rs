//! Plaintext range queries over revealed points.
//!
//! Linear scan; only revealed points are visible, unrevealed ones cannot contribute.

use crate::types::RevealedPoint;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct WindowStats {
    pub count: u64,
    pub sum: u128,
    /// Integer-truncated mean, 0 for an empty window.
    pub average: u64,
}

/// Aggregate points of `series_id` whose timestamp lies in `[start, end]`.
pub fn window_stats<'a, I>(points: I, series_id: &str, start: u64, end: u64) -> WindowStats
where
    I: IntoIterator<Item = &'a RevealedPoint>,
{
    let mut count = 0u64;
    let mut sum = 0u128;

    for p in points {
        if p.series_id == series_id && p.timestamp >= start && p.timestamp <= end {
            count += 1;
            sum += p.value as u128;
        }
    }

    let average = if count == 0 { 0 } else { (sum / count as u128) as u64 };
    WindowStats { count, sum, average }
}

pub fn average_in_window<'a, I>(points: I, series_id: &str, start: u64, end: u64) -> u64
where
    I: IntoIterator<Item = &'a RevealedPoint>,
{
    window_stats(points, series_id, start, end).average
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(value: u64, timestamp: u64, series: &str) -> RevealedPoint {
        RevealedPoint { value, timestamp, series_id: series.to_string() }
    }

    #[test]
    fn bounds_are_inclusive() {
        let pts = [p(10, 5, "A"), p(20, 15, "A")];
        assert_eq!(average_in_window(&pts, "A", 5, 15), 15);
        assert_eq!(average_in_window(&pts, "A", 6, 14), 0);
    }

    #[test]
    fn mean_truncates() {
        let pts = [p(1, 0, "A"), p(2, 0, "A")];
        let stats = window_stats(&pts, "A", 0, 0);
        assert_eq!(stats, WindowStats { count: 2, sum: 3, average: 1 });
    }

    #[test]
    fn inverted_window_is_empty() {
        let pts = [p(10, 5, "A")];
        assert_eq!(window_stats(&pts, "A", 9, 1), WindowStats::default());
    }

    #[test]
    fn sum_does_not_overflow() {
        let pts = [p(u64::MAX, 1, "A"), p(u64::MAX, 2, "A")];
        let stats = window_stats(&pts, "A", 0, 10);
        assert_eq!(stats.sum, 2 * u64::MAX as u128);
        assert_eq!(stats.average, u64::MAX);
    }
}
