use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{BacktestError, Result};

/// Nominal direction of a pair trade as carried by the signal (+1 / -1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn from_signal(signal: i8) -> Option<Self> {
        match signal {
            1 => Some(Self::Long),
            -1 => Some(Self::Short),
            _ => None,
        }
    }

    pub fn as_signal(self) -> i8 {
        match self {
            Self::Long => 1,
            Self::Short => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SignalPoint {
    /// Discrete decision in {-1, 0, 1}.
    pub signal: i8,
    #[serde(default)]
    pub normalized_spread: Option<f64>,
    #[serde(default)]
    pub hedge_ratio: Option<f64>,
}

impl SignalPoint {
    pub fn flat() -> Self {
        Self::default()
    }

    pub fn new(signal: i8) -> Self {
        Self {
            signal,
            ..Self::default()
        }
    }

    pub fn with_normalized_spread(mut self, z: f64) -> Self {
        self.normalized_spread = Some(z);
        self
    }

    pub fn with_hedge_ratio(mut self, hedge_ratio: f64) -> Self {
        self.hedge_ratio = Some(hedge_ratio);
        self
    }

    /// Hedge ratio used for sizing; absent means 1.
    pub fn effective_hedge_ratio(&self) -> f64 {
        self.hedge_ratio.unwrap_or(1.0)
    }
}

/// Signals keyed by timestamp. Lookups for unknown timestamps yield a flat signal.
#[derive(Debug, Clone, Default)]
pub struct SignalSeries {
    by_timestamp: BTreeMap<u64, SignalPoint>,
}

impl SignalSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, timestamp_ms: u64, point: SignalPoint) -> Result<()> {
        if !(-1..=1).contains(&point.signal) {
            return Err(BacktestError::InvalidSignal {
                timestamp_ms,
                value: i64::from(point.signal),
            });
        }
        self.by_timestamp.insert(timestamp_ms, point);
        Ok(())
    }

    pub fn from_points<I>(points: I) -> Result<Self>
    where
        I: IntoIterator<Item = (u64, SignalPoint)>,
    {
        let mut series = Self::new();
        for (ts, point) in points {
            series.insert(ts, point)?;
        }
        Ok(series)
    }

    /// Build from parallel columns of timestamps and raw signal values.
    pub fn from_columns(timestamps: &[u64], signals: &[i64]) -> Result<Self> {
        if timestamps.len() != signals.len() {
            return Err(BacktestError::LengthMismatch {
                left: "timestamps",
                left_len: timestamps.len(),
                right: "signals",
                right_len: signals.len(),
            });
        }
        let mut series = Self::new();
        for (ts, raw) in timestamps.iter().zip(signals) {
            let signal = i8::try_from(*raw)
                .ok()
                .filter(|s| (-1..=1).contains(s))
                .ok_or(BacktestError::InvalidSignal {
                    timestamp_ms: *ts,
                    value: *raw,
                })?;
            series.insert(*ts, SignalPoint::new(signal))?;
        }
        Ok(series)
    }

    /// Attach a per-timestamp hedge ratio to every signal that exists at those timestamps.
    pub fn with_hedge_ratios(mut self, timestamps: &[u64], hedge_ratios: &[f64]) -> Result<Self> {
        if timestamps.len() != hedge_ratios.len() {
            return Err(BacktestError::LengthMismatch {
                left: "timestamps",
                left_len: timestamps.len(),
                right: "hedge_ratios",
                right_len: hedge_ratios.len(),
            });
        }
        for (ts, hr) in timestamps.iter().zip(hedge_ratios) {
            if let Some(point) = self.by_timestamp.get_mut(ts) {
                point.hedge_ratio = Some(*hr);
            }
        }
        Ok(self)
    }

    pub fn get(&self, timestamp_ms: u64) -> SignalPoint {
        self.by_timestamp
            .get(&timestamp_ms)
            .copied()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.by_timestamp.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_timestamp.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &SignalPoint)> {
        self.by_timestamp.iter().map(|(ts, p)| (*ts, p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_timestamp_is_flat() {
        let series = SignalSeries::from_columns(&[1, 2], &[1, -1]).unwrap();
        assert_eq!(series.get(3), SignalPoint::flat());
        assert_eq!(series.get(3).effective_hedge_ratio(), 1.0);
    }

    #[test]
    fn rejects_out_of_range_signal() {
        let err = SignalSeries::from_columns(&[1], &[2]).unwrap_err();
        assert!(matches!(
            err,
            BacktestError::InvalidSignal {
                timestamp_ms: 1,
                value: 2
            }
        ));
    }

    #[test]
    fn direction_round_trips_signal_values() {
        assert_eq!(Direction::from_signal(1), Some(Direction::Long));
        assert_eq!(Direction::from_signal(-1), Some(Direction::Short));
        assert_eq!(Direction::from_signal(0), None);
        assert_eq!(Direction::Short.as_signal(), -1);
    }
}
