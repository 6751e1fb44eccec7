use serde::{Deserialize, Serialize};

use crate::error::{BacktestError, Result};

/// One aligned observation of both legs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp_ms: u64,
    pub dependent: f64,
    pub independent: f64,
}

impl PricePoint {
    pub fn new(timestamp_ms: u64, dependent: f64, independent: f64) -> Self {
        Self {
            timestamp_ms,
            dependent,
            independent,
        }
    }
}

/// Time-ordered pair prices. Construction guarantees strictly increasing timestamps.
#[derive(Debug, Clone, Default)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(points: Vec<PricePoint>) -> Result<Self> {
        for (index, pair) in points.windows(2).enumerate() {
            if pair[1].timestamp_ms <= pair[0].timestamp_ms {
                return Err(BacktestError::NonMonotonicTimestamp {
                    index: index + 1,
                    prev: pair[0].timestamp_ms,
                    next: pair[1].timestamp_ms,
                });
            }
        }
        Ok(Self { points })
    }

    pub fn from_columns(timestamps: &[u64], dependent: &[f64], independent: &[f64]) -> Result<Self> {
        if timestamps.len() != dependent.len() {
            return Err(BacktestError::LengthMismatch {
                left: "timestamps",
                left_len: timestamps.len(),
                right: "dependent",
                right_len: dependent.len(),
            });
        }
        if timestamps.len() != independent.len() {
            return Err(BacktestError::LengthMismatch {
                left: "timestamps",
                left_len: timestamps.len(),
                right: "independent",
                right_len: independent.len(),
            });
        }
        let points = timestamps
            .iter()
            .zip(dependent)
            .zip(independent)
            .map(|((ts, dep), ind)| PricePoint::new(*ts, *dep, *ind))
            .collect();
        Self::new(points)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn iter(&self) -> impl Iterator<Item = &PricePoint> {
        self.points.iter()
    }

    /// Binary search by timestamp.
    pub fn get(&self, timestamp_ms: u64) -> Option<&PricePoint> {
        self.points
            .binary_search_by_key(&timestamp_ms, |p| p.timestamp_ms)
            .ok()
            .map(|idx| &self.points[idx])
    }

    pub fn timestamps(&self) -> Vec<u64> {
        self.points.iter().map(|p| p.timestamp_ms).collect()
    }

    pub fn dependent(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.dependent).collect()
    }

    pub fn independent(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.independent).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_increasing_timestamps() {
        let err = PriceSeries::from_columns(&[1, 2, 2], &[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0])
            .unwrap_err();
        assert!(matches!(
            err,
            BacktestError::NonMonotonicTimestamp {
                index: 2,
                prev: 2,
                next: 2
            }
        ));
    }

    #[test]
    fn rejects_mismatched_columns() {
        let err = PriceSeries::from_columns(&[1, 2], &[1.0, 2.0], &[1.0]).unwrap_err();
        assert!(matches!(err, BacktestError::LengthMismatch { .. }));
    }

    #[test]
    fn lookup_by_timestamp() {
        let series =
            PriceSeries::from_columns(&[10, 20, 30], &[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]).unwrap();
        assert_eq!(series.get(20).map(|p| p.independent), Some(5.0));
        assert!(series.get(25).is_none());
    }
}
