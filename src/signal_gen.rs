//! Threshold signals on the normalized spread.

use serde::Deserialize;

use crate::error::{BacktestError, Result};
use crate::estimator::{KalmanConfig, KalmanHedgeRatio};
use crate::model::{PriceSeries, SignalPoint, SignalSeries};

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ThresholdConfig {
    /// |z| beyond this opens: z < -entry_z => +1, z > entry_z => -1.
    #[serde(default = "default_entry_z")]
    pub entry_z: f64,
    /// |z| below this is forced to 0.
    #[serde(default = "default_close_z")]
    pub close_z: f64,
}

fn default_entry_z() -> f64 {
    1.5
}

fn default_close_z() -> f64 {
    0.05
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            entry_z: default_entry_z(),
            close_z: default_close_z(),
        }
    }
}

/// `(x - mean) / std` with the sample (n-1) standard deviation over the finite values.
/// Non-finite points normalize to NaN. A zero deviation yields zeros for the finite points.
pub fn normalize(spread: &[f64]) -> Vec<f64> {
    let finite: Vec<f64> = spread.iter().copied().filter(|v| v.is_finite()).collect();
    let (mean, std) = if finite.len() < 2 {
        (0.0, 0.0)
    } else {
        let n = finite.len() as f64;
        let mean = finite.iter().sum::<f64>() / n;
        let var = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        (mean, var.sqrt())
    };
    let degenerate = !std.is_finite() || std <= f64::EPSILON;
    spread
        .iter()
        .map(|v| {
            if !v.is_finite() {
                f64::NAN
            } else if degenerate {
                0.0
            } else {
                (v - mean) / std
            }
        })
        .collect()
}

pub fn classify(z: f64, cfg: &ThresholdConfig) -> i8 {
    if z.abs() < cfg.close_z {
        0
    } else if z < -cfg.entry_z {
        1
    } else if z > cfg.entry_z {
        -1
    } else {
        0
    }
}

/// Signals for a spread series, carrying the normalized spread and optional hedge ratios.
pub fn generate(
    timestamps: &[u64],
    spread: &[f64],
    hedge_ratios: Option<&[f64]>,
    cfg: &ThresholdConfig,
) -> Result<SignalSeries> {
    if timestamps.len() != spread.len() {
        return Err(BacktestError::LengthMismatch {
            left: "timestamps",
            left_len: timestamps.len(),
            right: "spread",
            right_len: spread.len(),
        });
    }
    if let Some(hr) = hedge_ratios {
        if hr.len() != spread.len() {
            return Err(BacktestError::LengthMismatch {
                left: "spread",
                left_len: spread.len(),
                right: "hedge_ratios",
                right_len: hr.len(),
            });
        }
    }
    let z = normalize(spread);
    let mut series = SignalSeries::new();
    for (i, (ts, zi)) in timestamps.iter().zip(&z).enumerate() {
        let mut point = SignalPoint::new(classify(*zi, cfg)).with_normalized_spread(*zi);
        if let Some(hr) = hedge_ratios {
            point = point.with_hedge_ratio(hr[i]);
        }
        series.insert(*ts, point)?;
    }
    Ok(series)
}

/// Kalman hedge ratios on (independent, dependent), then threshold signals on the dynamic spread.
pub fn generate_from_prices(
    prices: &PriceSeries,
    kalman: KalmanConfig,
    cfg: &ThresholdConfig,
) -> Result<SignalSeries> {
    let x = prices.independent();
    let y = prices.dependent();
    let mut filter = KalmanHedgeRatio::new(kalman)?;
    let out = filter.run(&x, &y)?;
    let spread = out.spread(&x, &y);
    let series = generate(&prices.timestamps(), &spread, Some(&out.hedge_ratios), cfg)?;
    let (long, short) = series.iter().fold((0usize, 0usize), |(l, s), (_, p)| {
        (l + usize::from(p.signal == 1), s + usize::from(p.signal == -1))
    });
    tracing::debug!(points = series.len(), long, short, "signals generated");
    Ok(series)
}
