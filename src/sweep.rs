//! Parallel parameter sweep.
//!
//! Builds the cartesian product of the axes, runs every combination on its own
//! fresh engine via rayon, and returns results sorted by final value.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::backtest::{run_backtest, BacktestSummary};
use crate::config::BacktestConfig;
use crate::model::{PriceSeries, SignalSeries};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepParam {
    Commission,
    NShares,
    CloseThreshold,
    MarginFloor,
}

impl SweepParam {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Commission => "commission",
            Self::NShares => "n_shares",
            Self::CloseThreshold => "close_threshold",
            Self::MarginFloor => "margin_floor",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SweepAxis {
    pub param: SweepParam,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepResult {
    pub config_id: String,
    pub overrides: Vec<(SweepParam, f64)>,
    /// Summary of the run, or the validation/run error for this combination.
    pub outcome: Result<BacktestSummary, String>,
}

impl SweepResult {
    pub fn final_value(&self) -> Option<f64> {
        self.outcome.as_ref().ok().map(|s| s.final_value)
    }
}

fn generate_combinations(axes: &[SweepAxis]) -> Vec<Vec<(SweepParam, f64)>> {
    if axes.is_empty() {
        return vec![vec![]];
    }
    let sub = generate_combinations(&axes[1..]);
    let mut result = Vec::with_capacity(axes[0].values.len() * sub.len());
    for val in &axes[0].values {
        for combo in &sub {
            let mut new_combo = vec![(axes[0].param, *val)];
            new_combo.extend(combo.iter().copied());
            result.push(new_combo);
        }
    }
    result
}

fn apply_overrides(base: &BacktestConfig, overrides: &[(SweepParam, f64)]) -> BacktestConfig {
    let mut cfg = base.clone();
    for (param, value) in overrides {
        match param {
            SweepParam::Commission => cfg.commission = *value,
            // Negative and NaN values saturate to 0 and are rejected by validation.
            SweepParam::NShares => cfg.n_shares = value.round() as u64,
            SweepParam::CloseThreshold => cfg.close_threshold = *value,
            SweepParam::MarginFloor => cfg.margin_floor = *value,
        }
    }
    cfg
}

fn config_id(overrides: &[(SweepParam, f64)]) -> String {
    if overrides.is_empty() {
        return "base".to_string();
    }
    overrides
        .iter()
        .map(|(p, v)| format!("{}={}", p.as_str(), v))
        .collect::<Vec<_>>()
        .join(",")
}

pub fn run_sweep(
    base: &BacktestConfig,
    axes: &[SweepAxis],
    prices: &PriceSeries,
    signals: &SignalSeries,
) -> Vec<SweepResult> {
    let combos = generate_combinations(axes);
    tracing::info!(combinations = combos.len(), "starting sweep");

    let mut results: Vec<SweepResult> = combos
        .into_par_iter()
        .map(|overrides| {
            let cfg = apply_overrides(base, &overrides);
            let outcome = run_backtest(cfg, prices, signals)
                .map(|report| report.summary)
                .map_err(|e| e.to_string());
            SweepResult {
                config_id: config_id(&overrides),
                overrides,
                outcome,
            }
        })
        .collect();

    // Best final value first; failed combinations last, in generation order.
    results.sort_by(|a, b| match (a.final_value(), b.final_value()) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(std::cmp::Ordering::Equal),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    results
}
