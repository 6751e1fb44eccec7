pub mod costing;
pub mod engine;
pub mod report;

pub use costing::LegNotional;
pub use engine::{BacktestEngine, EntrySkip, PortfolioSnapshot, StepOutcome};
pub use report::{BacktestReport, BacktestSummary};

use crate::config::BacktestConfig;
use crate::error::Result;
use crate::model::{PriceSeries, SignalSeries};

/// Validate `cfg` and run one backtest on a fresh engine.
pub fn run_backtest(
    cfg: BacktestConfig,
    prices: &PriceSeries,
    signals: &SignalSeries,
) -> Result<BacktestReport> {
    BacktestEngine::new(cfg)?.run(prices, signals)
}
