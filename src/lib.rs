pub mod backtest;
pub mod config;
pub mod error;
pub mod estimator;
pub mod io;
pub mod model;
pub mod signal_gen;
pub mod sweep;

pub use backtest::{run_backtest, BacktestEngine, BacktestReport, BacktestSummary};
pub use error::{BacktestError, Result};
pub use estimator::{KalmanConfig, KalmanHedgeRatio};
