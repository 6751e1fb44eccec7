use serde::Serialize;

use super::engine::PortfolioSnapshot;
use crate::model::{ClosedTrade, OpenTrade, Trade};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestSummary {
    pub initial_capital: f64,
    /// Last portfolio value, or the initial capital for an empty series.
    pub final_value: f64,
    pub trade_count: usize,
    /// Percent of closed trades with profit > 0; 0 when nothing closed.
    pub win_rate: f64,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub total_profit: f64,
    pub total_return_pct: f64,
    pub max_drawdown_pct: f64,
    pub open_trades_at_end: usize,
}

impl BacktestSummary {
    pub fn from_run(
        initial_capital: f64,
        portfolio: &[PortfolioSnapshot],
        trades: &[ClosedTrade],
        open_trades_at_end: usize,
    ) -> Self {
        let final_value = portfolio.last().map_or(initial_capital, |s| s.value);
        let trade_count = trades.len();
        let winning_trades = trades.iter().filter(|t| t.is_win()).count();
        let losing_trades = trades.iter().filter(|t| t.profit < 0.0).count();
        let win_rate = if trade_count == 0 {
            0.0
        } else {
            winning_trades as f64 / trade_count as f64 * 100.0
        };
        Self {
            initial_capital,
            final_value,
            trade_count,
            win_rate,
            winning_trades,
            losing_trades,
            total_profit: trades.iter().map(|t| t.profit).sum(),
            total_return_pct: (final_value - initial_capital) / initial_capital * 100.0,
            max_drawdown_pct: max_drawdown_pct(portfolio),
            open_trades_at_end,
        }
    }
}

/// Largest peak-to-trough decline of the portfolio value, in percent of the peak.
pub fn max_drawdown_pct(portfolio: &[PortfolioSnapshot]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for snap in portfolio {
        if snap.value > peak {
            peak = snap.value;
        }
        if peak > 0.0 {
            worst = worst.max((peak - snap.value) / peak * 100.0);
        }
    }
    worst
}

#[derive(Debug, Clone, Serialize)]
pub struct BacktestReport {
    /// One snapshot per input price, in order.
    pub portfolio: Vec<PortfolioSnapshot>,
    /// Closed trades in close order.
    pub trades: Vec<ClosedTrade>,
    /// Trades still open after the last step. They are never force-closed.
    pub open_trades: Vec<OpenTrade>,
    pub summary: BacktestSummary,
}

impl BacktestReport {
    pub fn values(&self) -> Vec<f64> {
        self.portfolio.iter().map(|s| s.value).collect()
    }

    pub fn all_trades(&self) -> Vec<Trade> {
        self.trades
            .iter()
            .cloned()
            .map(Trade::Closed)
            .chain(self.open_trades.iter().cloned().map(Trade::Open))
            .collect()
    }
}
