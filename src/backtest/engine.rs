use serde::Serialize;

use super::costing::LegNotional;
use super::report::{BacktestReport, BacktestSummary};
use crate::config::{BacktestConfig, Conventions};
use crate::error::{BacktestError, Result};
use crate::model::{
    ClosedTrade, Direction, OpenTrade, PricePoint, PriceSeries, SignalPoint, SignalSeries, Trade,
};

/// Portfolio state recorded at the end of each step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PortfolioSnapshot {
    pub timestamp_ms: u64,
    pub capital: f64,
    pub unrealized_pnl: f64,
    /// `capital + unrealized_pnl`
    pub value: f64,
    /// Signal after the force-flat override.
    pub signal: i8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrySkip {
    MarginFloor,
    InsufficientCapital,
}

impl EntrySkip {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MarginFloor => "entry.margin_floor",
            Self::InsufficientCapital => "entry.insufficient_capital",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub snapshot: PortfolioSnapshot,
    pub opened: Option<u64>,
    pub closed: Vec<u64>,
    pub skipped: Option<EntrySkip>,
}

/// Walk-forward pairs simulator.
///
/// Open trades are kept per signal direction. Capital only moves when a trade is
/// opened or closed; every step is marked to market against each trade's locked
/// entry prices and hedge ratio.
#[derive(Debug, Clone)]
pub struct BacktestEngine {
    cfg: BacktestConfig,
    conventions: Conventions,
    capital: f64,
    long_book: Vec<OpenTrade>,
    short_book: Vec<OpenTrade>,
    trade_log: Vec<ClosedTrade>,
    portfolio: Vec<PortfolioSnapshot>,
    prev_signal: i8,
    last_timestamp_ms: Option<u64>,
    next_trade_id: u64,
}

impl BacktestEngine {
    pub fn new(cfg: BacktestConfig) -> Result<Self> {
        cfg.validate()?;
        let conventions = cfg.conventions();
        Ok(Self {
            capital: cfg.initial_capital,
            cfg,
            conventions,
            long_book: Vec::new(),
            short_book: Vec::new(),
            trade_log: Vec::new(),
            portfolio: Vec::new(),
            prev_signal: 0,
            last_timestamp_ms: None,
            next_trade_id: 1,
        })
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.cfg
    }

    pub fn conventions(&self) -> Conventions {
        self.conventions
    }

    pub fn capital(&self) -> f64 {
        self.capital
    }

    pub fn steps(&self) -> usize {
        self.portfolio.len()
    }

    pub fn open_trades(&self, direction: Direction) -> &[OpenTrade] {
        match direction {
            Direction::Long => &self.long_book,
            Direction::Short => &self.short_book,
        }
    }

    pub fn open_trade_count(&self) -> usize {
        self.long_book.len() + self.short_book.len()
    }

    pub fn trade_log(&self) -> &[ClosedTrade] {
        &self.trade_log
    }

    pub fn portfolio(&self) -> &[PortfolioSnapshot] {
        &self.portfolio
    }

    /// Every trade seen so far, closed ones first in close order, then open ones.
    pub fn trades(&self) -> Vec<Trade> {
        self.trade_log
            .iter()
            .cloned()
            .map(Trade::Closed)
            .chain(
                self.long_book
                    .iter()
                    .chain(self.short_book.iter())
                    .cloned()
                    .map(Trade::Open),
            )
            .collect()
    }

    pub fn unrealized_pnl(&self, price_dependent: f64, price_independent: f64) -> f64 {
        self.long_book
            .iter()
            .chain(self.short_book.iter())
            .map(|t| t.unrealized_pnl(price_dependent, price_independent))
            .sum()
    }

    /// Drop all state and return to the initial capital.
    pub fn reset(&mut self) {
        self.capital = self.cfg.initial_capital;
        self.long_book.clear();
        self.short_book.clear();
        self.trade_log.clear();
        self.portfolio.clear();
        self.prev_signal = 0;
        self.last_timestamp_ms = None;
        self.next_trade_id = 1;
    }

    /// Advance one timestamp: force-flat override, exits, entry, then mark-to-market.
    pub fn step(&mut self, price: &PricePoint, signal: &SignalPoint) -> Result<StepOutcome> {
        if let Some(prev) = self.last_timestamp_ms {
            if price.timestamp_ms <= prev {
                return Err(BacktestError::NonMonotonicTimestamp {
                    index: self.portfolio.len(),
                    prev,
                    next: price.timestamp_ms,
                });
            }
        }
        if !(-1..=1).contains(&signal.signal) {
            return Err(BacktestError::InvalidSignal {
                timestamp_ms: price.timestamp_ms,
                value: i64::from(signal.signal),
            });
        }

        let effective = self.effective_signal(signal);
        if effective != self.prev_signal {
            tracing::trace!(
                ts = price.timestamp_ms,
                from = self.prev_signal,
                to = effective,
                "signal transition"
            );
        }

        let mut closed = Vec::new();
        for direction in [Direction::Long, Direction::Short] {
            if !self.open_trades(direction).is_empty()
                && self.conventions.exit_policy.should_exit(direction, effective)
            {
                closed.extend(self.close_direction(direction, price));
            }
        }

        let mut opened = None;
        let mut skipped = None;
        if let Some(direction) = Direction::from_signal(effective) {
            if self.open_trades(direction).len() < self.cfg.max_open_per_direction {
                match self.try_open(direction, price, signal.effective_hedge_ratio()) {
                    Ok(id) => opened = Some(id),
                    Err(reason) => skipped = Some(reason),
                }
            }
        }

        let unrealized_pnl = self.unrealized_pnl(price.dependent, price.independent);
        let snapshot = PortfolioSnapshot {
            timestamp_ms: price.timestamp_ms,
            capital: self.capital,
            unrealized_pnl,
            value: self.capital + unrealized_pnl,
            signal: effective,
        };
        self.portfolio.push(snapshot);
        self.prev_signal = effective;
        self.last_timestamp_ms = Some(price.timestamp_ms);

        Ok(StepOutcome {
            snapshot,
            opened,
            closed,
            skipped,
        })
    }

    /// Run a full series from a fresh engine. Missing signals count as flat.
    pub fn run(mut self, prices: &PriceSeries, signals: &SignalSeries) -> Result<BacktestReport> {
        if self.steps() > 0 {
            return Err(BacktestError::EngineInUse {
                steps: self.steps(),
            });
        }
        tracing::info!(
            steps = prices.len(),
            signals = signals.len(),
            initial_capital = self.cfg.initial_capital,
            costing = ?self.conventions.costing,
            direction = ?self.conventions.direction,
            exit_policy = ?self.conventions.exit_policy,
            "starting backtest"
        );
        for price in prices.iter() {
            let signal = signals.get(price.timestamp_ms);
            self.step(price, &signal)?;
        }
        let report = self.finish();
        tracing::info!(
            final_value = report.summary.final_value,
            trade_count = report.summary.trade_count,
            win_rate = report.summary.win_rate,
            open_at_end = report.summary.open_trades_at_end,
            "backtest complete"
        );
        Ok(report)
    }

    pub fn finish(self) -> BacktestReport {
        let open_trades: Vec<OpenTrade> = self
            .long_book
            .into_iter()
            .chain(self.short_book)
            .collect();
        let summary = BacktestSummary::from_run(
            self.cfg.initial_capital,
            &self.portfolio,
            &self.trade_log,
            open_trades.len(),
        );
        BacktestReport {
            portfolio: self.portfolio,
            trades: self.trade_log,
            open_trades,
            summary,
        }
    }

    fn effective_signal(&self, signal: &SignalPoint) -> i8 {
        match signal.normalized_spread {
            Some(z) if z.abs() < self.cfg.close_threshold => 0,
            _ => signal.signal,
        }
    }

    fn book_mut(&mut self, direction: Direction) -> &mut Vec<OpenTrade> {
        match direction {
            Direction::Long => &mut self.long_book,
            Direction::Short => &mut self.short_book,
        }
    }

    fn try_open(
        &mut self,
        direction: Direction,
        price: &PricePoint,
        hedge_ratio: f64,
    ) -> std::result::Result<u64, EntrySkip> {
        let side = self.conventions.direction.dependent_side(direction);
        let qty_dependent = self.cfg.n_shares as f64;
        let notional = LegNotional::new(
            price.dependent,
            qty_dependent,
            price.independent,
            qty_dependent * hedge_ratio,
        );
        let entry_cash = self
            .conventions
            .costing
            .entry_cash(side, notional, self.cfg.commission);

        let skip = if !(self.capital > self.cfg.margin_floor) {
            Some(EntrySkip::MarginFloor)
        } else if !(self.capital > entry_cash) {
            Some(EntrySkip::InsufficientCapital)
        } else {
            None
        };
        if let Some(reason) = skip {
            tracing::debug!(
                ts = price.timestamp_ms,
                direction = ?direction,
                capital = self.capital,
                entry_cash,
                margin_floor = self.cfg.margin_floor,
                reason = reason.as_str(),
                "entry skipped"
            );
            return Err(reason);
        }

        let id = self.next_trade_id;
        self.next_trade_id += 1;
        self.capital -= entry_cash;
        let trade = OpenTrade::new(
            id,
            price.timestamp_ms,
            direction,
            side,
            price.dependent,
            price.independent,
            self.cfg.n_shares,
            hedge_ratio,
            entry_cash,
        );
        tracing::debug!(
            ts = price.timestamp_ms,
            trade_id = id,
            direction = ?direction,
            price_dep = price.dependent,
            price_ind = price.independent,
            hedge_ratio,
            entry_cash,
            capital = self.capital,
            "trade opened"
        );
        self.book_mut(direction).push(trade);
        Ok(id)
    }

    fn close_direction(&mut self, direction: Direction, price: &PricePoint) -> Vec<u64> {
        let costing = self.conventions.costing;
        let commission = self.cfg.commission;
        let book = std::mem::take(self.book_mut(direction));
        let mut ids = Vec::with_capacity(book.len());
        for trade in book {
            let exit_cash = costing.exit_cash(&trade, price.dependent, price.independent, commission);
            let profit = costing.profit(trade.entry_cash(), exit_cash);
            self.capital += exit_cash;
            tracing::debug!(
                ts = price.timestamp_ms,
                trade_id = trade.id(),
                direction = ?direction,
                price_dep = price.dependent,
                price_ind = price.independent,
                exit_cash,
                profit,
                capital = self.capital,
                "trade closed"
            );
            ids.push(trade.id());
            self.trade_log.push(trade.close(
                price.timestamp_ms,
                price.dependent,
                price.independent,
                exit_cash,
                profit,
            ));
        }
        ids
    }
}
