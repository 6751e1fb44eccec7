//! CSV/JSON loading and result export.
//!
//! Prices: `timestamp_ms,dependent,independent`.
//! Signals: `timestamp_ms,signal[,normalized_spread][,hedge_ratio]`.

use std::io::{Read, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backtest::{BacktestReport, PortfolioSnapshot};
use crate::error::{BacktestError, Result};
use crate::model::{
    ClosedTrade, Direction, LegSide, PricePoint, PriceSeries, SignalPoint, SignalSeries,
};

#[derive(Debug, Deserialize)]
struct SignalRow {
    timestamp_ms: u64,
    signal: i64,
    #[serde(default)]
    normalized_spread: Option<f64>,
    #[serde(default)]
    hedge_ratio: Option<f64>,
}

#[derive(Debug, Serialize)]
struct TradeRow {
    trade_id: u64,
    direction: Direction,
    dependent_side: LegSide,
    entry_time_ms: u64,
    entry_time: String,
    exit_time_ms: u64,
    exit_time: String,
    entry_price_dependent: f64,
    entry_price_independent: f64,
    exit_price_dependent: f64,
    exit_price_independent: f64,
    qty_dependent: f64,
    qty_independent: f64,
    hedge_ratio: f64,
    entry_cash: f64,
    exit_cash: f64,
    profit: f64,
}

impl From<&ClosedTrade> for TradeRow {
    fn from(t: &ClosedTrade) -> Self {
        let e = &t.entry;
        Self {
            trade_id: e.id(),
            direction: e.direction(),
            dependent_side: e.dependent_side(),
            entry_time_ms: e.entry_time_ms(),
            entry_time: format_ts(e.entry_time_ms()),
            exit_time_ms: t.exit_time_ms,
            exit_time: format_ts(t.exit_time_ms),
            entry_price_dependent: e.entry_price_dependent(),
            entry_price_independent: e.entry_price_independent(),
            exit_price_dependent: t.exit_price_dependent,
            exit_price_independent: t.exit_price_independent,
            qty_dependent: e.qty_dependent(),
            qty_independent: e.qty_independent(),
            hedge_ratio: e.hedge_ratio_at_entry(),
            entry_cash: e.entry_cash(),
            exit_cash: t.exit_cash,
            profit: t.profit,
        }
    }
}

/// RFC 3339 rendering of a millisecond timestamp; empty when out of range.
pub fn format_ts(timestamp_ms: u64) -> String {
    i64::try_from(timestamp_ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}

pub fn read_prices<R: Read>(reader: R) -> Result<PriceSeries> {
    let mut rdr = csv::Reader::from_reader(reader);
    let points = rdr
        .deserialize::<PricePoint>()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    PriceSeries::new(points)
}

pub fn load_prices(path: &Path) -> Result<PriceSeries> {
    read_prices(std::fs::File::open(path)?)
}

pub fn read_signals<R: Read>(reader: R) -> Result<SignalSeries> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut series = SignalSeries::new();
    for row in rdr.deserialize::<SignalRow>() {
        let row = row?;
        let signal = i8::try_from(row.signal).map_err(|_| BacktestError::InvalidSignal {
            timestamp_ms: row.timestamp_ms,
            value: row.signal,
        })?;
        series.insert(
            row.timestamp_ms,
            SignalPoint {
                signal,
                normalized_spread: row.normalized_spread,
                hedge_ratio: row.hedge_ratio,
            },
        )?;
    }
    Ok(series)
}

pub fn load_signals(path: &Path) -> Result<SignalSeries> {
    read_signals(std::fs::File::open(path)?)
}

pub fn write_portfolio<W: Write>(writer: W, portfolio: &[PortfolioSnapshot]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for snap in portfolio {
        wtr.serialize(snap)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_trades<W: Write>(writer: W, trades: &[ClosedTrade]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for trade in trades {
        wtr.serialize(TradeRow::from(trade))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write `portfolio.csv`, `trades.csv` and `summary.json` into `dir`.
pub fn write_report(dir: &Path, report: &BacktestReport) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    write_portfolio(
        std::fs::File::create(dir.join("portfolio.csv"))?,
        &report.portfolio,
    )?;
    write_trades(std::fs::File::create(dir.join("trades.csv"))?, &report.trades)?;
    let summary = serde_json::to_string_pretty(&report.summary)?;
    std::fs::write(dir.join("summary.json"), summary)?;
    Ok(())
}
