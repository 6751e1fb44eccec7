use pairs_backtest::backtest::{run_backtest, BacktestEngine, EntrySkip};
use pairs_backtest::config::{
    BacktestConfig, ConventionProfile, DirectionConvention, ExitPolicy,
};
use pairs_backtest::model::{Direction, LegSide, PricePoint, PriceSeries, SignalPoint, SignalSeries};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const CAPITAL: f64 = 1_000_000.0;

fn scenario_prices() -> PriceSeries {
    PriceSeries::from_columns(
        &[1, 2, 3, 4],
        &[100.0, 105.0, 110.0, 95.0],
        &[50.0, 51.0, 52.0, 48.0],
    )
    .unwrap()
}

fn signals(timestamps: &[u64], values: &[i64]) -> SignalSeries {
    SignalSeries::from_columns(timestamps, values).unwrap()
}

fn scenario_signals() -> SignalSeries {
    signals(&[1, 2, 3, 4], &[0, 1, 1, 0])
}

#[test]
fn single_round_trip_without_commission() {
    let report = run_backtest(
        BacktestConfig::new(CAPITAL, 10, 0.0),
        &scenario_prices(),
        &scenario_signals(),
    )
    .unwrap();

    assert_eq!(report.trades.len(), 1);
    let trade = &report.trades[0];
    assert_eq!(trade.entry.entry_time_ms(), 2);
    assert_eq!(trade.entry.entry_price_dependent(), 105.0);
    assert_eq!(trade.entry.entry_price_independent(), 51.0);
    assert_eq!(trade.exit_time_ms, 4);
    assert_eq!(trade.exit_price_dependent, 95.0);
    assert_eq!(trade.exit_price_independent, 48.0);
    assert_eq!(trade.entry.direction(), Direction::Long);
    assert!((trade.profit - (-70.0)).abs() < 1e-9);

    let values = report.values();
    let expected = [CAPITAL, CAPITAL - 540.0, CAPITAL - 500.0, CAPITAL - 70.0];
    for (v, e) in values.iter().zip(expected) {
        assert!((v - e).abs() < 1e-6, "value={v} expected={e}");
    }

    let s = &report.summary;
    assert_eq!(s.trade_count, 1);
    assert_eq!(s.win_rate, 0.0);
    assert!((s.final_value - (CAPITAL - 70.0)).abs() < 1e-6);
    assert_eq!(s.open_trades_at_end, 0);
}

#[test]
fn commission_reduces_profit_by_both_notionals() {
    let report = run_backtest(
        BacktestConfig::new(CAPITAL, 10, 0.01),
        &scenario_prices(),
        &scenario_signals(),
    )
    .unwrap();
    let entry_notional = 105.0 * 10.0 + 51.0 * 10.0;
    let exit_notional = 95.0 * 10.0 + 48.0 * 10.0;
    let expected = -70.0 - (entry_notional + exit_notional) * 0.01;
    assert!((report.trades[0].profit - expected).abs() < 1e-9);
    assert!((report.summary.final_value - (CAPITAL + expected)).abs() < 1e-6);
}

#[test]
fn capital_at_margin_floor_blocks_entry() {
    let cfg = BacktestConfig::new(250_000.0, 10, 0.0).with_margin_floor(250_000.0);
    let mut engine = BacktestEngine::new(cfg).unwrap();
    let out = engine
        .step(&PricePoint::new(1, 105.0, 51.0), &SignalPoint::new(1))
        .unwrap();
    assert_eq!(out.opened, None);
    assert_eq!(out.skipped, Some(EntrySkip::MarginFloor));
    assert_eq!(engine.open_trade_count(), 0);
    assert_eq!(engine.capital(), 250_000.0);
}

#[test]
fn entry_cost_above_capital_is_skipped() {
    let cfg = BacktestConfig::new(1_000.0, 100, 0.0).with_margin_floor(0.0);
    let mut engine = BacktestEngine::new(cfg).unwrap();
    let out = engine
        .step(&PricePoint::new(1, 100.0, 50.0), &SignalPoint::new(1))
        .unwrap();
    assert_eq!(out.skipped, Some(EntrySkip::InsufficientCapital));
    assert_eq!(engine.capital(), 1_000.0);
    assert!((out.snapshot.value - 1_000.0).abs() < f64::EPSILON);
}

#[test]
fn missing_signal_counts_as_flat() {
    // Only the entry timestamp carries a signal; the next step has none and closes.
    let sparse = signals(&[2], &[1]);
    let report = run_backtest(BacktestConfig::new(CAPITAL, 10, 0.0), &scenario_prices(), &sparse)
        .unwrap();
    assert_eq!(report.trades.len(), 1);
    assert_eq!(report.trades[0].exit_time_ms, 3);
    assert_eq!(report.portfolio.len(), 4);
}

#[test]
fn hedge_ratio_and_quantities_are_locked_at_entry() {
    let prices = scenario_prices();
    let sigs = SignalSeries::from_points([
        (2, SignalPoint::new(1).with_hedge_ratio(1.5)),
        (3, SignalPoint::new(1).with_hedge_ratio(0.5)),
        (4, SignalPoint::new(0).with_hedge_ratio(3.0)),
    ])
    .unwrap();
    let report = run_backtest(BacktestConfig::new(CAPITAL, 10, 0.0), &prices, &sigs).unwrap();
    let trade = &report.trades[0];
    assert_eq!(trade.entry.hedge_ratio_at_entry(), 1.5);
    assert!((trade.entry.qty_independent() - 15.0).abs() < f64::EPSILON);
    // (95 - 105) * 10 - (48 - 51) * 15
    assert!((trade.profit - (-55.0)).abs() < 1e-9);
}

#[test]
fn direction_change_closes_and_reopens_same_step() {
    let prices = PriceSeries::from_columns(&[1, 2, 3], &[100.0, 101.0, 102.0], &[50.0, 50.5, 51.0])
        .unwrap();
    let sigs = signals(&[1, 2, 3], &[1, -1, 0]);

    let mut engine = BacktestEngine::new(BacktestConfig::new(CAPITAL, 10, 0.0)).unwrap();
    engine.step(&prices.points()[0], &sigs.get(1)).unwrap();
    let out = engine.step(&prices.points()[1], &sigs.get(2)).unwrap();
    assert_eq!(out.closed.len(), 1);
    assert!(out.opened.is_some());
    assert!(engine.open_trades(Direction::Long).is_empty());
    assert_eq!(engine.open_trades(Direction::Short).len(), 1);
}

#[test]
fn on_flat_policy_holds_through_opposite_signal() {
    let prices = PriceSeries::from_columns(&[1, 2, 3], &[100.0, 101.0, 102.0], &[50.0, 50.5, 51.0])
        .unwrap();
    let sigs = signals(&[1, 2, 3], &[1, -1, 0]);
    let cfg = BacktestConfig::new(CAPITAL, 10, 0.0).with_exit_policy(ExitPolicy::OnFlat);

    let mut engine = BacktestEngine::new(cfg).unwrap();
    engine.step(&prices.points()[0], &sigs.get(1)).unwrap();
    let out = engine.step(&prices.points()[1], &sigs.get(2)).unwrap();
    assert!(out.closed.is_empty());
    assert_eq!(engine.open_trade_count(), 2);

    let out = engine.step(&prices.points()[2], &sigs.get(3)).unwrap();
    assert_eq!(out.closed.len(), 2);
    assert_eq!(engine.trade_log().len(), 2);
    assert!(engine.trade_log().iter().all(|t| t.exit_time_ms == 3));
}

#[test]
fn inverted_direction_shorts_dependent_on_positive_signal() {
    let cfg = BacktestConfig::new(CAPITAL, 10, 0.0)
        .with_direction(DirectionConvention::LongIndependentOnPositive);
    let report = run_backtest(cfg, &scenario_prices(), &scenario_signals()).unwrap();
    let trade = &report.trades[0];
    assert_eq!(trade.entry.direction(), Direction::Long);
    assert_eq!(trade.entry.dependent_side(), LegSide::Short);
    assert!((trade.profit - 70.0).abs() < 1e-9);
    assert_eq!(report.summary.win_rate, 100.0);
}

#[test]
fn legacy_margin_profile_books_pnl_less_exit_commission() {
    let cfg =
        BacktestConfig::new(CAPITAL, 10, 0.01).with_profile(ConventionProfile::LegacyMargin);
    let report = run_backtest(cfg, &scenario_prices(), &scenario_signals()).unwrap();
    let entry_cash = 105.0 * 10.0 * 1.01 + 51.0 * 10.0 * 0.01;
    let exit_cash = -70.0 - (95.0 * 10.0 + 48.0 * 10.0) * 0.01;
    let trade = &report.trades[0];
    assert!((trade.entry.entry_cash() - entry_cash).abs() < 1e-9);
    assert!((trade.profit - exit_cash).abs() < 1e-9);
    assert!((report.summary.final_value - (CAPITAL - entry_cash + exit_cash)).abs() < 1e-6);
}

#[test]
fn multiple_trades_per_direction_up_to_limit() {
    let ts: Vec<u64> = (1..=5).collect();
    let prices = PriceSeries::from_columns(&ts, &[100.0; 5], &[50.0; 5]).unwrap();
    let sigs = signals(&ts, &[1, 1, 1, 1, 1]);
    let cfg = BacktestConfig::new(CAPITAL, 10, 0.0).with_max_open_per_direction(3);
    let report = run_backtest(cfg, &prices, &sigs).unwrap();
    assert_eq!(report.open_trades.len(), 3);
    assert_eq!(report.summary.open_trades_at_end, 3);
    assert!(report.trades.is_empty());
    assert_eq!(report.all_trades().iter().filter(|t| t.is_open()).count(), 3);
}

#[test]
fn open_trades_are_reported_not_force_closed() {
    let sigs = signals(&[1, 2, 3, 4], &[0, 0, 1, 1]);
    let report = run_backtest(BacktestConfig::new(CAPITAL, 10, 0.0), &scenario_prices(), &sigs)
        .unwrap();
    assert!(report.trades.is_empty());
    assert_eq!(report.open_trades.len(), 1);
    assert_eq!(report.summary.trade_count, 0);
    assert_eq!(report.summary.win_rate, 0.0);
}

fn random_run(seed: u64) -> (PriceSeries, SignalSeries) {
    let mut rng = StdRng::seed_from_u64(seed);
    let n = 400;
    let ts: Vec<u64> = (0..n).map(|i| 1_000 + i * 60_000).collect();
    let mut dep = Vec::with_capacity(n as usize);
    let mut ind = Vec::with_capacity(n as usize);
    let (mut d, mut i) = (100.0_f64, 50.0_f64);
    for _ in 0..n {
        d = (d + rng.gen_range(-1.0..1.0)).max(1.0);
        i = (i + rng.gen_range(-0.5..0.5)).max(1.0);
        dep.push(d);
        ind.push(i);
    }
    let prices = PriceSeries::from_columns(&ts, &dep, &ind).unwrap();
    let sigs = SignalSeries::from_points(ts.iter().map(|t| {
        let point = SignalPoint::new(rng.gen_range(-1..=1))
            .with_normalized_spread(rng.gen_range(-3.0..3.0))
            .with_hedge_ratio(rng.gen_range(0.5..2.0));
        (*t, point)
    }))
    .unwrap();
    (prices, sigs)
}

#[test]
fn capital_moves_only_on_open_and_close() {
    for seed in 0..5 {
        let (prices, sigs) = random_run(seed);
        let cfg = BacktestConfig::new(CAPITAL, 100, 0.001).with_max_open_per_direction(2);
        let mut engine = BacktestEngine::new(cfg).unwrap();
        for p in prices.iter() {
            let before = engine.capital();
            let log_before = engine.trade_log().len();
            let out = engine.step(p, &sigs.get(p.timestamp_ms)).unwrap();

            let closed_cash: f64 = engine.trade_log()[log_before..]
                .iter()
                .map(|t| t.exit_cash)
                .sum();
            assert_eq!(engine.trade_log().len(), log_before + out.closed.len());
            let opened_cash = match out.opened {
                Some(id) => {
                    assert!(before + closed_cash > engine.config().margin_floor);
                    [Direction::Long, Direction::Short]
                        .iter()
                        .flat_map(|d| engine.open_trades(*d))
                        .find(|t| t.id() == id)
                        .map(|t| t.entry_cash())
                        .unwrap()
                }
                None => 0.0,
            };
            let expected = before + closed_cash - opened_cash;
            assert!((engine.capital() - expected).abs() < 1e-6);

            let snap = out.snapshot;
            assert_eq!(snap.capital, engine.capital());
            assert_eq!(snap.value, snap.capital + snap.unrealized_pnl);
            let mtm = engine.unrealized_pnl(p.dependent, p.independent);
            assert!((snap.unrealized_pnl - mtm).abs() < 1e-9);
        }
    }
}

#[test]
fn replay_is_bit_identical() {
    let (prices, sigs) = random_run(42);
    let cfg = BacktestConfig::new(CAPITAL, 100, 0.002);
    let a = run_backtest(cfg.clone(), &prices, &sigs).unwrap();
    let b = run_backtest(cfg, &prices, &sigs).unwrap();
    let bits = |v: Vec<f64>| v.into_iter().map(f64::to_bits).collect::<Vec<_>>();
    assert_eq!(bits(a.values()), bits(b.values()));
    assert_eq!(a.trades, b.trades);
    assert_eq!(a.summary, b.summary);
}

#[test]
fn win_rate_is_bounded() {
    for seed in 0..10 {
        let (prices, sigs) = random_run(seed);
        let report = run_backtest(BacktestConfig::new(CAPITAL, 100, 0.0), &prices, &sigs).unwrap();
        let s = &report.summary;
        assert!((0.0..=100.0).contains(&s.win_rate));
        if s.trade_count == 0 {
            assert_eq!(s.win_rate, 0.0);
        }
        assert!(s.winning_trades + s.losing_trades <= s.trade_count);
        assert_eq!(report.portfolio.len(), prices.len());
    }
}

#[test]
fn invalid_config_fails_before_simulation() {
    let err = run_backtest(
        BacktestConfig::new(CAPITAL, 10, 1.5),
        &scenario_prices(),
        &scenario_signals(),
    )
    .unwrap_err();
    assert!(matches!(err, pairs_backtest::BacktestError::InvalidConfig(_)));
}
