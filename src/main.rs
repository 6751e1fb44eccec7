use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use pairs_backtest::backtest::run_backtest;
use pairs_backtest::config::{Config, LoggingConfig, DEFAULT_CONFIG_PATH};
use pairs_backtest::estimator::KalmanHedgeRatio;
use pairs_backtest::io;
use pairs_backtest::model::{PriceSeries, SignalSeries};
use pairs_backtest::signal_gen;
use pairs_backtest::sweep::{run_sweep, SweepAxis, SweepParam};

#[derive(Parser)]
#[command(
    name = "pairs-backtest",
    version,
    about = "Pairs-trading backtest with a Kalman hedge-ratio estimator",
    propagate_version = true
)]
struct Cli {
    /// Path to the TOML config
    #[arg(long, global = true, env = "PAIRS_BACKTEST_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single backtest
    Run {
        /// Prices CSV: timestamp_ms,dependent,independent
        #[arg(long)]
        prices: PathBuf,
        /// Signals CSV; generated from the Kalman spread when omitted
        #[arg(long)]
        signals: Option<PathBuf>,
        /// Directory for portfolio.csv, trades.csv and summary.json
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Print per-step Kalman hedge ratios as CSV
    Hedge {
        #[arg(long)]
        prices: PathBuf,
    },
    /// Parallel parameter sweep over the backtest config
    Sweep {
        #[arg(long)]
        prices: PathBuf,
        #[arg(long)]
        signals: Option<PathBuf>,
        #[arg(long, value_delimiter = ',')]
        commission: Vec<f64>,
        #[arg(long, value_delimiter = ',')]
        n_shares: Vec<f64>,
        #[arg(long, value_delimiter = ',')]
        close_threshold: Vec<f64>,
        #[arg(long, value_delimiter = ',')]
        margin_floor: Vec<f64>,
    },
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        logging
            .level
            .parse()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    });
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_signals(
    config: &Config,
    prices: &PriceSeries,
    signals: Option<&PathBuf>,
) -> Result<SignalSeries> {
    match signals {
        Some(path) => io::load_signals(path)
            .with_context(|| format!("failed to load signals from {}", path.display())),
        None => signal_gen::generate_from_prices(prices, config.kalman, &config.signal)
            .context("failed to generate signals from prices"),
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::load_from(&cli.config)?;
    init_tracing(&config.logging);
    tracing::info!(config = %cli.config.display(), "Starting pairs-backtest");

    match cli.command {
        Commands::Run {
            prices,
            signals,
            out_dir,
        } => {
            let price_series = io::load_prices(&prices)
                .with_context(|| format!("failed to load prices from {}", prices.display()))?;
            let signal_series = load_signals(&config, &price_series, signals.as_ref())?;
            let report = run_backtest(config.backtest.clone(), &price_series, &signal_series)?;
            if let Some(dir) = out_dir {
                io::write_report(&dir, &report)
                    .with_context(|| format!("failed to write report to {}", dir.display()))?;
            }
            println!("{}", serde_json::to_string_pretty(&report.summary)?);
        }
        Commands::Hedge { prices } => {
            let price_series = io::load_prices(&prices)
                .with_context(|| format!("failed to load prices from {}", prices.display()))?;
            let x = price_series.independent();
            let y = price_series.dependent();
            let mut filter = KalmanHedgeRatio::new(config.kalman)?;
            let out = filter.run(&x, &y)?;
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            writeln!(lock, "timestamp_ms,hedge_ratio,intercept,fitted")?;
            for (i, ts) in price_series.timestamps().iter().enumerate() {
                writeln!(
                    lock,
                    "{},{},{},{}",
                    ts, out.hedge_ratios[i], out.intercepts[i], out.fitted[i]
                )?;
            }
        }
        Commands::Sweep {
            prices,
            signals,
            commission,
            n_shares,
            close_threshold,
            margin_floor,
        } => {
            let price_series = io::load_prices(&prices)
                .with_context(|| format!("failed to load prices from {}", prices.display()))?;
            let signal_series = load_signals(&config, &price_series, signals.as_ref())?;
            let axes: Vec<SweepAxis> = [
                (SweepParam::Commission, commission),
                (SweepParam::NShares, n_shares),
                (SweepParam::CloseThreshold, close_threshold),
                (SweepParam::MarginFloor, margin_floor),
            ]
            .into_iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(param, values)| SweepAxis { param, values })
            .collect();
            let results = run_sweep(&config.backtest, &axes, &price_series, &signal_series);
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
