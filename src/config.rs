use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::BacktestError;
use crate::estimator::KalmanConfig;
use crate::model::{Direction, LegSide};
use crate::signal_gen::ThresholdConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
pub const CONFIG_PATH_ENV: &str = "PAIRS_BACKTEST_CONFIG";
pub const DEFAULT_MARGIN_FLOOR: f64 = 250_000.0;
pub const DEFAULT_CLOSE_THRESHOLD: f64 = 0.2;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub backtest: BacktestConfig,
    #[serde(default)]
    pub kalman: KalmanConfig,
    #[serde(default)]
    pub signal: ThresholdConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How entry and exit cash flows are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostingConvention {
    /// Capital pays the net of both legs at entry and receives the net at exit,
    /// commission applied per leg in the direction of the cash flow.
    NetCashFlow,
    /// Capital pays the long-leg notional plus commission on both legs at entry,
    /// and at exit receives the gross pair P&L less exit commission.
    MarginPnl,
}

/// Which leg a +1 signal buys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectionConvention {
    LongDependentOnPositive,
    LongIndependentOnPositive,
}

impl DirectionConvention {
    pub fn dependent_side(self, direction: Direction) -> LegSide {
        match (self, direction) {
            (Self::LongDependentOnPositive, Direction::Long)
            | (Self::LongIndependentOnPositive, Direction::Short) => LegSide::Long,
            (Self::LongDependentOnPositive, Direction::Short)
            | (Self::LongIndependentOnPositive, Direction::Long) => LegSide::Short,
        }
    }
}

/// When an open direction is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitPolicy {
    /// Close as soon as the signal differs from the trade direction (0 or opposite).
    OnDirectionChange,
    /// Close only when the signal reverts to exactly 0.
    OnFlat,
}

impl ExitPolicy {
    pub fn should_exit(self, open_direction: Direction, signal: i8) -> bool {
        match self {
            Self::OnDirectionChange => signal != open_direction.as_signal(),
            Self::OnFlat => signal == 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConventionProfile {
    #[default]
    Canonical,
    LegacyMargin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conventions {
    pub costing: CostingConvention,
    pub direction: DirectionConvention,
    pub exit_policy: ExitPolicy,
}

impl ConventionProfile {
    pub fn conventions(self) -> Conventions {
        match self {
            Self::Canonical => Conventions {
                costing: CostingConvention::NetCashFlow,
                direction: DirectionConvention::LongDependentOnPositive,
                exit_policy: ExitPolicy::OnDirectionChange,
            },
            Self::LegacyMargin => Conventions {
                costing: CostingConvention::MarginPnl,
                direction: DirectionConvention::LongDependentOnPositive,
                exit_policy: ExitPolicy::OnDirectionChange,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub n_shares: u64,
    pub commission: f64,
    #[serde(default = "default_margin_floor")]
    pub margin_floor: f64,
    #[serde(default = "default_close_threshold")]
    pub close_threshold: f64,
    /// 1 keeps a single position per direction.
    #[serde(default = "default_max_open_per_direction")]
    pub max_open_per_direction: usize,
    #[serde(default)]
    pub profile: ConventionProfile,
    #[serde(default)]
    pub costing: Option<CostingConvention>,
    #[serde(default)]
    pub direction: Option<DirectionConvention>,
    #[serde(default)]
    pub exit_policy: Option<ExitPolicy>,
}

fn default_margin_floor() -> f64 {
    DEFAULT_MARGIN_FLOOR
}

fn default_close_threshold() -> f64 {
    DEFAULT_CLOSE_THRESHOLD
}

fn default_max_open_per_direction() -> usize {
    1
}

impl BacktestConfig {
    pub fn new(initial_capital: f64, n_shares: u64, commission: f64) -> Self {
        Self {
            initial_capital,
            n_shares,
            commission,
            margin_floor: DEFAULT_MARGIN_FLOOR,
            close_threshold: DEFAULT_CLOSE_THRESHOLD,
            max_open_per_direction: 1,
            profile: ConventionProfile::Canonical,
            costing: None,
            direction: None,
            exit_policy: None,
        }
    }

    pub fn with_profile(mut self, profile: ConventionProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_margin_floor(mut self, margin_floor: f64) -> Self {
        self.margin_floor = margin_floor;
        self
    }

    pub fn with_close_threshold(mut self, close_threshold: f64) -> Self {
        self.close_threshold = close_threshold;
        self
    }

    pub fn with_exit_policy(mut self, exit_policy: ExitPolicy) -> Self {
        self.exit_policy = Some(exit_policy);
        self
    }

    pub fn with_direction(mut self, direction: DirectionConvention) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn with_costing(mut self, costing: CostingConvention) -> Self {
        self.costing = Some(costing);
        self
    }

    pub fn with_max_open_per_direction(mut self, max_open: usize) -> Self {
        self.max_open_per_direction = max_open;
        self
    }

    /// Profile defaults with any explicit per-axis overrides applied.
    pub fn conventions(&self) -> Conventions {
        let base = self.profile.conventions();
        Conventions {
            costing: self.costing.unwrap_or(base.costing),
            direction: self.direction.unwrap_or(base.direction),
            exit_policy: self.exit_policy.unwrap_or(base.exit_policy),
        }
    }

    pub fn validate(&self) -> std::result::Result<(), BacktestError> {
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(BacktestError::InvalidConfig(format!(
                "initial_capital must be a positive finite number (got {})",
                self.initial_capital
            )));
        }
        if self.n_shares == 0 {
            return Err(BacktestError::InvalidConfig(
                "n_shares must be > 0".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.commission) {
            return Err(BacktestError::InvalidConfig(format!(
                "commission must be in [0, 1) (got {})",
                self.commission
            )));
        }
        if !(self.margin_floor >= 0.0) {
            return Err(BacktestError::InvalidConfig(format!(
                "margin_floor must be >= 0 (got {})",
                self.margin_floor
            )));
        }
        if !(self.close_threshold >= 0.0) {
            return Err(BacktestError::InvalidConfig(format!(
                "close_threshold must be >= 0 (got {})",
                self.close_threshold
            )));
        }
        if self.max_open_per_direction == 0 {
            return Err(BacktestError::InvalidConfig(
                "max_open_per_direction must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Load from `$PAIRS_BACKTEST_CONFIG`, falling back to `config/default.toml`.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&config_str)
            .with_context(|| format!("invalid config in {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)
            .map_err(BacktestError::from)
            .context("failed to parse config TOML")?;
        config
            .backtest
            .validate()
            .context("backtest section is invalid")?;
        config.kalman.validate().context("kalman section is invalid")?;
        Ok(config)
    }
}
