use thiserror::Error;

#[derive(Error, Debug)]
pub enum BacktestError {
    #[error("config error: {0}")]
    InvalidConfig(String),

    #[error("length mismatch: {left} has {left_len} items, {right} has {right_len}")]
    LengthMismatch {
        left: &'static str,
        left_len: usize,
        right: &'static str,
        right_len: usize,
    },

    #[error("timestamps must be strictly increasing (index {index}: {prev} -> {next})")]
    NonMonotonicTimestamp { index: usize, prev: u64, next: u64 },

    #[error("observation noise must be > 0 (got {0})")]
    NonPositiveObservationNoise(f64),

    #[error("innovation covariance is singular at observation x={x_obs}")]
    SingularInnovation { x_obs: f64 },

    #[error("invalid signal {value} at {timestamp_ms}: expected -1, 0 or 1")]
    InvalidSignal { timestamp_ms: u64, value: i64 },

    #[error("update() called without a preceding predict()")]
    UpdateWithoutPredict,

    #[error("engine already advanced {steps} steps; call reset() before a new run")]
    EngineInUse { steps: usize },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BacktestError>;
