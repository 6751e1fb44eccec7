//! Online hedge-ratio estimation.
//!
//! Tracks `y_t = a + b * x_t` where the state `[a, b]` follows a random walk
//! (transition `A = I`). Each observation runs exactly one `predict()` followed by
//! one `update()`; there is no smoothing pass.

use serde::Deserialize;

use super::matrix::{self, Mat2, Vec2, IDENTITY};
use crate::error::{BacktestError, Result};

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct KalmanConfig {
    /// Starting `[intercept, slope]`.
    #[serde(default = "default_initial_state")]
    pub initial_state: Vec2,
    /// Diagonal of the starting covariance `P`.
    #[serde(default = "default_initial_covariance")]
    pub initial_covariance: f64,
    /// Diagonal of the process-noise covariance `Q`.
    #[serde(default = "default_process_noise")]
    pub process_noise: f64,
    /// Observation-noise variance `R`; must be > 0.
    #[serde(default = "default_observation_noise")]
    pub observation_noise: f64,
}

fn default_initial_state() -> Vec2 {
    [1.0, 1.0]
}

fn default_initial_covariance() -> f64 {
    1000.0
}

fn default_process_noise() -> f64 {
    0.001
}

fn default_observation_noise() -> f64 {
    10.0
}

impl Default for KalmanConfig {
    fn default() -> Self {
        Self {
            initial_state: default_initial_state(),
            initial_covariance: default_initial_covariance(),
            process_noise: default_process_noise(),
            observation_noise: default_observation_noise(),
        }
    }
}

impl KalmanConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.observation_noise > 0.0) {
            return Err(BacktestError::NonPositiveObservationNoise(
                self.observation_noise,
            ));
        }
        if !(self.process_noise >= 0.0) {
            return Err(BacktestError::InvalidConfig(format!(
                "kalman.process_noise must be >= 0 (got {})",
                self.process_noise
            )));
        }
        if !(self.initial_covariance >= 0.0) {
            return Err(BacktestError::InvalidConfig(format!(
                "kalman.initial_covariance must be >= 0 (got {})",
                self.initial_covariance
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KalmanState {
    /// `[intercept, slope]`
    pub x: Vec2,
    pub p: Mat2,
}

impl KalmanState {
    pub fn intercept(&self) -> f64 {
        self.x[0]
    }

    pub fn slope(&self) -> f64 {
        self.x[1]
    }
}

/// Result of one predict/update pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KalmanStep {
    pub hedge_ratio: f64,
    pub intercept: f64,
    /// `a + b * x_obs` with the updated state.
    pub fitted: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct KalmanOutput {
    pub hedge_ratios: Vec<f64>,
    pub intercepts: Vec<f64>,
    pub fitted: Vec<f64>,
}

impl KalmanOutput {
    fn with_capacity(n: usize) -> Self {
        Self {
            hedge_ratios: Vec::with_capacity(n),
            intercepts: Vec::with_capacity(n),
            fitted: Vec::with_capacity(n),
        }
    }

    pub fn len(&self) -> usize {
        self.hedge_ratios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hedge_ratios.is_empty()
    }

    /// Dynamic spread `y - b_t * x` using the per-step hedge ratio.
    pub fn spread(&self, x_series: &[f64], y_series: &[f64]) -> Vec<f64> {
        self.hedge_ratios
            .iter()
            .zip(x_series.iter().zip(y_series))
            .map(|(b, (x, y))| y - b * x)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct KalmanHedgeRatio {
    initial: KalmanState,
    a: Mat2,
    q: Mat2,
    r: f64,
    state: KalmanState,
    predicted: bool,
    steps: u64,
}

impl KalmanHedgeRatio {
    pub fn new(cfg: KalmanConfig) -> Result<Self> {
        cfg.validate()?;
        Self::with_matrices(
            cfg.initial_state,
            matrix::diag(cfg.initial_covariance),
            matrix::diag(cfg.process_noise),
            cfg.observation_noise,
        )
    }

    /// Full control over `x0`, `P0`, `Q` and `R`. `P0` and `Q` are taken as given.
    pub fn with_matrices(x0: Vec2, p0: Mat2, q: Mat2, r: f64) -> Result<Self> {
        if !(r > 0.0) {
            return Err(BacktestError::NonPositiveObservationNoise(r));
        }
        let initial = KalmanState { x: x0, p: p0 };
        Ok(Self {
            initial,
            a: IDENTITY,
            q,
            r,
            state: initial,
            predicted: false,
            steps: 0,
        })
    }

    pub fn state(&self) -> &KalmanState {
        &self.state
    }

    pub fn hedge_ratio(&self) -> f64 {
        self.state.slope()
    }

    pub fn intercept(&self) -> f64 {
        self.state.intercept()
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Return to the configured initial state.
    pub fn reset(&mut self) {
        self.state = self.initial;
        self.predicted = false;
        self.steps = 0;
    }

    /// `P <- A P A' + Q`. The state mean is unchanged since `A = I`.
    pub fn predict(&mut self) {
        let ap = matrix::mul(&self.a, &self.state.p);
        let apa = matrix::mul(&ap, &matrix::transpose(&self.a));
        self.state.p = matrix::add(&apa, &self.q);
        self.predicted = true;
    }

    /// Fold in one observation. Must follow a `predict()`.
    pub fn update(&mut self, x_obs: f64, y_obs: f64) -> Result<()> {
        if !self.predicted {
            return Err(BacktestError::UpdateWithoutPredict);
        }
        let c: Vec2 = [1.0, x_obs];
        let pc = matrix::mul_vec(&self.state.p, &c);
        let s = matrix::dot(&c, &pc) + self.r;
        // Only reachable with a non-PSD covariance passed through `with_matrices`.
        if s == 0.0 {
            return Err(BacktestError::SingularInnovation { x_obs });
        }
        let k: Vec2 = [pc[0] / s, pc[1] / s];

        let i_kc = matrix::sub(&IDENTITY, &matrix::outer(&k, &c));
        self.state.p = matrix::symmetrize(&matrix::mul(&i_kc, &self.state.p));

        let innovation = y_obs - matrix::dot(&c, &self.state.x);
        self.state.x = [
            self.state.x[0] + k[0] * innovation,
            self.state.x[1] + k[1] * innovation,
        ];

        self.predicted = false;
        self.steps += 1;
        Ok(())
    }

    pub fn step(&mut self, x_obs: f64, y_obs: f64) -> Result<KalmanStep> {
        self.predict();
        self.update(x_obs, y_obs)?;
        Ok(KalmanStep {
            hedge_ratio: self.state.slope(),
            intercept: self.state.intercept(),
            fitted: self.state.intercept() + self.state.slope() * x_obs,
        })
    }

    /// Filter a whole series from the initial state. Output length equals input length.
    pub fn run(&mut self, x_series: &[f64], y_series: &[f64]) -> Result<KalmanOutput> {
        if x_series.len() != y_series.len() {
            return Err(BacktestError::LengthMismatch {
                left: "x_series",
                left_len: x_series.len(),
                right: "y_series",
                right_len: y_series.len(),
            });
        }
        self.reset();
        let mut out = KalmanOutput::with_capacity(x_series.len());
        for (x, y) in x_series.iter().zip(y_series) {
            let step = self.step(*x, *y)?;
            out.hedge_ratios.push(step.hedge_ratio);
            out.intercepts.push(step.intercept);
            out.fitted.push(step.fitted);
        }
        tracing::debug!(
            observations = out.len(),
            final_slope = self.state.slope(),
            final_intercept = self.state.intercept(),
            "kalman run complete"
        );
        Ok(out)
    }
}
