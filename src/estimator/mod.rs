pub mod kalman;
pub mod matrix;

pub use kalman::{KalmanConfig, KalmanHedgeRatio, KalmanOutput, KalmanState, KalmanStep};
