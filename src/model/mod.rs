pub mod price;
pub mod signal;
pub mod trade;

pub use price::{PricePoint, PriceSeries};
pub use signal::{Direction, SignalPoint, SignalSeries};
pub use trade::{ClosedTrade, LegSide, OpenTrade, Trade};
