//! Entry/exit cash flows per costing convention.
//!
//! Quantities are always the locked `(qty_dependent, qty_independent)` of the trade;
//! `commission` is a flat rate applied to each leg's notional.

use crate::config::CostingConvention;
use crate::model::{LegSide, OpenTrade};

/// Notional of each leg at the given prices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegNotional {
    pub dependent: f64,
    pub independent: f64,
}

impl LegNotional {
    pub fn new(price_dep: f64, qty_dep: f64, price_ind: f64, qty_ind: f64) -> Self {
        Self {
            dependent: price_dep * qty_dep,
            independent: price_ind * qty_ind,
        }
    }

    pub fn total(&self) -> f64 {
        self.dependent + self.independent
    }

    /// `(bought, sold)` notionals given which side the dependent leg holds.
    fn long_short(&self, dependent_side: LegSide) -> (f64, f64) {
        match dependent_side {
            LegSide::Long => (self.dependent, self.independent),
            LegSide::Short => (self.independent, self.dependent),
        }
    }
}

impl CostingConvention {
    /// Cash deducted from capital to open the pair.
    pub fn entry_cash(self, dependent_side: LegSide, notional: LegNotional, commission: f64) -> f64 {
        let (long_leg, short_leg) = notional.long_short(dependent_side);
        match self {
            Self::NetCashFlow => long_leg * (1.0 + commission) - short_leg * (1.0 - commission),
            Self::MarginPnl => long_leg * (1.0 + commission) + short_leg * commission,
        }
    }

    /// Cash credited to capital when closing `trade` at the given prices.
    pub fn exit_cash(
        self,
        trade: &OpenTrade,
        price_dependent: f64,
        price_independent: f64,
        commission: f64,
    ) -> f64 {
        let notional = LegNotional::new(
            price_dependent,
            trade.qty_dependent(),
            price_independent,
            trade.qty_independent(),
        );
        match self {
            Self::NetCashFlow => {
                // Sell what was bought, buy back what was shorted.
                let (long_leg, short_leg) = notional.long_short(trade.dependent_side());
                long_leg * (1.0 - commission) - short_leg * (1.0 + commission)
            }
            Self::MarginPnl => {
                trade.unrealized_pnl(price_dependent, price_independent)
                    - notional.total() * commission
            }
        }
    }

    pub fn profit(self, entry_cash: f64, exit_cash: f64) -> f64 {
        match self {
            Self::NetCashFlow => exit_cash - entry_cash,
            // The margin convention books the exit settlement itself as the trade result.
            Self::MarginPnl => exit_cash,
        }
    }
}
