use serde::Serialize;

use super::signal::Direction;

/// Side held on the dependent leg. The independent leg always holds the opposite side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LegSide {
    Long,
    Short,
}

/// A live pair position. Quantities, entry prices and hedge ratio are fixed at creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenTrade {
    id: u64,
    entry_time_ms: u64,
    direction: Direction,
    dependent_side: LegSide,
    entry_price_dependent: f64,
    entry_price_independent: f64,
    qty_dependent: f64,
    qty_independent: f64,
    hedge_ratio_at_entry: f64,
    entry_cash: f64,
}

impl OpenTrade {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: u64,
        entry_time_ms: u64,
        direction: Direction,
        dependent_side: LegSide,
        entry_price_dependent: f64,
        entry_price_independent: f64,
        n_shares: u64,
        hedge_ratio_at_entry: f64,
        entry_cash: f64,
    ) -> Self {
        let qty_dependent = n_shares as f64;
        Self {
            id,
            entry_time_ms,
            direction,
            dependent_side,
            entry_price_dependent,
            entry_price_independent,
            qty_dependent,
            qty_independent: qty_dependent * hedge_ratio_at_entry,
            hedge_ratio_at_entry,
            entry_cash,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn entry_time_ms(&self) -> u64 {
        self.entry_time_ms
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn dependent_side(&self) -> LegSide {
        self.dependent_side
    }

    pub fn entry_price_dependent(&self) -> f64 {
        self.entry_price_dependent
    }

    pub fn entry_price_independent(&self) -> f64 {
        self.entry_price_independent
    }

    pub fn qty_dependent(&self) -> f64 {
        self.qty_dependent
    }

    pub fn qty_independent(&self) -> f64 {
        self.qty_independent
    }

    pub fn hedge_ratio_at_entry(&self) -> f64 {
        self.hedge_ratio_at_entry
    }

    /// Cash taken from capital when the trade was opened.
    pub fn entry_cash(&self) -> f64 {
        self.entry_cash
    }

    /// Gross P&L at the given prices, using the locked quantities.
    pub fn unrealized_pnl(&self, price_dependent: f64, price_independent: f64) -> f64 {
        let dep_move = (price_dependent - self.entry_price_dependent) * self.qty_dependent;
        let ind_move = (price_independent - self.entry_price_independent) * self.qty_independent;
        match self.dependent_side {
            LegSide::Long => dep_move - ind_move,
            LegSide::Short => ind_move - dep_move,
        }
    }

    pub(crate) fn close(
        self,
        exit_time_ms: u64,
        exit_price_dependent: f64,
        exit_price_independent: f64,
        exit_cash: f64,
        profit: f64,
    ) -> ClosedTrade {
        ClosedTrade {
            entry: self,
            exit_time_ms,
            exit_price_dependent,
            exit_price_independent,
            exit_cash,
            profit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClosedTrade {
    pub entry: OpenTrade,
    pub exit_time_ms: u64,
    pub exit_price_dependent: f64,
    pub exit_price_independent: f64,
    /// Cash returned to capital on close.
    pub exit_cash: f64,
    pub profit: f64,
}

impl ClosedTrade {
    pub fn is_win(&self) -> bool {
        self.profit > 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Trade {
    Open(OpenTrade),
    Closed(ClosedTrade),
}

impl Trade {
    pub fn entry(&self) -> &OpenTrade {
        match self {
            Self::Open(t) => t,
            Self::Closed(t) => &t.entry,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open(_))
    }

    pub fn exit_time_ms(&self) -> Option<u64> {
        match self {
            Self::Open(_) => None,
            Self::Closed(t) => Some(t.exit_time_ms),
        }
    }

    pub fn profit(&self) -> Option<f64> {
        match self {
            Self::Open(_) => None,
            Self::Closed(t) => Some(t.profit),
        }
    }
}
