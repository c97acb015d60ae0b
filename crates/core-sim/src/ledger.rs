use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Discrete trading decision. Codes are `BUY=0, SELL=1, HOLD=2, BUY_ALL=3, SELL_ALL=4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Buy,
    Sell,
    Hold,
    BuyAll,
    SellAll,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Buy,
        Action::Sell,
        Action::Hold,
        Action::BuyAll,
        Action::SellAll,
    ];

    pub fn code(self) -> i64 {
        match self {
            Self::Buy => 0,
            Self::Sell => 1,
            Self::Hold => 2,
            Self::BuyAll => 3,
            Self::SellAll => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
            Self::Hold => "hold",
            Self::BuyAll => "buy_all",
            Self::SellAll => "sell_all",
        }
    }
}

impl TryFrom<i64> for Action {
    type Error = EngineError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Buy),
            1 => Ok(Self::Sell),
            2 => Ok(Self::Hold),
            3 => Ok(Self::BuyAll),
            4 => Ok(Self::SellAll),
            _ => Err(EngineError::InvalidAction {
                code,
                reason: "action code must be within 0..=4",
            }),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Long,
    Short,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub side: Side,
    pub entry_price: f64,
    pub entry_step: usize,
}

impl Position {
    /// Absolute and percentage profit of closing this position at `exit_price`.
    pub fn realized_at(&self, exit_price: f64) -> (f64, f64) {
        match self.side {
            Side::Long => (
                exit_price - self.entry_price,
                (exit_price / self.entry_price - 1.0) * 100.0,
            ),
            Side::Short => (
                self.entry_price - exit_price,
                (self.entry_price / exit_price - 1.0) * 100.0,
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub side: Side,
    pub entry_price: f64,
    pub entry_step: usize,
    pub exit_price: f64,
    pub exit_step: usize,
    pub pnl: f64,
    pub pnl_pct: f64,
}

/// Open positions, legality rules and realized profit for one episode.
///
/// Each side is a LIFO stack: closes always match the most recently opened
/// position on that side. `pnl` and `pnl_pct` only ever accumulate.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionLedger {
    open_long: Vec<Position>,
    open_short: Vec<Position>,
    pnl: f64,
    pnl_pct: f64,
    price_history: Vec<f64>,
    action_history: Vec<Action>,
    closed_trades: Vec<ClosedTrade>,
    allow_multiple_units: bool,
}

impl PositionLedger {
    pub fn new(allow_multiple_units: bool) -> Self {
        Self {
            open_long: Vec::new(),
            open_short: Vec::new(),
            pnl: 0.0,
            pnl_pct: 0.0,
            price_history: Vec::new(),
            action_history: Vec::new(),
            closed_trades: Vec::new(),
            allow_multiple_units,
        }
    }

    pub fn record_price(&mut self, price: f64) {
        self.price_history.push(price);
    }

    pub fn is_legal(&self, action: Action) -> bool {
        let has_long = !self.open_long.is_empty();
        let has_short = !self.open_short.is_empty();

        match (action, self.allow_multiple_units) {
            (Action::Hold, _) => true,
            (Action::Buy, false) => !has_long,
            (Action::Sell, false) => !has_short,
            (Action::BuyAll | Action::SellAll, false) => false,
            // Once a side is open in multi-unit mode only a batch action may close it.
            (Action::Buy, true) => !has_short,
            (Action::Sell, true) => !has_long,
            (Action::BuyAll, true) => has_short && !has_long,
            (Action::SellAll, true) => has_long && !has_short,
        }
    }

    pub fn legal_actions(&self) -> Vec<Action> {
        Action::ALL
            .into_iter()
            .filter(|action| self.is_legal(*action))
            .collect()
    }

    /// Executes `action` at the last recorded price and returns the trades it closed.
    pub fn apply(&mut self, action: Action) -> Result<Vec<ClosedTrade>, EngineError> {
        let current_price = self.current_price().ok_or(EngineError::NoPriceRecorded)?;
        if !self.is_legal(action) {
            return Err(EngineError::InvalidAction {
                code: action.code(),
                reason: "action is not legal for the open positions",
            });
        }

        let mut closed = Vec::new();
        match action {
            Action::Buy => {
                if !self.open_short.is_empty() {
                    closed.extend(self.close_last(Side::Short, current_price));
                } else {
                    self.open(Side::Long, current_price);
                }
            }
            Action::Sell => {
                if !self.open_long.is_empty() {
                    closed.extend(self.close_last(Side::Long, current_price));
                } else {
                    self.open(Side::Short, current_price);
                }
            }
            Action::SellAll => closed = self.close_side(Side::Long, current_price),
            Action::BuyAll => closed = self.close_side(Side::Short, current_price),
            Action::Hold => {}
        }

        self.action_history.push(action);
        Ok(closed)
    }

    /// Force-closes every position on both sides at the last recorded price,
    /// longs first. Legality is not consulted.
    pub fn close_all(&mut self) -> Vec<ClosedTrade> {
        let Some(current_price) = self.current_price() else {
            return Vec::new();
        };

        let mut closed = self.close_side(Side::Long, current_price);
        closed.extend(self.close_side(Side::Short, current_price));
        closed
    }

    pub fn open_long(&self) -> &[Position] {
        &self.open_long
    }

    pub fn open_short(&self) -> &[Position] {
        &self.open_short
    }

    pub fn pnl(&self) -> f64 {
        self.pnl
    }

    pub fn pnl_pct(&self) -> f64 {
        self.pnl_pct
    }

    pub fn price_history(&self) -> &[f64] {
        &self.price_history
    }

    pub fn action_history(&self) -> &[Action] {
        &self.action_history
    }

    pub fn closed_trades(&self) -> &[ClosedTrade] {
        &self.closed_trades
    }

    pub fn allow_multiple_units(&self) -> bool {
        self.allow_multiple_units
    }

    pub fn current_price(&self) -> Option<f64> {
        self.price_history.last().copied()
    }

    /// Index of the latest recorded price; `None` before the first one.
    pub fn current_step(&self) -> Option<usize> {
        self.price_history.len().checked_sub(1)
    }

    fn open(&mut self, side: Side, price: f64) {
        let position = Position {
            side,
            entry_price: price,
            entry_step: self.current_step().unwrap_or_default(),
        };
        match side {
            Side::Long => self.open_long.push(position),
            Side::Short => self.open_short.push(position),
        }
    }

    fn close_last(&mut self, side: Side, exit_price: f64) -> Option<ClosedTrade> {
        let position = match side {
            Side::Long => self.open_long.pop(),
            Side::Short => self.open_short.pop(),
        }?;
        Some(self.realize(position, exit_price))
    }

    fn close_side(&mut self, side: Side, exit_price: f64) -> Vec<ClosedTrade> {
        let mut closed = Vec::new();
        while let Some(trade) = self.close_last(side, exit_price) {
            closed.push(trade);
        }
        closed
    }

    fn realize(&mut self, position: Position, exit_price: f64) -> ClosedTrade {
        let (pnl, pnl_pct) = position.realized_at(exit_price);
        self.pnl += pnl;
        self.pnl_pct += pnl_pct;

        let trade = ClosedTrade {
            side: position.side,
            entry_price: position.entry_price,
            entry_step: position.entry_step,
            exit_price,
            exit_step: self.current_step().unwrap_or_default(),
            pnl,
            pnl_pct,
        };
        self.closed_trades.push(trade);
        trade
    }
}
