use crate::ledger::error::LedgerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

//ledger-assigned trade identifier, starts at 1 and is never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradeId(pub u64);

impl TradeId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    //converts to pnl direction (Buy = +1, Sell = -1)
    pub fn direction(&self) -> f64 {
        match self {
            OrderSide::Buy => 1.0,
            OrderSide::Sell => -1.0,
        }
    }

    //the side that unwinds a trade opened on this side
    pub fn opposite(&self) -> OrderSide {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderSide {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" => Ok(OrderSide::Buy),
            "sell" => Ok(OrderSide::Sell),
            _ => Err(LedgerError::InvalidSide(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Open,
    Closed,
}

//a position with capital committed, owned by the broker until it is closed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenTrade {
    pub id: TradeId,
    pub side: OrderSide,
    pub quantity: f64,
    pub entry_price: f64,
    pub opened_at: Option<DateTime<Utc>>,
}

impl OpenTrade {
    //signed quantity (positive for long, negative for short)
    pub fn signed_quantity(&self) -> f64 {
        self.side.direction() * self.quantity
    }

    //signed notional committed at entry
    pub fn cost_basis(&self) -> f64 {
        self.signed_quantity() * self.entry_price
    }

    //mark-to-market pnl at the given price
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.quantity * self.side.direction()
    }
}

//a finished round trip, written once by the close transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub id: TradeId,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    pub entry_side: OrderSide,
    pub exit_side: OrderSide,
    pub opened_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub realized_pnl: f64,
}

impl ClosedTrade {
    pub fn is_win(&self) -> bool {
        self.realized_pnl > 0.0
    }
}

//one entry of the append-only trade log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TradeRecord {
    Open(OpenTrade),
    Closed(ClosedTrade),
}

impl TradeRecord {
    pub fn id(&self) -> TradeId {
        match self {
            TradeRecord::Open(t) => t.id,
            TradeRecord::Closed(t) => t.id,
        }
    }

    pub fn status(&self) -> TradeStatus {
        match self {
            TradeRecord::Open(_) => TradeStatus::Open,
            TradeRecord::Closed(_) => TradeStatus::Closed,
        }
    }

    pub fn as_closed(&self) -> Option<&ClosedTrade> {
        match self {
            TradeRecord::Closed(t) => Some(t),
            TradeRecord::Open(_) => None,
        }
    }
}
