use crate::ledger::trade::TradeId;
use thiserror::Error;

//caller-facing ledger failures; none of them are retried
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Invalid order side '{0}': expected 'buy' or 'sell'")]
    InvalidSide(String),
    #[error("No open trade with ID {0}")]
    UnknownTrade(TradeId),
    #[error("No price supplied and no price has been published to the broker")]
    UnresolvedPrice,
    #[error("Invalid order quantity: {0} (must be positive and finite)")]
    InvalidQuantity(f64),
}
