pub mod broker;
pub mod error;
pub mod trade;

pub use broker::{Broker, PositionSummary};
pub use error::LedgerError;
pub use trade::{ClosedTrade, OpenTrade, OrderSide, TradeId, TradeRecord, TradeStatus};
