use crate::config::{ConfigError, LedgerConfig};
use crate::ledger::error::LedgerError;
use crate::ledger::trade::{ClosedTrade, OpenTrade, OrderSide, TradeId, TradeRecord};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

//aggregate view of the open book at the last published price
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PositionSummary {
    //signed sum of quantities (long positive, short negative)
    pub net_position: f64,
    pub unrealized_pnl: f64,
    //signed notional committed at entry
    pub cost_basis: f64,
    pub open_trade_count: usize,
}

impl PositionSummary {
    //value of the open book at the price used for the summary
    pub fn market_value(&self) -> f64 {
        self.cost_basis + self.unrealized_pnl
    }
}

//single-instrument trade ledger: owns cash, open trades and the trade log
#[derive(Debug, Clone)]
pub struct Broker {
    initial_cash: f64,
    cash: f64,
    commission_rate: f64,
    current_price: Option<f64>,
    next_id: u64,
    //insertion ordered, ids are monotonic so this is also id order
    open_trades: IndexMap<TradeId, OpenTrade>,
    trade_log: Vec<TradeRecord>,
    total_fees: f64,
    realized_pnl: f64,
}

impl Broker {
    //creates a broker with the given starting cash and proportional commission
    pub fn new(initial_cash: f64, commission_rate: f64) -> Result<Self, ConfigError> {
        Self::from_config(&LedgerConfig {
            initial_cash,
            commission_rate,
        })
    }

    pub fn from_config(config: &LedgerConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Broker {
            initial_cash: config.initial_cash,
            cash: config.initial_cash,
            commission_rate: config.commission_rate,
            current_price: None,
            next_id: 1,
            open_trades: IndexMap::new(),
            trade_log: Vec::new(),
            total_fees: 0.0,
            realized_pnl: 0.0,
        })
    }

    //publishes the latest market price
    pub fn update_price(&mut self, price: f64) {
        self.current_price = Some(price);
    }

    //explicit price wins, then the last published price
    fn resolve_price(&self, price: Option<f64>) -> Result<f64, LedgerError> {
        match price {
            Some(p) => Ok(p),
            None => self.current_price.ok_or(LedgerError::UnresolvedPrice),
        }
    }

    //moves cash for a fill and returns the fee charged
    fn settle(&mut self, side: OrderSide, quantity: f64, price: f64) -> f64 {
        let cost = quantity * price;
        let fee = cost * self.commission_rate;

        match side {
            OrderSide::Buy => self.cash -= cost + fee,
            OrderSide::Sell => self.cash += cost - fee,
        }

        self.total_fees += fee;
        fee
    }

    //opens a new trade, fully filled at the resolved price
    pub fn execute_order(
        &mut self,
        quantity: f64,
        side: OrderSide,
        price: Option<f64>,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<TradeId, LedgerError> {
        if !(quantity.is_finite() && quantity > 0.0) {
            return Err(LedgerError::InvalidQuantity(quantity));
        }
        let price = self.resolve_price(price)?;

        let fee = self.settle(side, quantity, price);

        let id = TradeId(self.next_id);
        self.next_id += 1;

        let trade = OpenTrade {
            id,
            side,
            quantity,
            entry_price: price,
            opened_at: timestamp,
        };

        debug!(
            "opened trade {}: {} {} @ {} (fee {:.4}, cash {:.2})",
            id, side, quantity, price, fee, self.cash
        );

        self.trade_log.push(TradeRecord::Open(trade.clone()));
        self.open_trades.insert(id, trade);

        Ok(id)
    }

    //parses a textual side before executing
    pub fn execute_order_str(
        &mut self,
        quantity: f64,
        side: &str,
        price: Option<f64>,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<TradeId, LedgerError> {
        let side = side.parse::<OrderSide>()?;
        self.execute_order(quantity, side, price, timestamp)
    }

    //open -> closed transition; the only way a trade leaves the open book
    pub fn close_trade(
        &mut self,
        trade_id: TradeId,
        price: Option<f64>,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<ClosedTrade, LedgerError> {
        if !self.open_trades.contains_key(&trade_id) {
            return Err(LedgerError::UnknownTrade(trade_id));
        }
        let price = self.resolve_price(price)?;

        //shift_remove is linear but keeps the remaining trades in entry order,
        //which bulk closes and reports rely on
        let trade = self
            .open_trades
            .shift_remove(&trade_id)
            .ok_or(LedgerError::UnknownTrade(trade_id))?;

        let exit_side = trade.side.opposite();
        let fee = self.settle(exit_side, trade.quantity, price);
        let realized_pnl = trade.unrealized_pnl(price);
        self.realized_pnl += realized_pnl;

        let closed = ClosedTrade {
            id: trade.id,
            entry_price: trade.entry_price,
            exit_price: price,
            quantity: trade.quantity,
            entry_side: trade.side,
            exit_side,
            opened_at: trade.opened_at,
            closed_at: timestamp,
            realized_pnl,
        };

        debug!(
            "closed trade {}: {} {} @ {} -> {} @ {} pnl {:.4} (fee {:.4}, cash {:.2})",
            trade.id,
            trade.side,
            trade.quantity,
            trade.entry_price,
            exit_side,
            price,
            realized_pnl,
            fee,
            self.cash
        );

        self.trade_log.push(TradeRecord::Closed(closed.clone()));
        Ok(closed)
    }

    //closes every open trade, walking a snapshot of ids taken up front
    pub fn close_all_trades(
        &mut self,
        price: Option<f64>,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<Vec<ClosedTrade>, LedgerError> {
        let ids = self.open_trade_ids();
        if !ids.is_empty() {
            //fail before touching the book rather than halfway through it
            self.resolve_price(price)?;
        }

        let mut closed = Vec::with_capacity(ids.len());
        for id in ids {
            closed.push(self.close_trade(id, price, timestamp)?);
        }
        Ok(closed)
    }

    //an empty book needs no price; an open one is marked at the last published price
    pub fn get_open_position_summary(&self) -> Result<PositionSummary, LedgerError> {
        if self.open_trades.is_empty() {
            return Ok(PositionSummary::default());
        }
        let price = self.current_price.ok_or(LedgerError::UnresolvedPrice)?;

        let mut summary = PositionSummary {
            open_trade_count: self.open_trades.len(),
            ..PositionSummary::default()
        };

        for trade in self.open_trades.values() {
            summary.net_position += trade.signed_quantity();
            summary.unrealized_pnl += trade.unrealized_pnl(price);
            summary.cost_basis += trade.cost_basis();
        }

        Ok(summary)
    }

    //cash plus the mark-to-market value of the open book
    //
    //cash was debited the full notional at entry, so the open book counts at
    //cost_basis + unrealized_pnl rather than unrealized_pnl alone
    pub fn get_equity(&self) -> Result<f64, LedgerError> {
        let summary = self.get_open_position_summary()?;
        Ok(self.cash + summary.cost_basis + summary.unrealized_pnl)
    }

    pub fn get_trade_log(&self) -> &[TradeRecord] {
        &self.trade_log
    }

    //stable copy of the open ids, safe to iterate while closing
    pub fn open_trade_ids(&self) -> Vec<TradeId> {
        self.open_trades.keys().copied().collect()
    }

    pub fn open_trade(&self, trade_id: TradeId) -> Option<&OpenTrade> {
        self.open_trades.get(&trade_id)
    }

    pub fn open_trades(&self) -> impl Iterator<Item = &OpenTrade> {
        self.open_trades.values()
    }

    pub fn closed_trades(&self) -> impl Iterator<Item = &ClosedTrade> {
        self.trade_log.iter().filter_map(TradeRecord::as_closed)
    }

    //signed open quantity, needs no price
    pub fn net_position(&self) -> f64 {
        self.open_trades.values().map(OpenTrade::signed_quantity).sum()
    }

    pub fn has_open_trades(&self) -> bool {
        !self.open_trades.is_empty()
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn initial_cash(&self) -> f64 {
        self.initial_cash
    }

    pub fn commission_rate(&self) -> f64 {
        self.commission_rate
    }

    pub fn current_price(&self) -> Option<f64> {
        self.current_price
    }

    //total commission paid so far, both legs
    pub fn total_fees(&self) -> f64 {
        self.total_fees
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    //human readable listing of the open book
    pub fn open_trades_report(&self) -> String {
        if self.open_trades.is_empty() {
            return "Open trades:\n\tNone".to_string();
        }

        let mut lines = vec!["Open trades:".to_string()];
        for trade in self.open_trades.values() {
            lines.push(format!(
                "\tTrade ID {}: {} {} @ {} | Timestamp: {}",
                trade.id,
                trade.side.as_str().to_uppercase(),
                trade.quantity,
                trade.entry_price,
                format_timestamp(trade.opened_at)
            ));
        }
        lines.join("\n")
    }

    //human readable listing of closed round trips with pnl
    pub fn closed_trades_report(&self) -> String {
        let mut lines = vec!["Closed trades:".to_string()];
        for trade in self.closed_trades() {
            lines.push(format!(
                "\tTrade ID {}: {} {} @ {} -> {} @ {} | PnL: {:.2} | Timestamp: {}",
                trade.id,
                trade.entry_side.as_str().to_uppercase(),
                trade.quantity,
                trade.entry_price,
                trade.exit_side.as_str().to_uppercase(),
                trade.exit_price,
                trade.realized_pnl,
                format_timestamp(trade.closed_at)
            ));
        }

        if lines.len() == 1 {
            lines.push("\tNone".to_string());
        }
        lines.join("\n")
    }
}

fn format_timestamp(timestamp: Option<DateTime<Utc>>) -> String {
    timestamp
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "N/A".to_string())
}
