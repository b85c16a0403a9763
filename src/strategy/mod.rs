pub mod holding_period;
pub mod mean_reversion;
pub mod sma_crossover;

use crate::config::StrategyParams;
use crate::data::{PriceColumn, PriceTable};
use crate::ledger::{Broker, ClosedTrade, LedgerError, OrderSide, TradeId};
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub use holding_period::HoldingPeriodStrategy;
pub use mean_reversion::MeanReversionStrategy;
pub use sma_crossover::SmaCrossoverStrategy;

//strategy interface that all strategies must implement
pub trait Strategy: Send {
    //called once before the first bar; strategies reset per-run state here
    fn on_start(&mut self) {}

    //called on each bar after its close has been published to the broker
    fn on_bar(
        &mut self,
        context: &mut StrategyContext<'_>,
        timestamp: DateTime<Utc>,
    ) -> Result<(), LedgerError>;

    //returns the strategy name
    fn name(&self) -> &str;
}

//builds the boxed strategy described by a parameter set
pub fn build_strategy(params: &StrategyParams) -> Box<dyn Strategy> {
    match *params {
        StrategyParams::Sma(p) => Box::new(SmaCrossoverStrategy::new(
            p.short_window,
            p.long_window,
            p.quantity,
        )),
        StrategyParams::MeanReversion(p) => Box::new(MeanReversionStrategy::new(
            p.window,
            p.threshold,
            p.trailing_stop,
            p.quantity,
        )),
        StrategyParams::Holding(p) => Box::new(HoldingPeriodStrategy::new(
            p.entry_interval,
            p.holding_period,
            p.quantity,
        )),
    }
}

//read-only position over a price table, moved forward by the engine
#[derive(Debug, Clone)]
pub struct PriceCursor {
    table: Arc<PriceTable>,
    current_index: usize,
}

impl PriceCursor {
    pub fn new(table: Arc<PriceTable>) -> Self {
        PriceCursor {
            table,
            current_index: 0,
        }
    }

    pub fn set_current_index(&mut self, index: usize) {
        self.current_index = index;
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn table(&self) -> &PriceTable {
        &self.table
    }

    //value of a column at the current index, none past the end of the table
    pub fn get_price(&self, column: PriceColumn) -> Option<f64> {
        self.table.value(column, self.current_index)
    }

    //the last `window` values ending at and including the current index
    //
    //clipped at the start of the series and never padded, so early bars
    //simply get fewer values
    pub fn get_lookback(&self, column: PriceColumn, window: usize) -> &[f64] {
        let values = self.table.column(column);
        let end = (self.current_index + 1).min(values.len());
        let start = (self.current_index + 1).saturating_sub(window).min(end);
        &values[start..end]
    }

    pub fn is_last_bar(&self) -> bool {
        self.current_index + 1 == self.table.len()
    }
}

//what a strategy sees during on_bar: market data up to the current bar and the broker
pub struct StrategyContext<'a> {
    cursor: &'a PriceCursor,
    broker: &'a mut Broker,
}

impl<'a> StrategyContext<'a> {
    //the engine only builds a context for an index inside the table
    pub(crate) fn new(cursor: &'a PriceCursor, broker: &'a mut Broker) -> Self {
        StrategyContext { cursor, broker }
    }

    pub fn current_index(&self) -> usize {
        self.cursor.current_index()
    }

    //number of bars seen so far, including the current one
    pub fn bar_count(&self) -> usize {
        self.cursor.current_index() + 1
    }

    pub fn is_last_bar(&self) -> bool {
        self.cursor.is_last_bar()
    }

    pub fn get_price(&self, column: PriceColumn) -> f64 {
        self.cursor.table().column(column)[self.cursor.current_index()]
    }

    pub fn close(&self) -> f64 {
        self.get_price(PriceColumn::Close)
    }

    pub fn get_lookback(&self, column: PriceColumn, window: usize) -> &[f64] {
        self.cursor.get_lookback(column, window)
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.cursor.table().timestamps()[self.cursor.current_index()]
    }

    pub fn broker(&self) -> &Broker {
        &*self.broker
    }

    pub fn broker_mut(&mut self) -> &mut Broker {
        &mut *self.broker
    }

    //market order at this bar's close, stamped with this bar's timestamp
    pub fn buy(&mut self, quantity: f64) -> Result<TradeId, LedgerError> {
        self.execute(quantity, OrderSide::Buy)
    }

    pub fn sell(&mut self, quantity: f64) -> Result<TradeId, LedgerError> {
        self.execute(quantity, OrderSide::Sell)
    }

    fn execute(&mut self, quantity: f64, side: OrderSide) -> Result<TradeId, LedgerError> {
        let (price, timestamp) = (self.close(), self.timestamp());
        self.broker
            .execute_order(quantity, side, Some(price), Some(timestamp))
    }

    pub fn close_trade(&mut self, trade_id: TradeId) -> Result<ClosedTrade, LedgerError> {
        let (price, timestamp) = (self.close(), self.timestamp());
        self.broker
            .close_trade(trade_id, Some(price), Some(timestamp))
    }

    //flattens the book at this bar's close
    pub fn close_all_trades(&mut self) -> Result<Vec<ClosedTrade>, LedgerError> {
        let (price, timestamp) = (self.close(), self.timestamp());
        self.broker.close_all_trades(Some(price), Some(timestamp))
    }

    //closes the open trades entered on the given side
    pub fn close_side(&mut self, side: OrderSide) -> Result<Vec<ClosedTrade>, LedgerError> {
        let ids: Vec<TradeId> = self
            .broker
            .open_trades()
            .filter(|t| t.side == side)
            .map(|t| t.id)
            .collect();

        let mut closed = Vec::with_capacity(ids.len());
        for id in ids {
            closed.push(self.close_trade(id)?);
        }
        Ok(closed)
    }
}

//helper function to calculate simple moving average
pub fn sma(prices: &[f64]) -> Option<f64> {
    if prices.is_empty() {
        return None;
    }
    Some(prices.iter().sum::<f64>() / prices.len() as f64)
}
