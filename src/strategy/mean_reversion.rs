use crate::data::PriceColumn;
use crate::ledger::{LedgerError, OrderSide, TradeId};
use crate::strategy::{sma, Strategy, StrategyContext};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

//below this absolute deviation the price counts as back at the mean
const FLAT_BAND: f64 = 0.005;

//mean reversion strategy with per-trade trailing stops
//buys when close drops more than `threshold` below the moving average
//sells when close rises more than `threshold` above it
//flattens once the close is back within FLAT_BAND of the average
#[derive(Debug, Clone)]
pub struct MeanReversionStrategy {
    window: usize,
    threshold: f64,
    trailing_stop: f64,
    quantity: f64,

    //state: best close seen since entry, per open trade
    best_prices: HashMap<TradeId, f64>,
}

impl MeanReversionStrategy {
    pub fn new(window: usize, threshold: f64, trailing_stop: f64, quantity: f64) -> Self {
        MeanReversionStrategy {
            window,
            threshold,
            trailing_stop,
            quantity,
            best_prices: HashMap::new(),
        }
    }

    //closes trades whose close has retreated past the trailing stop
    fn apply_trailing_stops(
        &mut self,
        context: &mut StrategyContext<'_>,
        close: f64,
    ) -> Result<(), LedgerError> {
        let open: Vec<(TradeId, OrderSide)> = context
            .broker()
            .open_trades()
            .map(|t| (t.id, t.side))
            .collect();

        for (id, side) in open {
            let best = self.best_prices.get(&id).copied().unwrap_or(close);

            let (best, stopped) = match side {
                OrderSide::Buy => {
                    let best = best.max(close);
                    (best, close < best * (1.0 - self.trailing_stop))
                }
                OrderSide::Sell => {
                    let best = best.min(close);
                    (best, close > best * (1.0 + self.trailing_stop))
                }
            };

            if stopped {
                context.close_trade(id)?;
                self.best_prices.remove(&id);
            } else {
                self.best_prices.insert(id, best);
            }
        }

        Ok(())
    }

    fn close_side(
        &mut self,
        context: &mut StrategyContext<'_>,
        side: OrderSide,
    ) -> Result<(), LedgerError> {
        for closed in context.close_side(side)? {
            self.best_prices.remove(&closed.id);
        }
        Ok(())
    }
}

impl Strategy for MeanReversionStrategy {
    fn on_start(&mut self) {
        self.best_prices.clear();
    }

    fn on_bar(
        &mut self,
        context: &mut StrategyContext<'_>,
        _timestamp: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        if context.current_index() < self.window {
            return Ok(());
        }

        let close = context.close();
        let mean = match sma(context.get_lookback(PriceColumn::Close, self.window)) {
            Some(m) if m != 0.0 => m,
            _ => return Ok(()),
        };
        let deviation = (close - mean) / mean;

        self.apply_trailing_stops(context, close)?;

        //position after any stops fired
        let net_position = context.broker().net_position();

        if deviation < -self.threshold && net_position <= 0.0 {
            self.close_side(context, OrderSide::Sell)?;
            context.buy(self.quantity)?;
        } else if deviation > self.threshold && net_position >= 0.0 {
            self.close_side(context, OrderSide::Buy)?;
            context.sell(self.quantity)?;
        } else if deviation.abs() < FLAT_BAND {
            context.close_all_trades()?;
            self.best_prices.clear();
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "Mean Reversion"
    }
}
