use crate::data::PriceColumn;
use crate::ledger::{LedgerError, OrderSide};
use crate::strategy::{sma, Strategy, StrategyContext};
use chrono::{DateTime, Utc};

//sma crossover strategy
//goes long while the short sma is above the long sma
//goes short while the short sma is below the long sma
//flattens the book on the last bar
#[derive(Debug, Clone)]
pub struct SmaCrossoverStrategy {
    short_window: usize,
    long_window: usize,
    quantity: f64,
}

impl SmaCrossoverStrategy {
    pub fn new(short_window: usize, long_window: usize, quantity: f64) -> Self {
        SmaCrossoverStrategy {
            short_window,
            long_window,
            quantity,
        }
    }

    //returns the side the averages currently favour, none when they are equal
    fn signal(&self, short_sma: f64, long_sma: f64) -> Option<OrderSide> {
        if short_sma > long_sma {
            Some(OrderSide::Buy)
        } else if short_sma < long_sma {
            Some(OrderSide::Sell)
        } else {
            None
        }
    }
}

impl Strategy for SmaCrossoverStrategy {
    fn on_bar(
        &mut self,
        context: &mut StrategyContext<'_>,
        _timestamp: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        if context.is_last_bar() {
            context.close_all_trades()?;
            return Ok(());
        }

        //need a full long window behind the current bar
        if context.current_index() < self.long_window {
            return Ok(());
        }

        let short_sma = sma(context.get_lookback(PriceColumn::Close, self.short_window));
        let long_sma = sma(context.get_lookback(PriceColumn::Close, self.long_window));
        let (short_sma, long_sma) = match (short_sma, long_sma) {
            (Some(s), Some(l)) => (s, l),
            _ => return Ok(()),
        };

        let net_position = context.broker().net_position();

        match self.signal(short_sma, long_sma) {
            Some(OrderSide::Buy) if net_position <= 0.0 => {
                //close shorts and open long
                context.close_all_trades()?;
                context.buy(self.quantity)?;
            }
            Some(OrderSide::Sell) if net_position >= 0.0 => {
                //close longs and open short
                context.close_all_trades()?;
                context.sell(self.quantity)?;
            }
            _ => {}
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "SMA Crossover"
    }
}
