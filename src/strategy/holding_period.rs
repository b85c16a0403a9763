use crate::ledger::{LedgerError, TradeId};
use crate::strategy::{Strategy, StrategyContext};
use chrono::{DateTime, Utc};

//buys every `entry_interval` bars and closes each trade `holding_period` bars later
#[derive(Debug, Clone)]
pub struct HoldingPeriodStrategy {
    entry_interval: usize,
    holding_period: usize,
    quantity: f64,

    //state: open trades with the bar they were entered on
    entries: Vec<(TradeId, usize)>,
}

impl HoldingPeriodStrategy {
    pub fn new(entry_interval: usize, holding_period: usize, quantity: f64) -> Self {
        HoldingPeriodStrategy {
            entry_interval,
            holding_period,
            quantity,
            entries: Vec::new(),
        }
    }
}

impl Strategy for HoldingPeriodStrategy {
    fn on_start(&mut self) {
        self.entries.clear();
    }

    fn on_bar(
        &mut self,
        context: &mut StrategyContext<'_>,
        _timestamp: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let index = context.current_index();

        if self.entry_interval > 0 && index % self.entry_interval == 0 {
            let id = context.buy(self.quantity)?;
            self.entries.push((id, index));
        }

        let mut kept = Vec::with_capacity(self.entries.len());
        for (id, entered) in std::mem::take(&mut self.entries) {
            if index - entered >= self.holding_period {
                context.close_trade(id)?;
            } else {
                kept.push((id, entered));
            }
        }
        self.entries = kept;

        Ok(())
    }

    fn name(&self) -> &str {
        "Holding Period"
    }
}
