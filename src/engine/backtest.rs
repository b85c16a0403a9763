use crate::data::{PriceColumn, PriceTable};
use crate::ledger::{Broker, LedgerError, TradeRecord};
use crate::strategy::{PriceCursor, Strategy, StrategyContext};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    NotStarted,
    Running,
    Completed,
    Aborted,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Engine cannot run again (state: {0:?})")]
    AlreadyRun(RunState),
    #[error("Bar {index} ({timestamp}) failed: {source}")]
    BarFailed {
        index: usize,
        timestamp: DateTime<Utc>,
        #[source]
        source: LedgerError,
    },
}

impl EngineError {
    //the ledger failure that aborted the run, if any
    pub fn ledger_error(&self) -> Option<&LedgerError> {
        match self {
            EngineError::BarFailed { source, .. } => Some(source),
            EngineError::AlreadyRun(_) => None,
        }
    }
}

//result of a backtest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub timestamps: Vec<DateTime<Utc>>,
    pub equity_curve: Vec<f64>,
    //unrealized pnl of the open book at each bar
    pub pnl_curve: Vec<f64>,
    pub final_equity: f64,
    pub trade_log: Vec<TradeRecord>,
    pub start_index: Option<usize>,
    pub end_index: Option<usize>,
}

//bar-by-bar replay driver
pub struct BacktestEngine {
    strategy: Box<dyn Strategy>,
    cursor: PriceCursor,
    broker: Broker,
    state: RunState,

    timestamps: Vec<DateTime<Utc>>,
    equity_curve: Vec<f64>,
    pnl_curve: Vec<f64>,
    start_index: Option<usize>,
    end_index: Option<usize>,
}

impl BacktestEngine {
    //creates a new backtest engine
    pub fn new(
        strategy: Box<dyn Strategy>,
        table: impl Into<Arc<PriceTable>>,
        broker: Broker,
    ) -> Self {
        let cursor = PriceCursor::new(table.into());
        let bars = cursor.table().len();

        BacktestEngine {
            strategy,
            cursor,
            broker,
            state: RunState::NotStarted,
            timestamps: Vec::with_capacity(bars),
            equity_curve: Vec::with_capacity(bars),
            pnl_curve: Vec::with_capacity(bars),
            start_index: None,
            end_index: None,
        }
    }

    //builds the strategy from the table it will trade
    pub fn with_factory<F>(factory: F, table: impl Into<Arc<PriceTable>>, broker: Broker) -> Self
    where
        F: FnOnce(&PriceTable) -> Box<dyn Strategy>,
    {
        let table = table.into();
        let strategy = factory(&table);
        Self::new(strategy, table, broker)
    }

    //replays every bar once, in index order
    pub fn run(&mut self) -> Result<(), EngineError> {
        if self.state != RunState::NotStarted {
            return Err(EngineError::AlreadyRun(self.state));
        }
        self.state = RunState::Running;

        let bars = self.cursor.table().len();
        info!("running {} over {} bars", self.strategy.name(), bars);

        self.strategy.on_start();

        for index in 0..bars {
            if let Err(source) = self.process_bar(index) {
                self.state = RunState::Aborted;
                let timestamp = self.cursor.table().timestamps()[index];
                warn!("run aborted at bar {} ({}): {}", index, timestamp, source);
                return Err(EngineError::BarFailed {
                    index,
                    timestamp,
                    source,
                });
            }
        }

        self.state = RunState::Completed;
        info!(
            "finished {}: final equity {:.2}, {} log records",
            self.strategy.name(),
            self.final_equity(),
            self.broker.get_trade_log().len()
        );

        Ok(())
    }

    //price -> strategy -> sample; a bar's samples are pushed together or not at all
    fn process_bar(&mut self, index: usize) -> Result<(), LedgerError> {
        self.cursor.set_current_index(index);

        let table = self.cursor.table();
        let price = table.column(PriceColumn::Close)[index];
        let timestamp = table.timestamps()[index];

        self.broker.update_price(price);

        let mut context = StrategyContext::new(&self.cursor, &mut self.broker);
        self.strategy.on_bar(&mut context, timestamp)?;

        let equity = self.broker.get_equity()?;
        let unrealized_pnl = self.broker.get_open_position_summary()?.unrealized_pnl;

        if self.start_index.is_none() {
            self.start_index = Some(index);
        }
        self.end_index = Some(index);

        self.timestamps.push(timestamp);
        self.equity_curve.push(equity);
        self.pnl_curve.push(unrealized_pnl);

        Ok(())
    }

    //last sampled equity, or cash when no bar has been sampled
    pub fn final_equity(&self) -> f64 {
        self.equity_curve
            .last()
            .copied()
            .unwrap_or_else(|| self.broker.cash())
    }

    pub fn results(&self) -> BacktestResult {
        BacktestResult {
            timestamps: self.timestamps.clone(),
            equity_curve: self.equity_curve.clone(),
            pnl_curve: self.pnl_curve.clone(),
            final_equity: self.final_equity(),
            trade_log: self.broker.get_trade_log().to_vec(),
            start_index: self.start_index,
            end_index: self.end_index,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    //returns a reference to the broker
    pub fn broker(&self) -> &Broker {
        &self.broker
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{OrderSide, TradeId};
    use chrono::{Duration, TimeZone};
    use std::sync::Mutex;

    fn table(closes: &[f64]) -> PriceTable {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let timestamps = (0..closes.len())
            .map(|i| start + Duration::days(i as i64))
            .collect();
        PriceTable::from_closes(timestamps, closes)
    }

    type Seen = Arc<Mutex<Vec<(usize, Option<f64>, f64)>>>;

    //records what it observed on each bar
    #[derive(Default)]
    struct Observer {
        seen: Seen,
    }

    impl Strategy for Observer {
        fn on_bar(
            &mut self,
            context: &mut StrategyContext<'_>,
            _timestamp: DateTime<Utc>,
        ) -> Result<(), LedgerError> {
            self.seen.lock().unwrap().push((
                context.current_index(),
                context.broker().current_price(),
                context.close(),
            ));
            Ok(())
        }

        fn name(&self) -> &str {
            "observer"
        }
    }

    //closes the same trade twice on the given bar
    struct DoubleClose {
        bar: usize,
        trade: Option<TradeId>,
    }

    impl Strategy for DoubleClose {
        fn on_bar(
            &mut self,
            context: &mut StrategyContext<'_>,
            _timestamp: DateTime<Utc>,
        ) -> Result<(), LedgerError> {
            if context.current_index() == 0 {
                self.trade = Some(context.buy(1.0)?);
            }
            if context.current_index() == self.bar {
                if let Some(id) = self.trade {
                    context.close_trade(id)?;
                    context.close_trade(id)?;
                }
            }
            Ok(())
        }

        fn name(&self) -> &str {
            "double close"
        }
    }

    #[test]
    fn price_is_published_before_the_callback() {
        let seen = Seen::default();
        let observer = Observer {
            seen: Arc::clone(&seen),
        };
        let mut engine = BacktestEngine::new(
            Box::new(observer),
            table(&[5.0, 6.0, 7.0]),
            Broker::new(100.0, 0.0).unwrap(),
        );
        engine.run().unwrap();

        assert_eq!(engine.state(), RunState::Completed);
        assert_eq!(engine.broker().current_price(), Some(7.0));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(0, Some(5.0), 5.0), (1, Some(6.0), 6.0), (2, Some(7.0), 7.0)]
        );
        let results = engine.results();
        assert_eq!(results.start_index, Some(0));
        assert_eq!(results.end_index, Some(2));
        assert_eq!(results.timestamps.len(), 3);
    }

    #[test]
    fn context_exposes_the_published_price() {
        let mut observer = Observer::default();
        let t = Arc::new(table(&[5.0, 6.0]));
        let cursor = PriceCursor::new(Arc::clone(&t));
        let mut broker = Broker::new(100.0, 0.0).unwrap();
        for i in 0..t.len() {
            let mut c = cursor.clone();
            c.set_current_index(i);
            broker.update_price(t.column(PriceColumn::Close)[i]);
            let mut ctx = StrategyContext::new(&c, &mut broker);
            observer.on_bar(&mut ctx, t.timestamps()[i]).unwrap();
        }
        assert_eq!(
            *observer.seen.lock().unwrap(),
            vec![(0, Some(5.0), 5.0), (1, Some(6.0), 6.0)]
        );
    }

    #[test]
    fn empty_table_is_a_noop() {
        let mut engine = BacktestEngine::new(
            Box::new(Observer::default()),
            table(&[]),
            Broker::new(2_500.0, 0.01).unwrap(),
        );
        engine.run().unwrap();

        let results = engine.results();
        assert!(results.timestamps.is_empty());
        assert!(results.equity_curve.is_empty());
        assert!(results.pnl_curve.is_empty());
        assert_eq!(results.final_equity, 2_500.0);
        assert_eq!(results.start_index, None);
        assert_eq!(results.end_index, None);
    }

    #[test]
    fn second_run_is_rejected_without_appending() {
        let mut engine = BacktestEngine::new(
            Box::new(Observer::default()),
            table(&[1.0, 2.0]),
            Broker::new(100.0, 0.0).unwrap(),
        );
        engine.run().unwrap();
        assert_eq!(
            engine.run(),
            Err(EngineError::AlreadyRun(RunState::Completed))
        );
        assert_eq!(engine.results().equity_curve.len(), 2);
    }

    #[test]
    fn strategy_bug_aborts_with_unknown_trade() {
        let mut engine = BacktestEngine::new(
            Box::new(DoubleClose { bar: 2, trade: None }),
            table(&[10.0, 11.0, 12.0, 13.0]),
            Broker::new(100.0, 0.0).unwrap(),
        );

        let err = engine.run().unwrap_err();
        assert!(matches!(
            err,
            EngineError::BarFailed {
                index: 2,
                source: LedgerError::UnknownTrade(TradeId(1)),
                ..
            }
        ));
        assert_eq!(engine.state(), RunState::Aborted);

        //the failing bar left no partial samples behind
        let results = engine.results();
        assert_eq!(results.timestamps.len(), 2);
        assert_eq!(results.equity_curve.len(), 2);
        assert_eq!(results.pnl_curve.len(), 2);
        assert_eq!(results.end_index, Some(1));
        assert!(engine.run().is_err());
    }

    #[test]
    fn factory_receives_the_table() {
        let mut engine = BacktestEngine::with_factory(
            |t: &PriceTable| {
                assert_eq!(t.len(), 3);
                Box::new(Observer::default()) as Box<dyn Strategy>
            },
            table(&[1.0, 2.0, 3.0]),
            Broker::new(100.0, 0.0).unwrap(),
        );
        engine.run().unwrap();
        assert_eq!(engine.strategy_name(), "observer");
    }

    #[test]
    fn on_start_called_once() {
        struct Counting(usize);
        impl Strategy for Counting {
            fn on_start(&mut self) {
                self.0 += 1;
                assert_eq!(self.0, 1);
            }
            fn on_bar(
                &mut self,
                context: &mut StrategyContext<'_>,
                _timestamp: DateTime<Utc>,
            ) -> Result<(), LedgerError> {
                if context.is_last_bar() {
                    context
                        .broker_mut()
                        .execute_order(1.0, OrderSide::Sell, None, None)?;
                }
                Ok(())
            }
            fn name(&self) -> &str {
                "counting"
            }
        }

        let mut engine = BacktestEngine::new(
            Box::new(Counting(0)),
            table(&[4.0, 4.0]),
            Broker::new(100.0, 0.0).unwrap(),
        );
        engine.run().unwrap();
        assert_eq!(engine.results().pnl_curve, vec![0.0, 0.0]);
        assert_eq!(engine.results().final_equity, 100.0);
    }
}
