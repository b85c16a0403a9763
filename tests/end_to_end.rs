use barledger::prelude::*;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;

fn daily_table(closes: &[f64]) -> PriceTable {
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let timestamps = (0..closes.len())
        .map(|i| start + Duration::days(i as i64))
        .collect();
    PriceTable::from_closes(timestamps, closes)
}

//buys on one bar and closes on another
struct RoundTrip {
    entry_bar: usize,
    exit_bar: usize,
    quantity: f64,
    trade: Option<TradeId>,
}

impl Strategy for RoundTrip {
    fn on_start(&mut self) {
        self.trade = None;
    }

    fn on_bar(
        &mut self,
        context: &mut StrategyContext<'_>,
        _timestamp: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        if context.current_index() == self.entry_bar {
            self.trade = Some(context.buy(self.quantity)?);
        }
        if context.current_index() == self.exit_bar {
            if let Some(id) = self.trade.take() {
                context.close_trade(id)?;
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "round trip"
    }
}

#[test]
fn single_round_trip_equity_curve() {
    let cash = 10_000.0;
    let strategy = RoundTrip {
        entry_bar: 1,
        exit_bar: 4,
        quantity: 1.0,
        trade: None,
    };
    let mut engine = BacktestEngine::new(
        Box::new(strategy),
        daily_table(&[100.0, 101.0, 99.0, 105.0, 103.0]),
        Broker::new(cash, 0.0).unwrap(),
    );
    engine.run().unwrap();

    let result = engine.results();
    assert_eq!(
        result.equity_curve,
        vec![cash, cash, cash - 2.0, cash + 4.0, cash + 2.0]
    );
    assert_eq!(result.pnl_curve, vec![0.0, 0.0, -2.0, 4.0, 0.0]);
    assert_eq!(result.final_equity, cash + 2.0);
    assert_eq!(result.timestamps.len(), 5);
    assert_eq!(result.start_index, Some(0));
    assert_eq!(result.end_index, Some(4));

    let closed: Vec<&ClosedTrade> = result
        .trade_log
        .iter()
        .filter_map(TradeRecord::as_closed)
        .collect();
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].entry_price, 101.0);
    assert_eq!(closed[0].exit_price, 103.0);
    assert_eq!(closed[0].realized_pnl, 2.0);
    assert_eq!(closed[0].entry_side, OrderSide::Buy);
    assert_eq!(closed[0].exit_side, OrderSide::Sell);

    //open record first, closed record second, both for trade 1
    assert_eq!(result.trade_log.len(), 2);
    assert_eq!(result.trade_log[0].status(), TradeStatus::Open);
    assert_eq!(result.trade_log[1].status(), TradeStatus::Closed);
    assert_eq!(result.trade_log[0].id(), result.trade_log[1].id());

    assert_eq!(engine.broker().cash(), cash + 2.0);
    assert!(!engine.broker().has_open_trades());
}

#[test]
fn commission_is_charged_on_both_legs() {
    let mut engine = BacktestEngine::new(
        Box::new(RoundTrip {
            entry_bar: 0,
            exit_bar: 1,
            quantity: 10.0,
            trade: None,
        }),
        daily_table(&[100.0, 100.0]),
        Broker::new(5_000.0, 0.01).unwrap(),
    );
    engine.run().unwrap();

    let broker = engine.broker();
    assert!((broker.total_fees() - 20.0).abs() < 1e-9);
    assert!((broker.cash() - 4_980.0).abs() < 1e-9);
    assert!((engine.results().final_equity - 4_980.0).abs() < 1e-9);
}

#[test]
fn empty_table_produces_no_samples() {
    let mut engine = BacktestEngine::new(
        Box::new(SmaCrossoverStrategy::new(2, 4, 1.0)),
        daily_table(&[]),
        Broker::new(1_000.0, 0.0).unwrap(),
    );
    engine.run().unwrap();

    let result = engine.results();
    assert!(result.equity_curve.is_empty());
    assert!(result.trade_log.is_empty());
    assert_eq!(result.final_equity, 1_000.0);
    assert_eq!(engine.state(), RunState::Completed);
}

#[test]
fn sma_crossover_ends_flat() {
    let closes: Vec<f64> = (0..200)
        .map(|i| 100.0 + 15.0 * ((i as f64) / 9.0).sin())
        .collect();
    let mut engine = BacktestEngine::new(
        build_strategy(&StrategyParams::Sma(SmaParams {
            short_window: 5,
            long_window: 20,
            quantity: 2.0,
        })),
        daily_table(&closes),
        Broker::new(50_000.0, 0.0005).unwrap(),
    );
    engine.run().unwrap();

    let broker = engine.broker();
    assert!(!broker.has_open_trades());
    assert!(broker.closed_trades().count() > 0);

    //once flat, cash holds exactly what was realized net of fees
    let expected = broker.initial_cash() + broker.realized_pnl() - broker.total_fees();
    assert!((broker.cash() - expected).abs() < 1e-6);
    assert!((engine.results().final_equity - expected).abs() < 1e-6);
}

#[test]
fn holding_period_closes_after_the_hold() {
    let closes: Vec<f64> = (0..12).map(|i| 50.0 + i as f64).collect();
    let mut engine = BacktestEngine::new(
        Box::new(HoldingPeriodStrategy::new(4, 3, 1.0)),
        daily_table(&closes),
        Broker::new(1_000.0, 0.0).unwrap(),
    );
    engine.run().unwrap();

    //entries on bars 0, 4 and 8, each closed three bars later
    let closed: Vec<ClosedTrade> = engine.broker().closed_trades().cloned().collect();
    assert_eq!(closed.len(), 3);
    for trade in &closed {
        assert_eq!(trade.exit_price - trade.entry_price, 3.0);
        assert_eq!(trade.realized_pnl, 3.0);
    }
    assert!(!engine.broker().has_open_trades());
}

#[test]
fn mean_reversion_runs_from_config() {
    let closes: Vec<f64> = (0..150)
        .map(|i| 100.0 + 8.0 * ((i as f64) / 5.0).sin())
        .collect();
    let params = StrategyParams::MeanReversion(MeanReversionParams {
        window: 10,
        threshold: 0.02,
        trailing_stop: 0.05,
        quantity: 1.0,
    });
    params.validate().unwrap();

    let mut engine = BacktestEngine::new(
        build_strategy(&params),
        daily_table(&closes),
        Broker::from_config(&LedgerConfig::default()).unwrap(),
    );
    engine.run().unwrap();

    let result = engine.results();
    assert_eq!(result.equity_curve.len(), 150);
    assert!(result.trade_log.iter().any(|r| r.status() == TradeStatus::Open));

    //the equity identity holds at the end of the run
    let broker = engine.broker();
    let summary = broker.get_open_position_summary().unwrap();
    assert!(
        (broker.get_equity().unwrap() - (broker.cash() + summary.market_value())).abs() < 1e-9
    );
}

#[test]
fn summary_metrics_from_a_run() {
    let mut engine = BacktestEngine::new(
        Box::new(RoundTrip {
            entry_bar: 1,
            exit_bar: 4,
            quantity: 1.0,
            trade: None,
        }),
        daily_table(&[100.0, 101.0, 99.0, 105.0, 103.0]),
        Broker::new(100.0, 0.0).unwrap(),
    );
    engine.run().unwrap();

    let summary = SummaryMetrics::from_result(&engine.results());
    assert_eq!(summary.initial_equity, 100.0);
    assert_eq!(summary.final_equity, 102.0);
    assert!((summary.total_return - 0.02).abs() < 1e-12);
    assert!((summary.max_drawdown - 0.02).abs() < 1e-12);
    assert_eq!(summary.num_closed_trades, 1);
    assert_eq!(summary.win_rate, 1.0);
    assert_eq!(summary.realized_pnl, 2.0);
}

#[test]
fn sweep_runs_every_candidate() {
    let closes: Vec<f64> = (0..80)
        .map(|i| 20.0 + 3.0 * ((i as f64) / 4.0).cos())
        .collect();
    let table = Arc::new(daily_table(&closes));
    let grid = sma_grid(&[2, 3, 8], &[5, 8], 1.0);
    assert_eq!(grid.len(), 4);

    let outcomes = run_sweep(table, &LedgerConfig::default(), grid, |p: &SmaParams| {
        build_strategy(&StrategyParams::Sma(*p))
    });
    assert_eq!(outcomes.len(), 4);
    for outcome in &outcomes {
        let result = outcome.result.as_ref().unwrap();
        assert_eq!(result.equity_curve.len(), 80);
    }
}
