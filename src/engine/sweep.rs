use crate::config::{ConfigError, LedgerConfig, SmaParams};
use crate::data::PriceTable;
use crate::engine::backtest::{BacktestEngine, BacktestResult, EngineError};
use crate::ledger::Broker;
use crate::strategy::Strategy;
use rayon::prelude::*;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SweepError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

//one sweep candidate and how its run ended
#[derive(Debug, Clone)]
pub struct SweepOutcome<P> {
    pub params: P,
    pub result: Result<BacktestResult, SweepError>,
}

//runs one independent backtest per candidate in parallel
//
//every run gets its own broker and strategy; only the table is shared.
//outcomes come back in candidate order
pub fn run_sweep<P, F>(
    table: Arc<PriceTable>,
    ledger: &LedgerConfig,
    candidates: Vec<P>,
    build: F,
) -> Vec<SweepOutcome<P>>
where
    P: Send,
    F: Fn(&P) -> Box<dyn Strategy> + Sync,
{
    candidates
        .into_par_iter()
        .map(|params| {
            let result = run_single(Arc::clone(&table), ledger, build(&params));
            SweepOutcome { params, result }
        })
        .collect()
}

fn run_single(
    table: Arc<PriceTable>,
    ledger: &LedgerConfig,
    strategy: Box<dyn Strategy>,
) -> Result<BacktestResult, SweepError> {
    let broker = Broker::from_config(ledger)?;
    let mut engine = BacktestEngine::new(strategy, table, broker);
    engine.run()?;
    Ok(engine.results())
}

//every (short, long) pair with short < long
pub fn sma_grid(short_windows: &[usize], long_windows: &[usize], quantity: f64) -> Vec<SmaParams> {
    let mut grid = Vec::new();
    for &short_window in short_windows {
        for &long_window in long_windows {
            if short_window > 0 && short_window < long_window {
                grid.push(SmaParams {
                    short_window,
                    long_window,
                    quantity,
                });
            }
        }
    }
    grid
}
