pub mod backtest;
pub mod sweep;

pub use backtest::{BacktestEngine, BacktestResult, EngineError, RunState};
pub use sweep::{run_sweep, sma_grid, SweepError, SweepOutcome};
