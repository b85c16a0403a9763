//a bar-by-bar replay backtester built around a single-instrument trade ledger

pub mod config;
pub mod data;
pub mod engine;
pub mod ledger;
pub mod metrics;
pub mod strategy;

//prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{
        BacktestConfiguration, ConfigError, HoldingParams, LedgerConfig, MeanReversionParams,
        SmaParams, StrategyParams, StrategyType,
    };
    pub use crate::data::{load_csv, Bar, PriceColumn, PriceTable};
    pub use crate::engine::{
        run_sweep, sma_grid, BacktestEngine, BacktestResult, EngineError, RunState, SweepOutcome,
    };
    pub use crate::ledger::{
        Broker, ClosedTrade, LedgerError, OpenTrade, OrderSide, PositionSummary, TradeId,
        TradeRecord, TradeStatus,
    };
    pub use crate::metrics::{equity_points, EquityPoint, SummaryMetrics};
    pub use crate::strategy::{
        build_strategy, HoldingPeriodStrategy, MeanReversionStrategy, PriceCursor,
        SmaCrossoverStrategy, Strategy, StrategyContext,
    };
}
