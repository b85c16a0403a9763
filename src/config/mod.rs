pub mod backtest_config;

pub use backtest_config::{
    BacktestConfiguration, ConfigError, HoldingParams, LedgerConfig, MeanReversionParams,
    SmaParams, StrategyParams, StrategyType,
};
