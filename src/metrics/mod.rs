pub mod summary;
pub mod timeseries;

pub use summary::{sharpe_ratio, SummaryMetrics};
pub use timeseries::{calculate_returns, drawdown_series, equity_points, max_drawdown, EquityPoint};
