use crate::engine::BacktestResult;
use crate::ledger::TradeRecord;
use crate::metrics::timeseries::{calculate_returns, max_drawdown};
use prettytable::{Cell, Row, Table};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

//periods per year used to annualize the sharpe ratio
const PERIODS_PER_YEAR: f64 = 252.0;

//summary metrics for a backtest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub initial_equity: f64,
    pub final_equity: f64,
    pub total_return: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub win_rate: f64,
    pub num_closed_trades: usize,
    pub num_winning_trades: usize,
    pub realized_pnl: f64,
}

impl SummaryMetrics {
    //reduces a finished run to headline statistics
    pub fn from_result(result: &BacktestResult) -> Self {
        let equity = &result.equity_curve;

        let initial_equity = equity.first().copied().unwrap_or(result.final_equity);
        let total_return = if equity.len() >= 2 && initial_equity != 0.0 {
            result.final_equity / initial_equity - 1.0
        } else {
            0.0
        };

        let closed: Vec<f64> = result
            .trade_log
            .iter()
            .filter_map(TradeRecord::as_closed)
            .map(|t| t.realized_pnl)
            .collect();
        let num_winning_trades = closed.iter().filter(|&&pnl| pnl > 0.0).count();
        let win_rate = if closed.is_empty() {
            0.0
        } else {
            num_winning_trades as f64 / closed.len() as f64
        };

        SummaryMetrics {
            initial_equity,
            final_equity: result.final_equity,
            total_return,
            max_drawdown: max_drawdown(equity),
            sharpe_ratio: sharpe_ratio(&calculate_returns(equity), 0.0),
            win_rate,
            num_closed_trades: closed.len(),
            num_winning_trades,
            realized_pnl: closed.iter().sum(),
        }
    }

    //prints metrics in a formatted table
    pub fn pretty_print_table(&self) {
        let mut table = Table::new();

        table.add_row(Row::new(vec![Cell::new("Metric"), Cell::new("Value")]));

        let rows = [
            ("Initial Equity", format!("${:.2}", self.initial_equity)),
            ("Final Equity", format!("${:.2}", self.final_equity)),
            ("Total Return", format!("{:.2}%", self.total_return * 100.0)),
            ("Max Drawdown", format!("{:.2}%", self.max_drawdown * 100.0)),
            ("Sharpe Ratio", format!("{:.3}", self.sharpe_ratio)),
            ("Closed Trades", format!("{}", self.num_closed_trades)),
            ("Win Rate", format!("{:.2}%", self.win_rate * 100.0)),
            ("Realized PnL", format!("${:.2}", self.realized_pnl)),
        ];

        for (name, value) in rows.iter() {
            table.add_row(Row::new(vec![Cell::new(name), Cell::new(value)]));
        }

        table.printstd();
    }
}

//annualized sharpe ratio over per-bar returns, population standard deviation
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }

    let excess: Vec<f64> = returns
        .iter()
        .map(|r| r - risk_free_rate / PERIODS_PER_YEAR)
        .collect();

    let std_dev = excess.iter().population_std_dev();
    if std_dev == 0.0 || std_dev.is_nan() {
        return 0.0;
    }

    excess.iter().mean() / std_dev * PERIODS_PER_YEAR.sqrt()
}
