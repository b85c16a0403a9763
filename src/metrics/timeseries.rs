use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

//a point in the equity curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
    pub unrealized_pnl: f64,
    pub drawdown: f64,
}

//zips the engine's parallel curves into points with running drawdown
pub fn equity_points(
    timestamps: &[DateTime<Utc>],
    equity_values: &[f64],
    pnl_values: &[f64],
) -> Vec<EquityPoint> {
    let drawdowns = drawdown_series(equity_values);

    timestamps
        .iter()
        .zip(equity_values)
        .zip(pnl_values)
        .zip(drawdowns)
        .map(|(((&timestamp, &equity), &unrealized_pnl), drawdown)| EquityPoint {
            timestamp,
            equity,
            unrealized_pnl,
            drawdown,
        })
        .collect()
}

//fractional distance below the running peak at each point
pub fn drawdown_series(equity_values: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;

    equity_values
        .iter()
        .map(|&equity| {
            peak = peak.max(equity);
            if peak > 0.0 {
                (peak - equity) / peak
            } else {
                0.0
            }
        })
        .collect()
}

//largest drawdown as a positive fraction
pub fn max_drawdown(equity_values: &[f64]) -> f64 {
    drawdown_series(equity_values)
        .into_iter()
        .fold(0.0, f64::max)
}

//calculates simple returns from equity values
pub fn calculate_returns(equity_values: &[f64]) -> Vec<f64> {
    equity_values
        .windows(2)
        .map(|pair| (pair[1] - pair[0]) / pair[0])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drawdown_tracks_running_peak() {
        let dd = drawdown_series(&[100.0, 120.0, 90.0, 130.0]);
        assert_eq!(dd, vec![0.0, 0.0, 0.25, 0.0]);
        assert_eq!(max_drawdown(&[100.0, 120.0, 90.0, 130.0]), 0.25);
        assert_eq!(max_drawdown(&[]), 0.0);
    }

    #[test]
    fn returns_need_two_points() {
        assert!(calculate_returns(&[100.0]).is_empty());
        assert_eq!(calculate_returns(&[100.0, 110.0, 99.0]), vec![0.1, -0.1]);
    }
}
