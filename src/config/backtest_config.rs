use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Initial cash must be positive and finite, got {0}")]
    InvalidInitialCash(f64),
    #[error("Commission rate must be in [0, 1), got {0}")]
    InvalidCommissionRate(f64),
    #[error("Invalid strategy parameter: {0}")]
    InvalidStrategyParam(String),
}

//ledger settings, fixed for the whole run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub initial_cash: f64,
    pub commission_rate: f64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            initial_cash: 100_000.0,
            commission_rate: 0.001,
        }
    }
}

impl LedgerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.initial_cash.is_finite() && self.initial_cash > 0.0) {
            return Err(ConfigError::InvalidInitialCash(self.initial_cash));
        }
        if !(0.0..1.0).contains(&self.commission_rate) {
            return Err(ConfigError::InvalidCommissionRate(self.commission_rate));
        }
        Ok(())
    }
}

//strategy type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyType {
    SmaCrossover,
    MeanReversion,
    HoldingPeriod,
}

impl StrategyType {
    //parse strategy type from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sma" | "sma_crossover" => Some(StrategyType::SmaCrossover),
            "mean_reversion" | "meanrev" | "mr" => Some(StrategyType::MeanReversion),
            "holding" | "holding_period" => Some(StrategyType::HoldingPeriod),
            _ => None,
        }
    }
}

//sma crossover strategy parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmaParams {
    pub short_window: usize,
    pub long_window: usize,
    pub quantity: f64,
}

impl Default for SmaParams {
    fn default() -> Self {
        SmaParams {
            short_window: 10,
            long_window: 20,
            quantity: 1.0,
        }
    }
}

//mean reversion strategy parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeanReversionParams {
    pub window: usize,
    //fractional deviation from the moving average that triggers an entry
    pub threshold: f64,
    //fractional retreat from the best seen price that stops a trade out
    pub trailing_stop: f64,
    pub quantity: f64,
}

impl Default for MeanReversionParams {
    fn default() -> Self {
        MeanReversionParams {
            window: 20,
            threshold: 0.02,
            trailing_stop: 0.05,
            quantity: 1.0,
        }
    }
}

//holding period strategy parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HoldingParams {
    pub entry_interval: usize,
    pub holding_period: usize,
    pub quantity: f64,
}

impl Default for HoldingParams {
    fn default() -> Self {
        HoldingParams {
            entry_interval: 5,
            holding_period: 10,
            quantity: 100.0,
        }
    }
}

//strategy-specific parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyParams {
    Sma(SmaParams),
    MeanReversion(MeanReversionParams),
    Holding(HoldingParams),
}

impl StrategyParams {
    pub fn strategy_type(&self) -> StrategyType {
        match self {
            StrategyParams::Sma(_) => StrategyType::SmaCrossover,
            StrategyParams::MeanReversion(_) => StrategyType::MeanReversion,
            StrategyParams::Holding(_) => StrategyType::HoldingPeriod,
        }
    }

    pub fn default_for(strategy_type: StrategyType) -> Self {
        match strategy_type {
            StrategyType::SmaCrossover => StrategyParams::Sma(SmaParams::default()),
            StrategyType::MeanReversion => {
                StrategyParams::MeanReversion(MeanReversionParams::default())
            }
            StrategyType::HoldingPeriod => StrategyParams::Holding(HoldingParams::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let quantity = match self {
            StrategyParams::Sma(p) => {
                if p.short_window == 0 || p.short_window >= p.long_window {
                    return Err(ConfigError::InvalidStrategyParam(format!(
                        "short window ({}) must be non-zero and below long window ({})",
                        p.short_window, p.long_window
                    )));
                }
                p.quantity
            }
            StrategyParams::MeanReversion(p) => {
                if p.window == 0 {
                    return Err(ConfigError::InvalidStrategyParam(
                        "window must be non-zero".to_string(),
                    ));
                }
                if p.threshold < 0.0 || !(0.0..1.0).contains(&p.trailing_stop) {
                    return Err(ConfigError::InvalidStrategyParam(format!(
                        "threshold ({}) must be non-negative and trailing stop ({}) in [0, 1)",
                        p.threshold, p.trailing_stop
                    )));
                }
                p.quantity
            }
            StrategyParams::Holding(p) => {
                if p.entry_interval == 0 {
                    return Err(ConfigError::InvalidStrategyParam(
                        "entry interval must be non-zero".to_string(),
                    ));
                }
                p.quantity
            }
        };

        if !(quantity.is_finite() && quantity > 0.0) {
            return Err(ConfigError::InvalidStrategyParam(format!(
                "quantity must be positive, got {}",
                quantity
            )));
        }
        Ok(())
    }
}

//complete backtest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfiguration {
    //data
    pub data_path: PathBuf,

    //account settings
    #[serde(default)]
    pub ledger: LedgerConfig,

    //strategy
    pub strategy: StrategyParams,

    //optional output paths
    #[serde(default)]
    pub output_equity_csv: Option<PathBuf>,
    #[serde(default)]
    pub output_trades_csv: Option<PathBuf>,
}

impl Default for BacktestConfiguration {
    fn default() -> Self {
        BacktestConfiguration {
            data_path: PathBuf::from("data.csv"),
            ledger: LedgerConfig::default(),
            strategy: StrategyParams::Sma(SmaParams::default()),
            output_equity_csv: None,
            output_trades_csv: None,
        }
    }
}

impl BacktestConfiguration {
    //load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: BacktestConfiguration = serde_json::from_str(&contents)?;
        Ok(config)
    }

    //save configuration to a JSON file
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ledger.validate()?;
        self.strategy.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_bounds() {
        assert!(LedgerConfig::default().validate().is_ok());
        let zero_commission = LedgerConfig {
            initial_cash: 1.0,
            commission_rate: 0.0,
        };
        assert!(zero_commission.validate().is_ok());

        let bad_cash = LedgerConfig {
            initial_cash: -5.0,
            commission_rate: 0.0,
        };
        assert_eq!(
            bad_cash.validate(),
            Err(ConfigError::InvalidInitialCash(-5.0))
        );

        let bad_rate = LedgerConfig {
            initial_cash: 10.0,
            commission_rate: 1.0,
        };
        assert_eq!(
            bad_rate.validate(),
            Err(ConfigError::InvalidCommissionRate(1.0))
        );
    }

    #[test]
    fn strategy_type_aliases() {
        assert_eq!(StrategyType::parse("SMA"), Some(StrategyType::SmaCrossover));
        assert_eq!(
            StrategyType::parse("mean_reversion"),
            Some(StrategyType::MeanReversion)
        );
        assert_eq!(StrategyType::parse("holding"), Some(StrategyType::HoldingPeriod));
        assert_eq!(StrategyType::parse("rsi"), None);
    }

    #[test]
    fn sma_windows_must_be_ordered() {
        let params = StrategyParams::Sma(SmaParams {
            short_window: 20,
            long_window: 10,
            quantity: 1.0,
        });
        assert!(params.validate().is_err());
        assert!(StrategyParams::default_for(StrategyType::SmaCrossover)
            .validate()
            .is_ok());
    }

    #[test]
    fn json_file_roundtrip_preserves_strategy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = BacktestConfiguration {
            strategy: StrategyParams::MeanReversion(MeanReversionParams::default()),
            ..BacktestConfiguration::default()
        };
        config.to_json_file(&path).unwrap();

        let loaded = BacktestConfiguration::from_json_file(&path).unwrap();
        assert_eq!(loaded.strategy, config.strategy);
        assert_eq!(loaded.ledger, config.ledger);
    }

    #[test]
    fn ledger_section_defaults_when_missing() {
        let json = r#"{
            "data_path": "prices.csv",
            "strategy": { "type": "holding", "entry_interval": 3, "holding_period": 6, "quantity": 10.0 }
        }"#;
        let config: BacktestConfiguration = serde_json::from_str(json).unwrap();
        assert_eq!(config.ledger, LedgerConfig::default());
        assert_eq!(config.strategy.strategy_type(), StrategyType::HoldingPeriod);
        assert!(config.output_equity_csv.is_none());
    }
}
