use anyhow::{Context, Result};
use barledger::prelude::*;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use prettytable::{Cell, Row, Table};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "barledger")]
#[command(about = "A bar-by-bar replay backtester with a trade ledger", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    //run a single backtest
    Run(RunArgs),
    //run an sma parameter grid in parallel
    Sweep(SweepArgs),
}

#[derive(Args)]
struct RunArgs {
    //path to csv data file (overrides the config file)
    #[arg(long)]
    data: Option<PathBuf>,

    //json configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    //strategy type (sma, mean_reversion, holding)
    #[arg(long)]
    strategy: Option<String>,

    //initial cash balance
    #[arg(long)]
    initial_cash: Option<f64>,

    //commission as a fraction of notional, per side
    #[arg(long)]
    commission: Option<f64>,

    //sma strategy parameters
    #[arg(long)]
    short: Option<usize>,
    #[arg(long)]
    long: Option<usize>,

    //mean reversion strategy parameters
    #[arg(long)]
    window: Option<usize>,
    #[arg(long)]
    threshold: Option<f64>,
    #[arg(long)]
    trailing_stop: Option<f64>,

    //holding period strategy parameters
    #[arg(long)]
    entry_interval: Option<usize>,
    #[arg(long)]
    holding_period: Option<usize>,

    //quantity per trade
    #[arg(long)]
    qty: Option<f64>,

    //output options
    #[arg(long)]
    output_equity_csv: Option<PathBuf>,
    #[arg(long)]
    output_trades_csv: Option<PathBuf>,

    //write the resolved configuration as json
    #[arg(long)]
    save_config: Option<PathBuf>,

    //print open and closed trades after the run
    #[arg(long)]
    show_trades: bool,
}

#[derive(Args)]
struct SweepArgs {
    //path to csv data file
    #[arg(long)]
    data: PathBuf,

    //short sma windows, comma separated
    #[arg(long, value_delimiter = ',', default_value = "5,10,20")]
    short: Vec<usize>,

    //long sma windows, comma separated
    #[arg(long, value_delimiter = ',', default_value = "20,50,100")]
    long: Vec<usize>,

    #[arg(long, default_value = "100000")]
    initial_cash: f64,

    #[arg(long, default_value = "0.001")]
    commission: f64,

    #[arg(long, default_value = "1")]
    qty: f64,

    //number of rows to print
    #[arg(long, default_value = "10")]
    top: usize,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run_backtest(args),
        Commands::Sweep(args) => run_parameter_sweep(args),
    }
}

//merges the optional config file with command line overrides
fn resolve_configuration(args: &RunArgs) -> Result<BacktestConfiguration> {
    let mut config = match &args.config {
        Some(path) => BacktestConfiguration::from_json_file(path)
            .context(format!("Failed to load config from {:?}", path))?,
        None => BacktestConfiguration::default(),
    };

    if let Some(data) = &args.data {
        config.data_path = data.clone();
    }
    if let Some(cash) = args.initial_cash {
        config.ledger.initial_cash = cash;
    }
    if let Some(commission) = args.commission {
        config.ledger.commission_rate = commission;
    }

    if let Some(name) = &args.strategy {
        let strategy_type = StrategyType::parse(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown strategy: {}", name))?;
        if config.strategy.strategy_type() != strategy_type {
            config.strategy = StrategyParams::default_for(strategy_type);
        }
    }

    match &mut config.strategy {
        StrategyParams::Sma(p) => {
            p.short_window = args.short.unwrap_or(p.short_window);
            p.long_window = args.long.unwrap_or(p.long_window);
            p.quantity = args.qty.unwrap_or(p.quantity);
        }
        StrategyParams::MeanReversion(p) => {
            p.window = args.window.unwrap_or(p.window);
            p.threshold = args.threshold.unwrap_or(p.threshold);
            p.trailing_stop = args.trailing_stop.unwrap_or(p.trailing_stop);
            p.quantity = args.qty.unwrap_or(p.quantity);
        }
        StrategyParams::Holding(p) => {
            p.entry_interval = args.entry_interval.unwrap_or(p.entry_interval);
            p.holding_period = args.holding_period.unwrap_or(p.holding_period);
            p.quantity = args.qty.unwrap_or(p.quantity);
        }
    }

    if args.output_equity_csv.is_some() {
        config.output_equity_csv = args.output_equity_csv.clone();
    }
    if args.output_trades_csv.is_some() {
        config.output_trades_csv = args.output_trades_csv.clone();
    }

    config.validate()?;
    Ok(config)
}

fn run_backtest(args: RunArgs) -> Result<()> {
    println!("barledger Backtesting Engine");
    println!("============================\n");

    let config = resolve_configuration(&args)?;
    if let Some(path) = &args.save_config {
        config
            .to_json_file(path)
            .context(format!("Failed to save config to {:?}", path))?;
        println!("Configuration saved to {:?}", path);
    }

    //load data
    println!("Loading data from {:?}...", config.data_path);
    let bars = load_csv(&config.data_path)
        .context(format!("Failed to load data from {:?}", config.data_path))?;

    if let (Some(first), Some(last)) = (bars.first(), bars.last()) {
        println!("Loaded {} bars", bars.len());
        println!("Date range: {} to {}\n", first.timestamp, last.timestamp);
    } else {
        println!("Data file contains no bars\n");
    }

    let strategy = build_strategy(&config.strategy);
    println!("Strategy: {} ({:?})", strategy.name(), config.strategy);
    println!("Initial cash: ${:.2}", config.ledger.initial_cash);
    println!(
        "Commission: {:.4}% of notional\n",
        config.ledger.commission_rate * 100.0
    );

    let broker = Broker::from_config(&config.ledger)?;
    let mut engine = BacktestEngine::new(strategy, PriceTable::from_bars(&bars), broker);

    //run backtest
    println!("Running backtest...\n");
    engine.run()?;
    let result = engine.results();

    //display results
    println!("Backtest Results");
    println!("================\n");
    SummaryMetrics::from_result(&result).pretty_print_table();

    if args.show_trades {
        println!("\n{}", engine.broker().open_trades_report());
        println!("{}", engine.broker().closed_trades_report());
    }

    //save outputs if requested
    if let Some(equity_path) = &config.output_equity_csv {
        save_equity_csv(&result, equity_path)?;
        println!("\nEquity curve saved to {:?}", equity_path);
    }

    if let Some(trades_path) = &config.output_trades_csv {
        save_trades_csv(&result.trade_log, trades_path)?;
        println!("Trades saved to {:?}", trades_path);
    }

    Ok(())
}

fn run_parameter_sweep(args: SweepArgs) -> Result<()> {
    let bars = load_csv(&args.data).context(format!("Failed to load data from {:?}", args.data))?;
    let table = Arc::new(PriceTable::from_bars(&bars));

    let ledger = LedgerConfig {
        initial_cash: args.initial_cash,
        commission_rate: args.commission,
    };
    ledger.validate()?;

    let grid = sma_grid(&args.short, &args.long, args.qty);
    if grid.is_empty() {
        anyhow::bail!("No valid (short, long) pairs: every short window must be below a long window");
    }
    println!("Sweeping {} SMA parameter sets over {} bars...\n", grid.len(), table.len());

    let outcomes = run_sweep(table, &ledger, grid, |p: &SmaParams| {
        build_strategy(&StrategyParams::Sma(*p))
    });

    let mut rows: Vec<(SmaParams, SummaryMetrics)> = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        match outcome.result {
            Ok(result) => rows.push((outcome.params, SummaryMetrics::from_result(&result))),
            Err(err) => log::warn!(
                "sma {}/{} failed: {}",
                outcome.params.short_window,
                outcome.params.long_window,
                err
            ),
        }
    }
    rows.sort_by(|a, b| b.1.final_equity.total_cmp(&a.1.final_equity));

    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("Short"),
        Cell::new("Long"),
        Cell::new("Final Equity"),
        Cell::new("Return"),
        Cell::new("Max DD"),
        Cell::new("Sharpe"),
        Cell::new("Trades"),
    ]));
    for (params, summary) in rows.iter().take(args.top) {
        table.add_row(Row::new(vec![
            Cell::new(&params.short_window.to_string()),
            Cell::new(&params.long_window.to_string()),
            Cell::new(&format!("${:.2}", summary.final_equity)),
            Cell::new(&format!("{:.2}%", summary.total_return * 100.0)),
            Cell::new(&format!("{:.2}%", summary.max_drawdown * 100.0)),
            Cell::new(&format!("{:.3}", summary.sharpe_ratio)),
            Cell::new(&summary.num_closed_trades.to_string()),
        ]));
    }
    table.printstd();

    Ok(())
}

fn save_equity_csv(result: &BacktestResult, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .context(format!("Failed to create {:?}", path))?;

    let points = equity_points(&result.timestamps, &result.equity_curve, &result.pnl_curve);
    for point in points {
        writer.serialize(point)?;
    }

    writer.flush()?;
    Ok(())
}

//one flat csv row per log record; exit columns are empty for open records
#[derive(Serialize)]
struct TradeRow {
    status: &'static str,
    id: u64,
    entry_side: OrderSide,
    exit_side: Option<OrderSide>,
    quantity: f64,
    entry_price: f64,
    exit_price: Option<f64>,
    opened_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
    realized_pnl: Option<f64>,
}

impl From<&TradeRecord> for TradeRow {
    fn from(record: &TradeRecord) -> Self {
        match record {
            TradeRecord::Open(t) => TradeRow {
                status: "open",
                id: t.id.get(),
                entry_side: t.side,
                exit_side: None,
                quantity: t.quantity,
                entry_price: t.entry_price,
                exit_price: None,
                opened_at: t.opened_at,
                closed_at: None,
                realized_pnl: None,
            },
            TradeRecord::Closed(t) => TradeRow {
                status: "closed",
                id: t.id.get(),
                entry_side: t.entry_side,
                exit_side: Some(t.exit_side),
                quantity: t.quantity,
                entry_price: t.entry_price,
                exit_price: Some(t.exit_price),
                opened_at: t.opened_at,
                closed_at: t.closed_at,
                realized_pnl: Some(t.realized_pnl),
            },
        }
    }
}

fn save_trades_csv(trades: &[TradeRecord], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .context(format!("Failed to create {:?}", path))?;

    for record in trades {
        writer.serialize(TradeRow::from(record))?;
    }

    writer.flush()?;
    Ok(())
}
