mod commands;
mod input;
mod logging;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::comparison::{AnalyzeArgs, ModelsArgs};
use commands::historical::{FeesArgs, HistoricalArgs, PerformanceArgs, ReturnsArgs};
use commands::projection::{AggregateArgs, ProjectArgs};

/// Portfolio backtests, fee/tax-aware projections and model comparison
#[derive(Parser)]
#[command(
    name = "pfa",
    version,
    about = "Portfolio performance, projection and fee analysis",
    long_about = "A CLI for analysing investment portfolios with decimal precision. \
                  Computes historical returns net of advisory fees and expense ratios, \
                  projects balances year by year for brokerage, Roth and Traditional IRA \
                  accounts, and compares holdings against reference model portfolios."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log analytics steps to stderr (PFA_LOG / RUST_LOG take precedence)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Weighted portfolio return series from daily prices
    Returns(ReturnsArgs),
    /// Deduct advisory fee and expense ratios from a return series
    Fees(FeesArgs),
    /// Total/annualised return, volatility, risk-adjusted return and drawdown
    Performance(PerformanceArgs),
    /// Backtest holdings over a date window, with and without the advisory fee
    Historical(HistoricalArgs),
    /// Year-by-year projection with cash flows, taxes and fees
    Project(ProjectArgs),
    /// Project several accounts independently and sum their ledgers
    Aggregate(AggregateArgs),
    /// Compare holdings against the nearest (or a named) model portfolio
    Analyze(AnalyzeArgs),
    /// List the model catalog or show one model
    Models(ModelsArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Returns(args) => commands::historical::run_returns(args),
        Commands::Fees(args) => commands::historical::run_fees(args),
        Commands::Performance(args) => commands::historical::run_performance(args),
        Commands::Historical(args) => commands::historical::run_historical(args),
        Commands::Project(args) => commands::projection::run_project(args),
        Commands::Aggregate(args) => commands::projection::run_aggregate(args),
        Commands::Analyze(args) => commands::comparison::run_analyze(args),
        Commands::Models(args) => commands::comparison::run_models(args),
        Commands::Version => {
            println!("pfa {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            tracing::debug!(error = %e, "command failed");
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
