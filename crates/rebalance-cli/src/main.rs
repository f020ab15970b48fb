mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use commands::rebalance::RebalanceArgs;
use commands::reports::ReportsArgs;
use commands::withdrawal::MaxWithdrawalArgs;

#[derive(Parser)]
#[command(
    name = "rbl",
    about = "Tax-aware portfolio rebalancing engine",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a batch of strategies and net the resulting trades
    Rebalance(RebalanceArgs),
    /// Compute the maximum cash a strategy can raise
    MaxWithdrawal(MaxWithdrawalArgs),
    /// Print a strategy's derived reports without solving
    Reports(ReportsArgs),
}

#[derive(Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Rebalance(args) => commands::rebalance::run_rebalance(args),
        Commands::MaxWithdrawal(args) => commands::withdrawal::run_max_withdrawal(args),
        Commands::Reports(args) => commands::reports::run_reports(args),
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
