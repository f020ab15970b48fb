use clap::Args;
use serde_json::{json, Value};

use rebalance_core::engine::StrategyRequest;

use crate::input;

#[derive(Args)]
pub struct ReportsArgs {
    /// JSON strategy file; stdin is used when omitted
    #[arg(long)]
    pub input: Option<String>,
}

/// Build a strategy and emit its derived reports without solving.
pub fn run_reports(args: ReportsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request: StrategyRequest = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <strategy.json> or stdin required for reports".into());
    };
    let strategy = request.build_strategy()?;
    Ok(json!({
        "strategy_id": strategy.strategy_id,
        "total_value": strategy.total_value(),
        "cash": strategy.cash,
        "actuals": strategy.actuals,
        "drift": strategy.drift,
        "gain_loss": strategy.gain_loss,
    }))
}
