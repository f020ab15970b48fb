use clap::Args;
use serde_json::Value;

use rebalance_core::engine::StrategyRequest;
use rebalance_core::withdrawal::calculate_max_withdrawal;

use crate::input;

#[derive(Args)]
pub struct MaxWithdrawalArgs {
    /// JSON strategy file; stdin is used when omitted
    #[arg(long)]
    pub input: Option<String>,

    /// Keep the strategy's targets instead of liquidating to all-cash
    #[arg(long)]
    pub preserve_targets: bool,
}

pub fn run_max_withdrawal(args: MaxWithdrawalArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let request: StrategyRequest = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <strategy.json> or stdin required for max-withdrawal".into());
    };
    let strategy = request.build_strategy()?;
    let solver = request.solver;
    let result = calculate_max_withdrawal(&strategy, args.preserve_targets, &solver)?;
    Ok(serde_json::to_value(result)?)
}
