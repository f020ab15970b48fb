use clap::Args;
use serde_json::Value;

use rebalance_core::engine::{process_event, RebalanceEvent};

use crate::input;

#[derive(Args)]
pub struct RebalanceArgs {
    /// JSON event file; stdin is used when omitted
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_rebalance(args: RebalanceArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let event: RebalanceEvent = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <event.json> or stdin required for rebalance".into());
    };
    let result = process_event(event)?;
    Ok(serde_json::to_value(result)?)
}
