use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::RebalanceError;
use crate::initializers::{
    AssetClassTarget, ClosedLot, Price, RawFactorRow, RawSpread, RawTaxLot, StockRestriction,
    TaxRate,
};
use crate::constraints::WashSaleEntry;
use crate::optimizer::{solve_rebalance, SolveStatus, SolverConfig};
use crate::reports::{
    generate_drift_comparison_report, generate_factor_comparison_report, DriftComparison,
    FactorComparison,
};
use crate::strategy::{Strategy, StrategyInputs, StrategySettings};
use crate::trades::netting::{net_trades_across_strategies, NettedTrade};
use crate::types::{
    with_metadata, ComputationOutput, ObjectiveWeights, OptimizationType, Trade,
};
use crate::RebalanceResult;

fn default_trade_rounding() -> u32 {
    4
}

fn default_true() -> bool {
    true
}

fn default_min_multiplier() -> f64 {
    0.5
}

fn default_max_multiplier() -> f64 {
    2.0
}

/// One strategy inside a rebalance event.
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyRequest {
    pub strategy_id: String,
    pub optimization_type: String,
    pub current_date: NaiveDate,
    #[serde(default)]
    pub withdrawal_amount: f64,
    #[serde(default)]
    pub min_cash: f64,
    #[serde(default)]
    pub min_notional: f64,
    #[serde(default = "default_trade_rounding")]
    pub trade_rounding: u32,
    #[serde(default)]
    pub holding_time_days: i64,
    #[serde(default = "default_true")]
    pub enforce_wash_sale_prevention: bool,
    #[serde(default = "default_min_multiplier")]
    pub range_min_weight_multiplier: f64,
    #[serde(default = "default_max_multiplier")]
    pub range_max_weight_multiplier: f64,
    #[serde(default)]
    pub deminimus_cash_target: f64,
    #[serde(default)]
    pub objective_weights: ObjectiveWeights,
    #[serde(default)]
    pub solver: SolverConfig,

    pub tax_lots: Vec<RawTaxLot>,
    pub targets: Vec<AssetClassTarget>,
    pub prices: Vec<Price>,
    #[serde(default)]
    pub spreads: Vec<RawSpread>,
    #[serde(default)]
    pub stock_restrictions: Vec<StockRestriction>,
    #[serde(default)]
    pub tax_rates: Vec<TaxRate>,
    #[serde(default)]
    pub closed_lots: Vec<ClosedLot>,
    #[serde(default)]
    pub factor_model: Vec<RawFactorRow>,
    #[serde(default)]
    pub wash_sale_restrictions: Vec<WashSaleEntry>,
}

impl StrategyRequest {
    pub fn settings(&self) -> StrategySettings {
        StrategySettings {
            withdrawal_amount: self.withdrawal_amount,
            min_cash: self.min_cash,
            min_notional: self.min_notional,
            trade_rounding: self.trade_rounding,
            holding_time_days: self.holding_time_days,
            enforce_wash_sale_prevention: self.enforce_wash_sale_prevention,
            range_min_weight_multiplier: self.range_min_weight_multiplier,
            range_max_weight_multiplier: self.range_max_weight_multiplier,
            deminimus_cash_target: self.deminimus_cash_target,
            weights: self.objective_weights,
        }
    }

    /// Validate and canonicalize this request into a strategy. Any table
    /// failure aborts the whole event.
    pub fn build_strategy(&self) -> RebalanceResult<Strategy> {
        let optimization_type: OptimizationType = self.optimization_type.parse()?;
        Strategy::new(
            self.strategy_id.clone(),
            optimization_type,
            self.current_date,
            self.settings(),
            StrategyInputs {
                tax_lots: self.tax_lots.clone(),
                targets: self.targets.clone(),
                prices: self.prices.clone(),
                spreads: self.spreads.clone(),
                stock_restrictions: self.stock_restrictions.clone(),
                tax_rates: self.tax_rates.clone(),
                closed_lots: self.closed_lots.clone(),
                factor_model: self.factor_model.clone(),
                wash_sale_restrictions: self.wash_sale_restrictions.clone(),
            },
        )
    }
}

/// A batch of strategies sharing an execution ledger.
#[derive(Debug, Clone, Deserialize)]
pub struct RebalanceEvent {
    pub strategies: Vec<StrategyRequest>,
    /// Quantization applied when netting across strategies.
    #[serde(default = "default_trade_rounding")]
    pub trade_rounding: u32,
}

/// Outcome of one strategy's solve.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyResult {
    pub strategy_id: String,
    pub optimization_type: String,
    pub status: SolveStatus,
    pub objective_value: Option<f64>,
    pub trades: Vec<Trade>,
    pub drift_comparison: DriftComparison,
    pub factor_comparison: Option<FactorComparison>,
    pub warnings: Vec<String>,
}

/// Outcome of a whole event.
#[derive(Debug, Clone, Serialize)]
pub struct EventOutcome {
    pub strategy_results: Vec<StrategyResult>,
    pub netted_trades: Vec<NettedTrade>,
}

/// The single entry point: validate every strategy, solve each one, apply
/// its trades to produce the post-trade comparisons, then net the trade
/// lists across strategies.
pub fn process_event(
    event: RebalanceEvent,
) -> RebalanceResult<ComputationOutput<EventOutcome>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if event.strategies.is_empty() {
        return Err(RebalanceError::InvalidInput {
            field: "strategies".into(),
            reason: "event carries no strategies".into(),
        });
    }

    let strategy_count = event.strategies.len();
    let mut strategy_results = Vec::with_capacity(strategy_count);
    let mut trade_lists: Vec<Vec<Trade>> = Vec::with_capacity(strategy_count);

    for request in &event.strategies {
        let strategy = request.build_strategy()?;
        let outcome = solve_rebalance(&strategy, &request.solver)?;
        warnings.extend(outcome.warnings.iter().cloned());

        let post_trade = strategy.apply_trades(&outcome.trades)?;
        let drift_comparison =
            generate_drift_comparison_report(&strategy.drift, &post_trade.drift);
        let factor_comparison = match (&strategy.factor, &post_trade.factor) {
            (Some(pre), Some(post)) if strategy.optimization_type == OptimizationType::DirectIndex => {
                Some(generate_factor_comparison_report(pre, post))
            }
            _ => None,
        };

        trade_lists.push(outcome.trades.clone());
        strategy_results.push(StrategyResult {
            strategy_id: strategy.strategy_id.clone(),
            optimization_type: strategy.optimization_type.as_str().to_string(),
            status: outcome.status,
            objective_value: outcome.objective_value,
            trades: outcome.trades,
            drift_comparison,
            factor_comparison,
            warnings: outcome.warnings,
        });
    }

    let netted_trades = net_trades_across_strategies(&trade_lists, event.trade_rounding)?;

    let outcome = EventOutcome {
        strategy_results,
        netted_trades,
    };
    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "MILP Portfolio Rebalancing",
        &serde_json::json!({
            "strategies": strategy_count,
            "netting_trade_rounding": event.trade_rounding,
        }),
        warnings,
        elapsed,
        outcome,
    ))
}

/// Convenience wrapper: parse a JSON event value and process it.
pub fn process_event_value(
    event: serde_json::Value,
) -> RebalanceResult<ComputationOutput<EventOutcome>> {
    let event: RebalanceEvent = serde_json::from_value(event)?;
    process_event(event)
}
