use good_lp::{Expression, Solution};
use serde::Serialize;

use crate::constraints::ConstraintManager;
use crate::optimizer::{solver, DecisionVars, ProblemBuilder, SolveStatus, SolverConfig};
use crate::strategy::Strategy;
use crate::trades::extractor::extract_trades;
use crate::trades::rounding::smart_round_trades;
use crate::types::Trade;
use crate::RebalanceResult;

/// How much cash a portfolio can raise, and the trades that raise it.
#[derive(Debug, Clone, Serialize)]
pub struct MaxWithdrawalOutcome {
    pub amount: f64,
    pub status: SolveStatus,
    pub trades: Vec<Trade>,
    pub warnings: Vec<String>,
}

/// Maximize cash generated by liquidation: the same constraint machinery
/// with buys forbidden and the objective inverted to the negated sale
/// proceeds. Preserving mode keeps the targets and cash floor; otherwise
/// the targets collapse to all-cash and the floor is lifted. Solver
/// failure reports zero with an empty trade set.
pub fn calculate_max_withdrawal(
    strategy: &Strategy,
    preserve_targets: bool,
    config: &SolverConfig,
) -> RebalanceResult<MaxWithdrawalOutcome> {
    let mut warnings = Vec::new();

    if strategy.total_value() <= 0.0 {
        return Ok(MaxWithdrawalOutcome {
            amount: 0.0,
            status: SolveStatus::Optimal,
            trades: Vec::new(),
            warnings,
        });
    }

    let liquidation = strategy.liquidation_clone(preserve_targets)?;
    let min_cash = liquidation.settings.min_cash;

    let mut pb = ProblemBuilder::new();
    let vars = DecisionVars::create(&mut pb, &liquidation)?;

    let manager = ConstraintManager::for_liquidation(&liquidation);
    manager.emit_constraints(&mut pb, &vars, &liquidation)?;

    // Minimizing the negated proceeds maximizes the cash generated.
    let objective: Expression = vars.sells.iter().map(|s| -s.price * s.var).sum();

    let outcome = solver::solve(pb, objective, config, vars.zero_seed());
    let Some(solution) = outcome.solution else {
        let message = format!(
            "max withdrawal solve failed for strategy {} ({:?})",
            liquidation.strategy_id, outcome.status
        );
        tracing::warn!("{message}");
        warnings.push(message);
        return Ok(MaxWithdrawalOutcome {
            amount: 0.0,
            status: outcome.status,
            trades: Vec::new(),
            warnings,
        });
    };

    let cash_generated: f64 = vars
        .sells
        .iter()
        .map(|s| solution.value(s.var) * s.price)
        .sum();
    let amount = (liquidation.cash + cash_generated - min_cash).max(0.0);

    let trades = extract_trades(&vars, &solution, &liquidation, 0.0, 0.0);
    let trades = smart_round_trades(
        trades,
        strategy.settings.trade_rounding,
        strategy.settings.min_notional,
    );

    Ok(MaxWithdrawalOutcome {
        amount,
        status: outcome.status,
        trades,
        warnings,
    })
}
