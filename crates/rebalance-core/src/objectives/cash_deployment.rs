use good_lp::{constraint, Expression};

use crate::optimizer::{DecisionVars, ProblemBuilder};
use crate::strategy::Strategy;

/// Penalize only the cash held above target. Cash below target carries no
/// penalty of its own; the drift and transaction terms decide whether
/// deploying it is worth the trades.
pub fn cash_penalty(
    pb: &mut ProblemBuilder,
    vars: &DecisionVars,
    strategy: &Strategy,
    normalization: f64,
) -> Expression {
    let Some(cash_row) = strategy.cash_drift_row() else {
        tracing::warn!("cash row missing from drift report; skipping cash deployment term");
        return Expression::default();
    };
    let total_value = strategy.total_value();
    if total_value <= 0.0 {
        return Expression::default();
    }

    let cash_target = cash_row.target_weight;
    let current_cash_weight = cash_row.actual_weight;
    let initial_excess = (current_cash_weight - cash_target).max(0.0);

    // new_cash_weight = current + (sells - buys) / total_value
    let mut new_cash_weight = Expression::default() + current_cash_weight;
    for sell in &vars.sells {
        new_cash_weight += (sell.price / total_value) * sell.var;
    }
    for buy in &vars.buys {
        if buy.identifier != crate::types::CASH_ID {
            new_cash_weight -= (buy.price / total_value) * buy.var;
        }
    }

    let excess_cash = pb.continuous("excess_cash", 0.0);
    pb.constrain(
        "cash_excess_constr",
        constraint!(new_cash_weight - excess_cash <= cash_target),
    );

    normalization * excess_cash - normalization * initial_excess
}
