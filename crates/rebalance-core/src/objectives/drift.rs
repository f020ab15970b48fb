use good_lp::Expression;

use crate::optimizer::piecewise::deviation_penalty;
use crate::optimizer::{DecisionVars, ProblemBuilder};
use crate::strategy::Strategy;
use crate::types::CASH_ID;

/// Piecewise penalty on each non-cash asset class's post-trade deviation
/// from target. Cash pressure lives in the cash-deployment term.
pub fn drift_penalty(
    pb: &mut ProblemBuilder,
    vars: &DecisionVars,
    strategy: &Strategy,
    normalization: f64,
) -> Expression {
    let total_value = strategy.total_value();
    let mut penalty = Expression::default();

    for row in &strategy.drift {
        if row.asset_class == CASH_ID {
            continue;
        }

        let mut new_weight = Expression::default() + row.actual_weight;
        for identifier in &row.identifiers {
            if let Some(buy) = vars.buy(identifier) {
                new_weight += (buy.price / total_value) * buy.var;
            }
            for sell in vars.sells_for(identifier) {
                new_weight -= (sell.price / total_value) * sell.var;
            }
        }

        let deviation = new_weight - row.target_weight;
        penalty += deviation_penalty(
            pb,
            deviation,
            &format!("drift_{}", row.asset_class),
            normalization,
        );
    }

    penalty
}
