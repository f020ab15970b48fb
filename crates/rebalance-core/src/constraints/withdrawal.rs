use good_lp::constraint;

use crate::optimizer::{DecisionVars, ProblemBuilder};
use crate::strategy::Strategy;
use crate::RebalanceResult;

/// Withdrawals must clear after trading: post-trade cash minus the
/// withdrawal stays non-negative. Applied on top of the cash floor.
pub fn emit(
    pb: &mut ProblemBuilder,
    vars: &DecisionVars,
    strategy: &Strategy,
    amount: f64,
) -> RebalanceResult<()> {
    if amount <= 0.0 {
        return Ok(());
    }

    let Some(cash_row) = strategy.cash_drift_row() else {
        tracing::warn!("cash row missing from drift report; skipping withdrawal constraint");
        return Ok(());
    };
    let current_cash = cash_row.actual_weight * strategy.total_value();

    let total_buys = vars.non_cash_buy_cost();
    let total_sells = vars.total_sell_proceeds();

    // current_cash + sells - buys - amount >= 0
    pb.constrain(
        "withdrawal_cash_constraint",
        constraint!(total_sells - total_buys >= amount - current_cash),
    );

    Ok(())
}
