use good_lp::constraint;

use crate::optimizer::{DecisionVars, ProblemBuilder};
use crate::strategy::Strategy;
use crate::types::CASH_ID;
use crate::RebalanceResult;

/// Cash feasibility: cash is never bought, buys are funded by cash plus
/// sale proceeds, and the post-trade cash position stays above the floor.
pub fn emit(
    pb: &mut ProblemBuilder,
    vars: &DecisionVars,
    strategy: &Strategy,
    min_cash: f64,
) -> RebalanceResult<()> {
    if let Some(cash_buy) = vars.buy(CASH_ID) {
        pb.constrain("no_cash_buy", constraint!(cash_buy.var == 0.0));
    }

    let total_buy_cost = vars.total_buy_cost();
    let total_sell_proceeds = vars.total_sell_proceeds();

    pb.constrain(
        "cash_balance",
        constraint!(total_buy_cost.clone() - total_sell_proceeds.clone() <= strategy.cash),
    );
    pb.constrain(
        "min_cash_floor",
        constraint!(total_sell_proceeds - total_buy_cost >= min_cash - strategy.cash),
    );

    Ok(())
}
