use good_lp::constraint;

use crate::optimizer::{DecisionVars, ProblemBuilder};
use crate::RebalanceResult;

const BIG_M: f64 = 1e6;

/// An identifier never appears on both sides of the trade list: a binary
/// `is_buying` gates the buy variable against the identifier's sell sum.
pub fn emit(pb: &mut ProblemBuilder, vars: &DecisionVars) -> RebalanceResult<()> {
    for buy in &vars.buys {
        if !vars.has_sells_for(&buy.identifier) {
            continue;
        }
        let is_buying = pb.binary(&format!("is_buying_{}", buy.identifier));
        pb.constrain(
            format!("buy_indicator_{}", buy.identifier),
            constraint!(buy.var <= BIG_M * is_buying),
        );
        // sells <= M * (1 - is_buying)
        let sell_sum = vars.sell_quantity_sum(&buy.identifier);
        pb.constrain(
            format!("no_simultaneous_{}", buy.identifier),
            constraint!(sell_sum + BIG_M * is_buying <= BIG_M),
        );
    }
    Ok(())
}
