use good_lp::constraint;

use crate::constraints::TradeCheck;
use crate::optimizer::{DecisionVars, ProblemBuilder};
use crate::types::CASH_ID;
use crate::RebalanceResult;

/// Liquidation mode: pin every (non-cash) buy to zero.
pub fn emit(
    pb: &mut ProblemBuilder,
    vars: &DecisionVars,
    exclude_cash: bool,
) -> RebalanceResult<()> {
    for buy in &vars.buys {
        if exclude_cash && buy.identifier == CASH_ID {
            continue;
        }
        pb.constrain(
            format!("no_buy_{}", buy.identifier),
            constraint!(buy.var == 0.0),
        );
    }
    Ok(())
}

/// Per-trade form: buying is disallowed during liquidation.
pub fn check_buy(identifier: &str, exclude_cash: bool) -> TradeCheck {
    if exclude_cash && identifier == CASH_ID {
        return TradeCheck::Allowed;
    }
    TradeCheck::Rejected(format!(
        "buying {identifier} is not allowed during liquidation"
    ))
}
