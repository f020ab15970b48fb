use good_lp::{constraint, Expression};

use crate::optimizer::{DecisionVars, ProblemBuilder};
use crate::strategy::Strategy;
use crate::types::CASH_ID;
use crate::RebalanceResult;

/// Keep every held, targeted asset class inside the band
/// [min_multiplier * target, max_multiplier * target]. A class already
/// below the band may not be sold down further; one already above it may
/// not be bought up. A weight exactly at a bound counts as inside.
pub fn emit(
    pb: &mut ProblemBuilder,
    vars: &DecisionVars,
    strategy: &Strategy,
    min_multiplier: f64,
    max_multiplier: f64,
) -> RebalanceResult<()> {
    let total_value = strategy.total_value();
    if total_value <= 0.0 {
        return Ok(());
    }

    for row in &strategy.drift {
        if row.asset_class == CASH_ID {
            continue;
        }
        if row.actual_weight <= 0.0 || row.target_weight <= 0.0 {
            continue;
        }

        let min_weight = min_multiplier * row.target_weight;
        let max_weight = max_multiplier * row.target_weight;

        let mut buy_terms: Vec<Expression> = Vec::new();
        let mut sell_terms: Vec<Expression> = Vec::new();
        for identifier in &row.identifiers {
            if let Some(buy) = vars.buy(identifier) {
                buy_terms.push((buy.price / total_value) * buy.var);
            }
            for sell in vars.sells_for(identifier) {
                sell_terms.push((sell.price / total_value) * sell.var);
            }
        }
        let has_buys = !buy_terms.is_empty();
        let has_sells = !sell_terms.is_empty();
        let buy_change: Expression = buy_terms.into_iter().sum();
        let sell_change: Expression = sell_terms.into_iter().sum();

        if row.actual_weight < min_weight {
            if has_sells {
                pb.constrain(
                    format!("no_sells_below_min_{}", row.asset_class),
                    constraint!(sell_change == 0.0),
                );
            }
        } else if row.actual_weight > max_weight {
            if has_buys {
                pb.constrain(
                    format!("no_buys_above_max_{}", row.asset_class),
                    constraint!(buy_change == 0.0),
                );
            }
        } else if has_buys || has_sells {
            let new_weight = buy_change - sell_change + row.actual_weight;
            pb.constrain(
                format!("min_weight_{}", row.asset_class),
                constraint!(new_weight.clone() >= min_weight),
            );
            pb.constrain(
                format!("max_weight_{}", row.asset_class),
                constraint!(new_weight <= max_weight),
            );
        }
    }

    Ok(())
}
