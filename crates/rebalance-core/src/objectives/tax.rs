use good_lp::{constraint, Expression};

use crate::optimizer::{DecisionVars, ProblemBuilder};

/// Scale applied to negative per-share liabilities (harvestable losses)
/// when wash-sale prevention is on, so the objective pursues losses less
/// aggressively than it avoids gains.
pub const LOSS_HARVEST_DAMPING: f64 = 0.2;

/// Realized tax cost of one (possibly fractional) lot sale, as a fraction
/// of portfolio value.
pub fn get_tax_cost(
    quantity: f64,
    per_share_tax_liability: f64,
    total_value: f64,
    tax_normalization: f64,
) -> f64 {
    if total_value > 0.0 {
        quantity * per_share_tax_liability / total_value * tax_normalization
    } else {
        0.0
    }
}

/// One signed `tax_realized` variable per lot with nonzero per-share
/// liability, pinned to the sold quantity times that liability. Losses are
/// damped or ignored depending on the wash-sale mode.
pub fn tax_impact(
    pb: &mut ProblemBuilder,
    vars: &DecisionVars,
    total_value: f64,
    normalization: f64,
    enforce_wash_sale_prevention: bool,
) -> Expression {
    let mut impact = Expression::default();

    for sell in &vars.sells {
        let mut per_share_tax = sell.per_share_tax_liability;
        if per_share_tax < 0.0 {
            per_share_tax = if enforce_wash_sale_prevention {
                per_share_tax * LOSS_HARVEST_DAMPING
            } else {
                0.0
            };
        }
        if per_share_tax == 0.0 {
            continue;
        }

        let tax_realized = pb.free(&format!("tax_realized_{}", sell.tax_lot_id));
        pb.constrain(
            format!("tax_realized_{}", sell.tax_lot_id),
            constraint!(tax_realized == (per_share_tax / total_value) * sell.var),
        );
        impact += normalization * tax_realized;
    }

    impact
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_tax_cost_scales_by_portfolio() {
        let cost = get_tax_cost(10.0, 5.2, 10_000.0, 1.0);
        assert!((cost - 0.0052).abs() < 1e-12);
    }

    #[test]
    fn test_get_tax_cost_zero_portfolio() {
        assert_eq!(get_tax_cost(10.0, 5.2, 0.0, 1.0), 0.0);
    }
}
