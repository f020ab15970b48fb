//! Objective composition: the weighted sum of tax impact, drift penalty,
//! transaction cost, factor tracking error, and cash-deployment pressure,
//! with weights remapped per optimization type.

pub mod cash_deployment;
pub mod drift;
pub mod factor;
pub mod tax;
pub mod transaction;

use good_lp::Expression;

use crate::optimizer::{DecisionVars, ProblemBuilder};
use crate::strategy::Strategy;
use crate::RebalanceResult;

/// Assemble the full minimization objective for one strategy.
pub fn build_objective(
    pb: &mut ProblemBuilder,
    vars: &DecisionVars,
    strategy: &Strategy,
) -> RebalanceResult<Expression> {
    let weights = strategy
        .optimization_type
        .adjust_weights(strategy.settings.weights);
    let total_value = strategy.total_value();

    let mut objective = Expression::default();
    if total_value <= 0.0 {
        return Ok(objective);
    }

    if weights.tax > 0.0 {
        objective += tax::tax_impact(
            pb,
            vars,
            total_value,
            weights.tax,
            strategy.settings.enforce_wash_sale_prevention,
        );
    }
    if weights.drift > 0.0 {
        objective += drift::drift_penalty(pb, vars, strategy, weights.drift);
    }
    if weights.transaction > 0.0 {
        objective += transaction::transaction_costs(vars, strategy, weights.transaction);
    }
    if weights.factor > 0.0 {
        if let Some(bundle) = &strategy.factor {
            objective += factor::factor_impact(pb, vars, bundle, total_value, weights.factor);
        }
    }
    if weights.cash > 0.0 {
        objective += cash_deployment::cash_penalty(pb, vars, strategy, weights.cash);
    }

    Ok(objective)
}
