use good_lp::Expression;

use crate::initializers::factor_model::FactorBundle;
use crate::optimizer::piecewise::deviation_penalty;
use crate::optimizer::{DecisionVars, ProblemBuilder};

/// Piecewise penalty on each factor's post-trade exposure deviation from
/// target. Post-trade exposure is the current exposure plus the buy weight
/// changes and minus the sell weight changes, each scaled by the
/// identifier's factor loading.
pub fn factor_impact(
    pb: &mut ProblemBuilder,
    vars: &DecisionVars,
    bundle: &FactorBundle,
    total_value: f64,
    normalization: f64,
) -> Expression {
    let mut impact = Expression::default();

    for (factor_index, factor_name) in bundle.model.factor_names.iter().enumerate() {
        let current = bundle
            .actual_exposures
            .get(factor_index)
            .copied()
            .unwrap_or(0.0);
        let target = bundle
            .target_exposures
            .get(factor_index)
            .copied()
            .unwrap_or(0.0);

        let mut new_exposure = Expression::default() + current;
        for buy in &vars.buys {
            let loading = bundle.model.exposure(&buy.identifier, factor_index);
            if loading != 0.0 {
                new_exposure += (buy.price / total_value * loading) * buy.var;
            }
        }
        for sell in &vars.sells {
            let loading = bundle.model.exposure(&sell.identifier, factor_index);
            if loading != 0.0 {
                new_exposure -= (sell.price / total_value * loading) * sell.var;
            }
        }

        let deviation = new_exposure - target;
        impact += deviation_penalty(
            pb,
            deviation,
            &format!("factor_{factor_name}"),
            normalization,
        );
    }

    impact
}
