use good_lp::{constraint, Expression, Variable};

use crate::optimizer::ProblemBuilder;

/// Deviation knots. Exponentially spaced through 10%, linear beyond.
pub const PENALTY_BREAKPOINTS: [f64; 7] = [0.0, 0.0001, 0.001, 0.005, 0.01, 0.05, 0.10];

/// Penalty at each knot, approximating deviation^1.5.
pub const PENALTY_VALUES: [f64; 7] = [0.0, 0.0000001, 0.00001, 0.0002, 0.001, 0.004, 0.10];

/// Convex-combination encoding of the penalty curve for a non-negative
/// deviation expression. Values past the last knot ride a right-excess
/// variable that extends the curve linearly. Adjacent-only lambda
/// activation is left to the solver, which honors it for convex
/// minimization objectives.
pub fn piecewise_penalty(
    pb: &mut ProblemBuilder,
    x: Expression,
    name: &str,
    normalization: f64,
) -> Expression {
    let n = PENALTY_BREAKPOINTS.len();
    let last_breakpoint = PENALTY_BREAKPOINTS[n - 1];
    let last_value = PENALTY_VALUES[n - 1];

    let lambdas: Vec<Variable> = (0..n)
        .map(|i| pb.bounded(&format!("lambda_{name}_{i}"), 0.0, 1.0))
        .collect();
    let right_excess = pb.continuous(&format!("right_excess_{name}"), 0.0);

    let lambda_sum: Expression = lambdas.iter().map(|&l| Expression::from(l)).sum();
    pb.constrain(format!("sum_lambda_{name}"), constraint!(lambda_sum <= 1.0));

    let x_combo: Expression = PENALTY_BREAKPOINTS
        .iter()
        .zip(&lambdas)
        .map(|(&b, &l)| b * l)
        .sum::<Expression>()
        + last_breakpoint * right_excess;
    pb.constrain(format!("x_conv_{name}"), constraint!(x_combo == x));

    PENALTY_VALUES
        .iter()
        .zip(&lambdas)
        .map(|(&v, &l)| (v * normalization) * l)
        .sum::<Expression>()
        + (last_value * normalization) * right_excess
}

/// Split a signed deviation into positive and negative parts and run each
/// through the penalty curve. Used by both the drift and the factor terms.
pub fn deviation_penalty(
    pb: &mut ProblemBuilder,
    deviation: Expression,
    name: &str,
    normalization: f64,
) -> Expression {
    let pos = pb.continuous(&format!("pos_dev_{name}"), 0.0);
    let neg = pb.continuous(&format!("neg_dev_{name}"), 0.0);
    pb.constrain(
        format!("dev_split_{name}"),
        constraint!(deviation == pos - neg),
    );

    let pos_impact = piecewise_penalty(pb, pos.into(), &format!("pos_{name}"), normalization);
    let neg_impact = piecewise_penalty(pb, neg.into(), &format!("neg_{name}"), normalization);
    pos_impact + neg_impact
}

/// Reference evaluation of the penalty curve, shared with tests.
pub fn penalty_at(x: f64) -> f64 {
    let x = x.abs();
    let n = PENALTY_BREAKPOINTS.len();
    if x >= PENALTY_BREAKPOINTS[n - 1] {
        // Beyond the last knot the curve continues along the knot's ray.
        return PENALTY_VALUES[n - 1] * (x / PENALTY_BREAKPOINTS[n - 1]);
    }
    for i in 1..n {
        if x <= PENALTY_BREAKPOINTS[i] {
            let x0 = PENALTY_BREAKPOINTS[i - 1];
            let x1 = PENALTY_BREAKPOINTS[i];
            let y0 = PENALTY_VALUES[i - 1];
            let y1 = PENALTY_VALUES[i];
            return y0 + (x - x0) / (x1 - x0) * (y1 - y0);
        }
    }
    0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_penalty_curve_is_monotone() {
        let mut prev = -1.0;
        for i in 0..=120 {
            let x = i as f64 * 0.001;
            let y = penalty_at(x);
            assert!(y >= prev, "penalty must be non-decreasing at {x}");
            prev = y;
        }
    }

    #[test]
    fn test_penalty_hits_knots() {
        for (b, v) in PENALTY_BREAKPOINTS.iter().zip(&PENALTY_VALUES) {
            assert!((penalty_at(*b) - v).abs() < 1e-12);
        }
    }

    #[test]
    fn test_penalty_extends_past_last_knot() {
        assert!((penalty_at(0.2) - 0.2).abs() < 1e-12);
        assert!(penalty_at(0.15) > penalty_at(0.10));
    }

    #[test]
    fn test_penalty_is_superlinear_in_the_curved_region() {
        // Doubling the deviation more than doubles the penalty across the
        // exponentially spaced knots.
        assert!(penalty_at(0.01) > 2.0 * penalty_at(0.005));
        assert!(penalty_at(0.10) > 2.0 * penalty_at(0.05));
    }
}
