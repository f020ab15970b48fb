use good_lp::solvers::coin_cbc::{coin_cbc, CoinCbcSolution};
use good_lp::{Expression, ResolutionError, SolverModel, Variable, WithInitialSolution};
use serde::{Deserialize, Serialize};

use crate::optimizer::ProblemBuilder;

/// Terminal state of one solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
    Failed,
}

/// CBC invocation parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub time_limit_secs: u32,
    pub gap_rel: f64,
    pub max_nodes: u32,
    pub warm_start: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            time_limit_secs: 60,
            gap_rel: 0.01,
            max_nodes: 10_000,
            warm_start: true,
        }
    }
}

pub struct SolveOutcome {
    pub status: SolveStatus,
    pub objective_value: Option<f64>,
    pub solution: Option<CoinCbcSolution>,
}

/// Hand the assembled problem to CBC. Minimization only; a failed or
/// non-optimal outcome carries no solution.
pub fn solve(
    builder: ProblemBuilder,
    objective: Expression,
    config: &SolverConfig,
    warm_start: Vec<(Variable, f64)>,
) -> SolveOutcome {
    let (vars, constraints) = builder.into_parts();

    let mut model = vars.minimise(objective.clone()).using(coin_cbc);
    model.set_parameter("logLevel", "0");
    model.set_parameter("seconds", &config.time_limit_secs.to_string());
    model.set_parameter("ratioGap", &config.gap_rel.to_string());
    model.set_parameter("maxNodes", &config.max_nodes.to_string());

    for named in constraints {
        model = model.with(named.constraint);
    }
    if config.warm_start && !warm_start.is_empty() {
        model = model.with_initial_solution(warm_start);
    }

    match model.solve() {
        Ok(solution) => {
            let objective_value = objective.eval_with(&solution);
            SolveOutcome {
                status: SolveStatus::Optimal,
                objective_value: Some(objective_value),
                solution: Some(solution),
            }
        }
        Err(ResolutionError::Infeasible) => {
            tracing::warn!("solver reported an infeasible problem");
            SolveOutcome {
                status: SolveStatus::Infeasible,
                objective_value: None,
                solution: None,
            }
        }
        Err(ResolutionError::Unbounded) => {
            tracing::warn!("solver reported an unbounded problem");
            SolveOutcome {
                status: SolveStatus::Unbounded,
                objective_value: None,
                solution: None,
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "solver failed");
            SolveOutcome {
                status: SolveStatus::Failed,
                objective_value: None,
                solution: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use good_lp::constraint;
    use good_lp::Solution;

    #[test]
    fn test_simple_lp_solves() {
        let mut pb = ProblemBuilder::new();
        let x = pb.bounded("x", 0.0, 10.0);
        let y = pb.bounded("y", 0.0, 10.0);
        pb.constrain("budget", constraint!(x + y >= 4.0));

        let objective: Expression = 2.0 * x + 3.0 * y;
        let outcome = solve(pb, objective, &SolverConfig::default(), vec![]);
        assert_eq!(outcome.status, SolveStatus::Optimal);
        let solution = outcome.solution.unwrap();
        assert!((solution.value(x) - 4.0).abs() < 1e-6);
        assert!(solution.value(y).abs() < 1e-6);
        assert!((outcome.objective_value.unwrap() - 8.0).abs() < 1e-6);
    }

    #[test]
    fn test_binary_indicator_solves() {
        // x can only be positive when the indicator is on, and the
        // indicator costs 5.
        let mut pb = ProblemBuilder::new();
        let x = pb.bounded("x", 0.0, 10.0);
        let on = pb.binary("on");
        pb.constrain("big_m", constraint!(x <= 10.0 * on));
        pb.constrain("demand", constraint!(x >= 2.0));

        let objective: Expression = 1.0 * x + 5.0 * on;
        let outcome = solve(pb, objective, &SolverConfig::default(), vec![]);
        assert_eq!(outcome.status, SolveStatus::Optimal);
        let solution = outcome.solution.unwrap();
        assert!((solution.value(on) - 1.0).abs() < 1e-6);
        assert!((solution.value(x) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_infeasible_reported() {
        let mut pb = ProblemBuilder::new();
        let x = pb.bounded("x", 0.0, 1.0);
        pb.constrain("impossible", constraint!(x >= 2.0));
        let outcome = solve(pb, 1.0 * x, &SolverConfig::default(), vec![]);
        assert_eq!(outcome.status, SolveStatus::Infeasible);
        assert!(outcome.solution.is_none());
    }
}
