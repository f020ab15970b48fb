//! The MILP around one strategy solve: an owned problem builder with
//! name-keyed constraints, decision variables, the piecewise penalty
//! helper, the CBC adapter, and the end-to-end solve pipeline.

pub mod piecewise;
pub mod solver;
pub mod variables;

use good_lp::{constraint, Constraint, ProblemVariables, Variable};

pub use solver::{SolveStatus, SolverConfig};
pub use variables::{BuyVar, DecisionVars, SellVar};

use crate::constraints::ConstraintManager;
use crate::objectives;
use crate::strategy::Strategy;
use crate::trades::extractor::extract_trades;
use crate::trades::rounding::smart_round_trades;
use crate::types::{OptimizationType, Trade};
use crate::RebalanceResult;

/// Replace characters the solver backends dislike in variable and
/// constraint names.
pub fn sanitize_name(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

pub struct NamedConstraint {
    pub name: String,
    pub constraint: Constraint,
}

/// Owned MILP under construction. Constraint and objective contributors
/// receive it by exclusive reference; its lifetime is scoped to one solve.
pub struct ProblemBuilder {
    vars: ProblemVariables,
    constraints: Vec<NamedConstraint>,
    variable_count: usize,
}

impl Default for ProblemBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProblemBuilder {
    pub fn new() -> Self {
        ProblemBuilder {
            vars: ProblemVariables::new(),
            constraints: Vec::new(),
            variable_count: 0,
        }
    }

    pub fn continuous(&mut self, name: &str, min: f64) -> Variable {
        self.variable_count += 1;
        self.vars
            .add(good_lp::variable().min(min).name(sanitize_name(name)))
    }

    pub fn bounded(&mut self, name: &str, min: f64, max: f64) -> Variable {
        self.variable_count += 1;
        self.vars
            .add(good_lp::variable().min(min).max(max).name(sanitize_name(name)))
    }

    pub fn free(&mut self, name: &str) -> Variable {
        self.variable_count += 1;
        self.vars.add(good_lp::variable().name(sanitize_name(name)))
    }

    pub fn binary(&mut self, name: &str) -> Variable {
        self.variable_count += 1;
        self.vars
            .add(good_lp::variable().binary().name(sanitize_name(name)))
    }

    pub fn constrain(&mut self, name: impl Into<String>, constraint: Constraint) {
        self.constraints.push(NamedConstraint {
            name: sanitize_name(&name.into()),
            constraint,
        });
    }

    pub fn variable_count(&self) -> usize {
        self.variable_count
    }

    pub fn constraint_names(&self) -> impl Iterator<Item = &str> {
        self.constraints.iter().map(|c| c.name.as_str())
    }

    pub(crate) fn into_parts(self) -> (ProblemVariables, Vec<NamedConstraint>) {
        (self.vars, self.constraints)
    }
}

/// The HOLD and BUY_ONLY styles pin trade variables before any validator
/// runs.
pub(crate) fn apply_trade_gates(
    pb: &mut ProblemBuilder,
    vars: &DecisionVars,
    optimization_type: OptimizationType,
) {
    match optimization_type {
        OptimizationType::Hold => {
            for buy in &vars.buys {
                pb.constrain(
                    format!("hold_buy_{}", buy.identifier),
                    constraint!(buy.var == 0.0),
                );
            }
            for sell in &vars.sells {
                pb.constrain(
                    format!("hold_sell_{}", sell.tax_lot_id),
                    constraint!(sell.var == 0.0),
                );
            }
        }
        OptimizationType::BuyOnly => {
            for sell in &vars.sells {
                pb.constrain(
                    format!("buy_only_{}", sell.tax_lot_id),
                    constraint!(sell.var == 0.0),
                );
            }
        }
        _ => {}
    }
}

/// Result of one strategy solve: solver status, objective value, and the
/// rounded trade set. Solver degradation produces an empty set plus a
/// warning, never an error.
#[derive(Debug, Clone)]
pub struct RebalanceOutcome {
    pub status: SolveStatus,
    pub objective_value: Option<f64>,
    pub trades: Vec<Trade>,
    pub warnings: Vec<String>,
}

/// Build and solve the full MILP for one strategy: variables, trade gates,
/// validator constraints, weighted objective, CBC, extraction, rounding.
pub fn solve_rebalance(
    strategy: &Strategy,
    config: &SolverConfig,
) -> RebalanceResult<RebalanceOutcome> {
    let mut warnings = Vec::new();
    let mut pb = ProblemBuilder::new();

    let vars = DecisionVars::create(&mut pb, strategy)?;
    apply_trade_gates(&mut pb, &vars, strategy.optimization_type);

    let manager = ConstraintManager::for_rebalance(strategy);
    manager.emit_constraints(&mut pb, &vars, strategy)?;

    let objective = objectives::build_objective(&mut pb, &vars, strategy)?;

    tracing::debug!(
        variables = pb.variable_count(),
        constraints = pb.constraint_names().count(),
        strategy = %strategy.strategy_id,
        "assembled rebalance problem"
    );

    // Seed the no-trade vector; it is feasible whenever nothing forces
    // activity.
    let warm_start = if strategy.settings.withdrawal_amount > 0.0 {
        Vec::new()
    } else {
        vars.zero_seed()
    };

    let outcome = solver::solve(pb, objective, config, warm_start);
    match outcome.solution {
        Some(solution) if outcome.status == SolveStatus::Optimal => {
            let weights = strategy
                .optimization_type
                .adjust_weights(strategy.settings.weights);
            let trades = extract_trades(&vars, &solution, strategy, weights.tax, weights.transaction);
            let trades = smart_round_trades(
                trades,
                strategy.settings.trade_rounding,
                strategy.settings.min_notional,
            );
            Ok(RebalanceOutcome {
                status: outcome.status,
                objective_value: outcome.objective_value,
                trades,
                warnings,
            })
        }
        _ => {
            let message = format!(
                "solver returned {:?} for strategy {}; no trades produced",
                outcome.status, strategy.strategy_id
            );
            tracing::warn!("{message}");
            warnings.push(message);
            Ok(RebalanceOutcome {
                status: outcome.status,
                objective_value: None,
                trades: Vec::new(),
                warnings,
            })
        }
    }
}
