//! Read-only tables derived from a strategy: current positions, drift
//! against targets, per-lot gain/loss, and pre/post-trade comparisons.

pub mod actuals;
pub mod comparison;
pub mod drift;
pub mod gain_loss;

pub use actuals::{generate_actuals_report, ActualPosition};
pub use comparison::{
    generate_drift_comparison_report, generate_factor_comparison_report, DriftComparison,
    DriftComparisonRow, DriftComparisonSummary, FactorComparison, FactorComparisonRow,
};
pub use drift::{generate_drift_report, DriftRow, PositionStatus, DRIFT_THRESHOLD};
pub use gain_loss::{generate_gain_loss_report, GainLossRow};
