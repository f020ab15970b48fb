use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::initializers::factor_model::FactorBundle;
use crate::reports::drift::DriftRow;

/// One asset class before and after trading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftComparisonRow {
    pub asset_class: String,
    pub target_weight: f64,
    pub drift_pre: f64,
    pub drift_post: f64,
    pub drift_delta: f64,
    pub drift_improvement: f64,
    pub absolute_improvement: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftComparisonSummary {
    pub total_drift_improvement: f64,
    pub average_drift_improvement: f64,
    pub max_drift_improvement: f64,
    pub positions_improved: usize,
    pub positions_worsened: usize,
    pub positions_unchanged: usize,
    pub pre_num_overweight: usize,
    pub pre_num_underweight: usize,
    pub post_num_overweight: usize,
    pub post_num_underweight: usize,
    pub pre_drift_magnitude: f64,
    pub post_drift_magnitude: f64,
    pub overall_drift_reduction: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftComparison {
    pub rows: Vec<DriftComparisonRow>,
    pub summary: DriftComparisonSummary,
}

/// Diff two drift reports at the asset-class level.
pub fn generate_drift_comparison_report(
    pre: &[DriftRow],
    post: &[DriftRow],
) -> DriftComparison {
    // Outer join on asset class; a class absent from one side drifts 0 there.
    let mut classes: BTreeMap<&str, (Option<&DriftRow>, Option<&DriftRow>)> = BTreeMap::new();
    for row in pre {
        classes.entry(row.asset_class.as_str()).or_default().0 = Some(row);
    }
    for row in post {
        classes.entry(row.asset_class.as_str()).or_default().1 = Some(row);
    }

    let rows: Vec<DriftComparisonRow> = classes
        .into_iter()
        .map(|(asset_class, (pre_row, post_row))| {
            let drift_pre = pre_row.map(|r| r.drift).unwrap_or(0.0);
            let drift_post = post_row.map(|r| r.drift).unwrap_or(0.0);
            let drift_improvement = drift_pre.abs() - drift_post.abs();
            DriftComparisonRow {
                asset_class: asset_class.to_string(),
                target_weight: pre_row
                    .or(post_row)
                    .map(|r| r.target_weight)
                    .unwrap_or(0.0),
                drift_pre,
                drift_post,
                drift_delta: drift_post - drift_pre,
                drift_improvement,
                absolute_improvement: drift_improvement > 0.0,
            }
        })
        .collect();

    let n = rows.len();
    let total_drift_improvement: f64 = rows.iter().map(|r| r.drift_improvement).sum();
    let pre_drift_magnitude: f64 = rows.iter().map(|r| r.drift_pre.abs()).sum();
    let post_drift_magnitude: f64 = rows.iter().map(|r| r.drift_post.abs()).sum();

    let summary = DriftComparisonSummary {
        total_drift_improvement,
        average_drift_improvement: if n > 0 {
            total_drift_improvement / n as f64
        } else {
            0.0
        },
        max_drift_improvement: rows
            .iter()
            .map(|r| r.drift_improvement)
            .fold(0.0, f64::max),
        positions_improved: rows.iter().filter(|r| r.drift_improvement > 0.0).count(),
        positions_worsened: rows.iter().filter(|r| r.drift_improvement < 0.0).count(),
        positions_unchanged: rows.iter().filter(|r| r.drift_improvement == 0.0).count(),
        pre_num_overweight: rows.iter().filter(|r| r.drift_pre > 0.0).count(),
        pre_num_underweight: rows.iter().filter(|r| r.drift_pre < 0.0).count(),
        post_num_overweight: rows.iter().filter(|r| r.drift_post > 0.0).count(),
        post_num_underweight: rows.iter().filter(|r| r.drift_post < 0.0).count(),
        pre_drift_magnitude,
        post_drift_magnitude,
        overall_drift_reduction: if pre_drift_magnitude > 0.0 {
            1.0 - post_drift_magnitude / pre_drift_magnitude
        } else {
            0.0
        },
    };

    DriftComparison { rows, summary }
}

/// One factor before and after trading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorComparisonRow {
    pub factor: String,
    pub exposure_pre: f64,
    pub exposure_post: f64,
    pub exposure_target: f64,
    pub drift_pre: f64,
    pub drift_post: f64,
    pub drift_delta: f64,
    pub drift_improvement: f64,
    pub absolute_improvement: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorComparison {
    pub rows: Vec<FactorComparisonRow>,
    pub total_improvement: f64,
    pub factors_improved: usize,
    pub factors_worsened: usize,
    pub pre_drift_magnitude: f64,
    pub post_drift_magnitude: f64,
}

/// Diff factor exposures before and after trading against the target
/// exposures. Both bundles share the same model, so factors align.
pub fn generate_factor_comparison_report(
    pre: &FactorBundle,
    post: &FactorBundle,
) -> FactorComparison {
    let rows: Vec<FactorComparisonRow> = pre
        .model
        .factor_names
        .iter()
        .enumerate()
        .map(|(i, factor)| {
            let exposure_pre = pre.actual_exposures.get(i).copied().unwrap_or(0.0);
            let exposure_post = post.actual_exposures.get(i).copied().unwrap_or(0.0);
            let exposure_target = pre.target_exposures.get(i).copied().unwrap_or(0.0);
            let drift_pre = exposure_pre - exposure_target;
            let drift_post = exposure_post - exposure_target;
            let drift_improvement = drift_pre.abs() - drift_post.abs();
            FactorComparisonRow {
                factor: factor.clone(),
                exposure_pre,
                exposure_post,
                exposure_target,
                drift_pre,
                drift_post,
                drift_delta: drift_post - drift_pre,
                drift_improvement,
                absolute_improvement: drift_improvement > 0.0,
            }
        })
        .collect();

    FactorComparison {
        total_improvement: rows.iter().map(|r| r.drift_improvement).sum(),
        factors_improved: rows.iter().filter(|r| r.drift_improvement > 0.0).count(),
        factors_worsened: rows.iter().filter(|r| r.drift_improvement < 0.0).count(),
        pre_drift_magnitude: rows.iter().map(|r| r.drift_pre.abs()).sum(),
        post_drift_magnitude: rows.iter().map(|r| r.drift_post.abs()).sum(),
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::drift::PositionStatus;
    use pretty_assertions::assert_eq;

    fn drift_row(class: &str, target: f64, actual: f64) -> DriftRow {
        DriftRow {
            asset_class: class.into(),
            target_weight: target,
            actual_weight: actual,
            market_value: actual * 1000.0,
            drift: actual - target,
            drift_pct: 0.0,
            drift_dollars: 0.0,
            position_status: PositionStatus::OnTarget,
            identifiers: vec![],
        }
    }

    #[test]
    fn test_improvement_and_reduction() {
        let pre = vec![
            drift_row("EQUITY", 0.6, 0.7),
            drift_row("BONDS", 0.4, 0.3),
        ];
        let post = vec![
            drift_row("EQUITY", 0.6, 0.61),
            drift_row("BONDS", 0.4, 0.39),
        ];
        let cmp = generate_drift_comparison_report(&pre, &post);
        assert_eq!(cmp.summary.positions_improved, 2);
        assert_eq!(cmp.summary.positions_worsened, 0);
        assert!((cmp.summary.pre_drift_magnitude - 0.2).abs() < 1e-9);
        assert!((cmp.summary.post_drift_magnitude - 0.02).abs() < 1e-9);
        assert!((cmp.summary.overall_drift_reduction - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_class_missing_post_treated_as_zero() {
        let pre = vec![drift_row("EQUITY", 0.6, 0.7)];
        let post: Vec<DriftRow> = vec![];
        let cmp = generate_drift_comparison_report(&pre, &post);
        assert_eq!(cmp.rows.len(), 1);
        assert_eq!(cmp.rows[0].drift_post, 0.0);
    }
}
