use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::initializers::targets::AssetClassTarget;
use crate::reports::actuals::ActualPosition;

/// Absolute drift below which a position counts as on target.
pub const DRIFT_THRESHOLD: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionStatus {
    OnTarget,
    Overweight,
    Underweight,
    NonTargetInstrument,
}

/// Target versus actual weight for one asset class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftRow {
    pub asset_class: String,
    pub target_weight: f64,
    pub actual_weight: f64,
    pub market_value: f64,
    pub drift: f64,
    pub drift_pct: f64,
    pub drift_dollars: f64,
    pub position_status: PositionStatus,
    pub identifiers: Vec<String>,
}

/// Aggregate actuals into asset classes via the targets' identifier lists
/// and full-outer-join with the targets. Holdings outside every target
/// become their own non-target rows; target weights are renormalized to
/// sum to 1.
pub fn generate_drift_report(
    targets: &[AssetClassTarget],
    actuals: &[ActualPosition],
) -> Vec<DriftRow> {
    let mut id_to_class: HashMap<&str, &str> = HashMap::new();
    for target in targets {
        for id in &target.identifiers {
            id_to_class.insert(id.as_str(), target.asset_class.as_str());
        }
    }

    // class -> (market_value, actual_weight)
    let mut class_actuals: BTreeMap<String, (f64, f64)> = BTreeMap::new();
    for position in actuals {
        let class = id_to_class
            .get(position.identifier.as_str())
            .copied()
            .unwrap_or(position.identifier.as_str());
        let entry = class_actuals.entry(class.to_string()).or_insert((0.0, 0.0));
        entry.0 += position.market_value;
        entry.1 += position.actual_weight;
    }

    let mut rows: Vec<DriftRow> = Vec::with_capacity(targets.len() + class_actuals.len());
    for target in targets {
        let (market_value, actual_weight) = class_actuals
            .remove(&target.asset_class)
            .unwrap_or((0.0, 0.0));
        rows.push(DriftRow {
            asset_class: target.asset_class.clone(),
            target_weight: target.target_weight,
            actual_weight,
            market_value,
            drift: 0.0,
            drift_pct: 0.0,
            drift_dollars: 0.0,
            position_status: PositionStatus::OnTarget,
            identifiers: target.identifiers.clone(),
        });
    }
    // Whatever is left is held but targeted nowhere.
    for (class, (market_value, actual_weight)) in class_actuals {
        rows.push(DriftRow {
            asset_class: class.clone(),
            target_weight: 0.0,
            actual_weight,
            market_value,
            drift: 0.0,
            drift_pct: 0.0,
            drift_dollars: 0.0,
            position_status: PositionStatus::NonTargetInstrument,
            identifiers: vec![class],
        });
    }

    let total_target: f64 = rows.iter().map(|r| r.target_weight).sum();
    if total_target > 0.0 {
        for row in &mut rows {
            row.target_weight /= total_target;
        }
    }

    let total_value: f64 = rows.iter().map(|r| r.market_value).sum();
    for row in &mut rows {
        row.drift = row.actual_weight - row.target_weight;
        row.drift_pct = if row.target_weight != 0.0 {
            row.drift / row.target_weight
        } else {
            row.drift
        };
        row.drift_dollars = row.market_value - row.target_weight * total_value;
        row.position_status = if row.target_weight == 0.0 {
            PositionStatus::NonTargetInstrument
        } else if row.drift > DRIFT_THRESHOLD {
            PositionStatus::Overweight
        } else if row.drift < -DRIFT_THRESHOLD {
            PositionStatus::Underweight
        } else {
            PositionStatus::OnTarget
        };
    }

    rows.sort_by(|a, b| b.drift.partial_cmp(&a.drift).unwrap_or(std::cmp::Ordering::Equal));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn target(class: &str, weight: f64, ids: &[&str]) -> AssetClassTarget {
        AssetClassTarget {
            asset_class: class.into(),
            target_weight: weight,
            identifiers: ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn actual(identifier: &str, market_value: f64, weight: f64) -> ActualPosition {
        ActualPosition {
            identifier: identifier.into(),
            market_value,
            actual_weight: weight,
            quantity: 1.0,
        }
    }

    #[test]
    fn test_overweight_and_underweight_statuses() {
        let rows = generate_drift_report(
            &[
                target("EQUITY", 0.6, &["VTI"]),
                target("BONDS", 0.4, &["BND"]),
            ],
            &[actual("VTI", 700.0, 0.7), actual("BND", 300.0, 0.3)],
        );
        let equity = rows.iter().find(|r| r.asset_class == "EQUITY").unwrap();
        let bonds = rows.iter().find(|r| r.asset_class == "BONDS").unwrap();
        assert_eq!(equity.position_status, PositionStatus::Overweight);
        assert_eq!(bonds.position_status, PositionStatus::Underweight);
        assert!((equity.drift - 0.1).abs() < 1e-12);
        assert!((equity.drift_dollars - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_pair_identifiers_aggregate() {
        let rows = generate_drift_report(
            &[target("EQUITY", 1.0, &["VTI", "VOO"])],
            &[actual("VTI", 600.0, 0.6), actual("VOO", 400.0, 0.4)],
        );
        let equity = rows.iter().find(|r| r.asset_class == "EQUITY").unwrap();
        assert!((equity.actual_weight - 1.0).abs() < 1e-12);
        assert_eq!(equity.position_status, PositionStatus::OnTarget);
    }

    #[test]
    fn test_untargeted_holding_becomes_non_target_row() {
        let rows = generate_drift_report(
            &[target("EQUITY", 1.0, &["VTI"])],
            &[actual("VTI", 900.0, 0.9), actual("GME", 100.0, 0.1)],
        );
        let gme = rows.iter().find(|r| r.asset_class == "GME").unwrap();
        assert_eq!(gme.position_status, PositionStatus::NonTargetInstrument);
        assert_eq!(gme.target_weight, 0.0);
        assert!((gme.drift - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_missing_class_has_zero_actuals() {
        let rows = generate_drift_report(
            &[
                target("EQUITY", 0.5, &["VTI"]),
                target("BONDS", 0.5, &["BND"]),
            ],
            &[actual("VTI", 1000.0, 1.0)],
        );
        let bonds = rows.iter().find(|r| r.asset_class == "BONDS").unwrap();
        assert_eq!(bonds.actual_weight, 0.0);
        assert_eq!(bonds.market_value, 0.0);
        assert_eq!(bonds.position_status, PositionStatus::Underweight);
    }

    #[test]
    fn test_target_weights_renormalized() {
        // Weights that only sum to 0.5 get scaled back up to 1.
        let rows = generate_drift_report(
            &[
                target("EQUITY", 0.25, &["VTI"]),
                target("BONDS", 0.25, &["BND"]),
            ],
            &[actual("VTI", 500.0, 0.5), actual("BND", 500.0, 0.5)],
        );
        let total: f64 = rows.iter().map(|r| r.target_weight).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_rows_sorted_by_drift_descending() {
        let rows = generate_drift_report(
            &[
                target("EQUITY", 0.6, &["VTI"]),
                target("BONDS", 0.4, &["BND"]),
            ],
            &[actual("VTI", 700.0, 0.7), actual("BND", 300.0, 0.3)],
        );
        assert!(rows[0].drift >= rows[rows.len() - 1].drift);
    }
}
