use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::RebalanceError;
use crate::initializers::targets::AssetClassTarget;
use crate::reports::actuals::ActualPosition;
use crate::types::{canonical_identifier, CASH_ID};
use crate::RebalanceResult;

/// Raw exposures stay linear inside this band; beyond it they are
/// tanh-compressed.
pub const PRESERVE_RANGE: f64 = 0.75;

/// Slope of the tanh compression. Smaller is more gradual.
pub const SCALE_FACTOR: f64 = 0.1;

/// One row of the caller's factor table: an identifier plus one column per
/// factor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFactorRow {
    pub identifier: String,
    #[serde(flatten)]
    pub exposures: BTreeMap<String, f64>,
}

/// Normalized factor exposures stored row-major with an identifier index.
#[derive(Debug, Clone, Serialize)]
pub struct FactorModel {
    pub factor_names: Vec<String>,
    pub identifiers: Vec<String>,
    #[serde(skip)]
    index: HashMap<String, usize>,
    values: Vec<f64>,
}

impl FactorModel {
    fn push_row(&mut self, identifier: String, row: Vec<f64>) {
        debug_assert_eq!(row.len(), self.factor_names.len());
        self.index.insert(identifier.clone(), self.identifiers.len());
        self.identifiers.push(identifier);
        self.values.extend(row);
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.index.contains_key(identifier)
    }

    pub fn row(&self, identifier: &str) -> Option<&[f64]> {
        let n = self.factor_names.len();
        self.index
            .get(identifier)
            .map(|&i| &self.values[i * n..(i + 1) * n])
    }

    pub fn exposure(&self, identifier: &str, factor_index: usize) -> f64 {
        self.row(identifier)
            .and_then(|r| r.get(factor_index).copied())
            .unwrap_or(0.0)
    }
}

/// The factor model together with the target and current portfolio
/// exposures, aligned to `model.factor_names`.
#[derive(Debug, Clone, Serialize)]
pub struct FactorBundle {
    pub model: FactorModel,
    pub target_exposures: Vec<f64>,
    pub actual_exposures: Vec<f64>,
}

impl FactorBundle {
    /// Recompute the current-portfolio exposures against a new actuals
    /// report, keeping the model and targets untouched.
    pub fn with_actuals(&self, actuals: &[ActualPosition]) -> FactorBundle {
        FactorBundle {
            model: self.model.clone(),
            target_exposures: self.target_exposures.clone(),
            actual_exposures: weighted_exposures(&self.model, actuals),
        }
    }
}

fn weighted_exposures(model: &FactorModel, actuals: &[ActualPosition]) -> Vec<f64> {
    let mut out = vec![0.0; model.factor_names.len()];
    for position in actuals {
        if let Some(row) = model.row(&position.identifier) {
            for (acc, v) in out.iter_mut().zip(row) {
                *acc += position.actual_weight * v;
            }
        }
    }
    out
}

/// Compress raw exposures into [-1, 1]. Values are left alone when the table
/// already fits; otherwise everything is scaled so the global maximum lands
/// at the preserve range, and values beyond the linear band are pushed
/// through a sign-symmetric tanh with an offset keeping the map continuous
/// at the band edge.
fn normalize_values(values: &mut [f64]) {
    let global_max = values.iter().fold(0.0f64, |m, v| m.max(v.abs()));
    if global_max <= 1.0 {
        return;
    }
    let scale = PRESERVE_RANGE / global_max;
    let offset = PRESERVE_RANGE - (SCALE_FACTOR * PRESERVE_RANGE).tanh();
    for v in values.iter_mut() {
        let raw = *v;
        let compressed = if raw.abs() <= PRESERVE_RANGE {
            raw * scale
        } else {
            raw.signum() * ((SCALE_FACTOR * raw.abs() * scale).tanh() + offset)
        };
        *v = compressed.clamp(-1.0, 1.0);
    }
}

/// Validate, normalize, and complete the factor model: every target
/// identifier must be present, cash gets a zero row, and identifiers held in
/// the portfolio but absent from the table are filled with the
/// target-weighted average factor vector.
pub fn initialize_factor_model(
    rows: Vec<RawFactorRow>,
    targets: &[AssetClassTarget],
    actuals: &[ActualPosition],
) -> RebalanceResult<FactorBundle> {
    if rows.is_empty() {
        return Err(RebalanceError::InvalidInput {
            field: "factor_model".into(),
            reason: "factor model must have at least one row".into(),
        });
    }

    let factor_names: Vec<String> = rows
        .iter()
        .flat_map(|r| r.exposures.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if factor_names.is_empty() {
        return Err(RebalanceError::InvalidInput {
            field: "factor_model".into(),
            reason: "factor model must have at least one factor column".into(),
        });
    }

    let mut model = FactorModel {
        factor_names: factor_names.clone(),
        identifiers: Vec::new(),
        index: HashMap::new(),
        values: Vec::new(),
    };

    let mut bad_rows = Vec::new();
    for raw in &rows {
        let identifier = canonical_identifier(&raw.identifier);
        let mut row = Vec::with_capacity(factor_names.len());
        for factor in &factor_names {
            match raw.exposures.get(factor) {
                Some(v) if v.is_finite() => row.push(*v),
                Some(_) => bad_rows.push(format!("{identifier}: non-finite value for {factor}")),
                None => bad_rows.push(format!("{identifier}: missing value for {factor}")),
            }
        }
        if bad_rows.is_empty() {
            if model.contains(&identifier) {
                bad_rows.push(format!("{identifier}: duplicate row"));
            } else {
                model.push_row(identifier, row);
            }
        }
    }
    if !bad_rows.is_empty() {
        return Err(RebalanceError::InvalidInput {
            field: "factor_model".into(),
            reason: bad_rows.join("; "),
        });
    }

    normalize_values(&mut model.values);

    if !model.contains(CASH_ID) {
        model.push_row(CASH_ID.to_string(), vec![0.0; factor_names.len()]);
    }

    let target_identifiers: BTreeSet<&String> =
        targets.iter().flat_map(|t| t.identifiers.iter()).collect();
    let missing: Vec<&str> = target_identifiers
        .iter()
        .filter(|id| !model.contains(id))
        .map(|id| id.as_str())
        .collect();
    if !missing.is_empty() {
        return Err(RebalanceError::InvalidInput {
            field: "factor_model".into(),
            reason: format!("missing factor model entries for: {}", missing.join(", ")),
        });
    }

    // Asset-class weight split evenly across that class's identifiers.
    let mut identifier_weights: HashMap<&String, f64> = HashMap::new();
    for target in targets {
        if target.identifiers.is_empty() {
            continue;
        }
        let per_identifier = target.target_weight / target.identifiers.len() as f64;
        for id in &target.identifiers {
            *identifier_weights.entry(id).or_insert(0.0) += per_identifier;
        }
    }

    let mut target_exposures = vec![0.0; factor_names.len()];
    for (id, weight) in &identifier_weights {
        if let Some(row) = model.row(id) {
            for (acc, v) in target_exposures.iter_mut().zip(row) {
                *acc += weight * v;
            }
        }
    }

    let actual_exposures = weighted_exposures(&model, actuals);

    // Held identifiers without factor data take on the target-average
    // profile so sells of them still move the tracked exposures.
    let missing_actuals: Vec<String> = actuals
        .iter()
        .filter(|p| !model.contains(&p.identifier))
        .map(|p| p.identifier.clone())
        .collect();
    if !missing_actuals.is_empty() {
        tracing::debug!(
            count = missing_actuals.len(),
            "filling factor rows for held identifiers with the target-weighted average"
        );
        for identifier in missing_actuals {
            model.push_row(identifier, target_exposures.clone());
        }
    }

    Ok(FactorBundle {
        model,
        target_exposures,
        actual_exposures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(identifier: &str, pairs: &[(&str, f64)]) -> RawFactorRow {
        RawFactorRow {
            identifier: identifier.into(),
            exposures: pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }

    fn target(class: &str, weight: f64, ids: &[&str]) -> AssetClassTarget {
        AssetClassTarget {
            asset_class: class.into(),
            target_weight: weight,
            identifiers: ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn actual(identifier: &str, weight: f64) -> ActualPosition {
        ActualPosition {
            identifier: identifier.into(),
            market_value: weight * 1000.0,
            actual_weight: weight,
            quantity: 1.0,
        }
    }

    #[test]
    fn test_in_range_values_untouched() {
        let bundle = initialize_factor_model(
            vec![row("VTI", &[("value", 0.5), ("momentum", -0.3)])],
            &[target("equity", 1.0, &["VTI"])],
            &[actual("VTI", 1.0)],
        )
        .unwrap();
        assert_eq!(bundle.model.exposure("VTI", 1), 0.5);
        assert_eq!(bundle.model.exposure("VTI", 0), -0.3);
    }

    #[test]
    fn test_large_values_compressed_into_unit_band() {
        let bundle = initialize_factor_model(
            vec![
                row("A", &[("value", 8.0)]),
                row("B", &[("value", -8.0)]),
                row("C", &[("value", 0.5)]),
            ],
            &[target("equity", 1.0, &["A"])],
            &[actual("A", 1.0)],
        )
        .unwrap();
        let a = bundle.model.exposure("A", 0);
        let b = bundle.model.exposure("B", 0);
        let c = bundle.model.exposure("C", 0);
        assert!(a <= 1.0 && a > PRESERVE_RANGE - 1e-9);
        assert!((a + b).abs() < 1e-12, "compression must be sign-symmetric");
        // 0.5 is inside the preserve band, so it only gets the uniform scale.
        assert!((c - 0.5 * (PRESERVE_RANGE / 8.0)).abs() < 1e-12);
    }

    #[test]
    fn test_cash_row_added_with_zero_factors() {
        let bundle = initialize_factor_model(
            vec![row("VTI", &[("value", 0.2)])],
            &[target("equity", 1.0, &["VTI"])],
            &[actual("VTI", 1.0)],
        )
        .unwrap();
        assert_eq!(bundle.model.exposure(CASH_ID, 0), 0.0);
    }

    #[test]
    fn test_missing_target_identifier_rejected() {
        let err = initialize_factor_model(
            vec![row("VTI", &[("value", 0.2)])],
            &[target("equity", 1.0, &["VTI", "VOO"])],
            &[actual("VTI", 1.0)],
        )
        .unwrap_err();
        assert!(err.to_string().contains("VOO"));
    }

    #[test]
    fn test_missing_factor_column_rejected() {
        let err = initialize_factor_model(
            vec![
                row("VTI", &[("value", 0.2), ("momentum", 0.1)]),
                row("BND", &[("value", 0.0)]),
            ],
            &[target("equity", 1.0, &["VTI"])],
            &[actual("VTI", 1.0)],
        )
        .unwrap_err();
        assert!(err.to_string().contains("missing value for momentum"));
    }

    #[test]
    fn test_non_finite_value_rejected() {
        let err = initialize_factor_model(
            vec![row("VTI", &[("value", f64::NAN)])],
            &[target("equity", 1.0, &["VTI"])],
            &[actual("VTI", 1.0)],
        )
        .unwrap_err();
        assert!(err.to_string().contains("non-finite"));
    }

    #[test]
    fn test_target_and_actual_exposures() {
        let bundle = initialize_factor_model(
            vec![
                row("VTI", &[("value", 0.4)]),
                row("BND", &[("value", -0.2)]),
            ],
            &[
                target("equity", 0.5, &["VTI"]),
                target("bonds", 0.5, &["BND"]),
            ],
            &[actual("VTI", 0.8), actual("BND", 0.2)],
        )
        .unwrap();
        assert!((bundle.target_exposures[0] - (0.5 * 0.4 + 0.5 * -0.2)).abs() < 1e-12);
        assert!((bundle.actual_exposures[0] - (0.8 * 0.4 + 0.2 * -0.2)).abs() < 1e-12);
    }

    #[test]
    fn test_held_identifier_filled_with_target_average() {
        let bundle = initialize_factor_model(
            vec![row("VTI", &[("value", 0.4)])],
            &[target("equity", 1.0, &["VTI"])],
            &[actual("VTI", 0.7), actual("XYZ", 0.3)],
        )
        .unwrap();
        assert!(bundle.model.contains("XYZ"));
        assert!((bundle.model.exposure("XYZ", 0) - 0.4).abs() < 1e-12);
    }
}
