use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::RebalanceError;
use crate::types::{canonical_identifier, CASH_ID};
use crate::RebalanceResult;

const WEIGHT_DECIMALS: i32 = 6;

/// An asset-class allocation target. Each class lists at most two
/// identifiers: a primary and an optional tax-loss-harvesting replacement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetClassTarget {
    pub asset_class: String,
    pub target_weight: f64,
    pub identifiers: Vec<String>,
}

fn round_weight(w: f64) -> f64 {
    let scale = 10f64.powi(WEIGHT_DECIMALS);
    (w * scale).round() / scale
}

/// Validate and canonicalize the targets table, synthesizing or raising the
/// cash row so the portfolio always carries `max(deminimus, existing cash)`
/// plus the withdrawal fraction, with non-cash rows rescaled to keep the
/// weights summing to 1.
pub fn initialize_targets(
    targets: Vec<AssetClassTarget>,
    withdraw_target: f64,
    deminimus_cash_target: f64,
) -> RebalanceResult<Vec<AssetClassTarget>> {
    let mut targets: Vec<AssetClassTarget> = targets
        .into_iter()
        .map(|t| AssetClassTarget {
            asset_class: canonical_identifier(&t.asset_class),
            target_weight: round_weight(t.target_weight),
            identifiers: t
                .identifiers
                .iter()
                .map(|id| canonical_identifier(id))
                .collect(),
        })
        .collect();

    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for t in &targets {
        if !seen.insert(t.asset_class.clone()) {
            duplicates.push(t.asset_class.clone());
        }
    }
    if !duplicates.is_empty() {
        return Err(RebalanceError::InvalidInput {
            field: "targets.asset_class".into(),
            reason: format!("duplicate asset classes: {}", duplicates.join(", ")),
        });
    }

    let oversized: Vec<&str> = targets
        .iter()
        .filter(|t| t.identifiers.len() > 2)
        .map(|t| t.asset_class.as_str())
        .collect();
    if !oversized.is_empty() {
        return Err(RebalanceError::InvalidInput {
            field: "targets.identifiers".into(),
            reason: format!(
                "asset classes with more than 2 identifiers: {}; only a primary and a \
                 replacement are supported",
                oversized.join(", ")
            ),
        });
    }

    let empty: Vec<&str> = targets
        .iter()
        .filter(|t| t.asset_class != CASH_ID && t.identifiers.is_empty())
        .map(|t| t.asset_class.as_str())
        .collect();
    if !empty.is_empty() {
        return Err(RebalanceError::InvalidInput {
            field: "targets.identifiers".into(),
            reason: format!("empty identifier lists for: {}", empty.join(", ")),
        });
    }

    handle_cash_targets(&mut targets, deminimus_cash_target, withdraw_target)?;

    if targets
        .iter()
        .any(|t| t.target_weight < 0.0 || t.target_weight > 1.0)
    {
        return Err(RebalanceError::InvalidInput {
            field: "targets.target_weight".into(),
            reason: "target weights must be between 0 and 1".into(),
        });
    }

    let total: f64 = targets.iter().map(|t| t.target_weight).sum();
    if (total - 1.0).abs() >= 1e-2 {
        return Err(RebalanceError::InvalidInput {
            field: "targets.target_weight".into(),
            reason: format!("target weights must sum to 1, got {total}"),
        });
    }

    // The cash row always lists the cash identifier.
    for t in &mut targets {
        if t.asset_class == CASH_ID && !t.identifiers.iter().any(|id| id == CASH_ID) {
            t.identifiers = vec![CASH_ID.to_string()];
        }
    }

    Ok(targets)
}

fn handle_cash_targets(
    targets: &mut Vec<AssetClassTarget>,
    deminimus_cash_target: f64,
    withdraw_target: f64,
) -> RebalanceResult<()> {
    let cash_rows: Vec<usize> = targets
        .iter()
        .enumerate()
        .filter(|(_, t)| t.asset_class == CASH_ID)
        .map(|(i, _)| i)
        .collect();
    if cash_rows.len() > 1 {
        return Err(RebalanceError::InvalidInput {
            field: "targets.asset_class".into(),
            reason: "multiple cash targets found; only one cash target is allowed".into(),
        });
    }

    let existing_cash: f64 = cash_rows
        .iter()
        .map(|&i| targets[i].target_weight)
        .sum();
    let non_withdraw_cash = deminimus_cash_target.max(existing_cash);
    let cash_target = (1.0 - withdraw_target) * non_withdraw_cash + withdraw_target;

    if cash_rows.is_empty() {
        let non_cash_total: f64 = targets.iter().map(|t| t.target_weight).sum();
        if cash_target > 0.0 {
            if non_cash_total <= 0.0 {
                return Err(RebalanceError::DivisionByZero {
                    context: "cash target rescale: non-cash target weights sum to zero".into(),
                });
            }
            let scale = (1.0 - cash_target) / non_cash_total;
            for t in targets.iter_mut() {
                t.target_weight = round_weight(t.target_weight * scale);
            }
        }
        targets.push(AssetClassTarget {
            asset_class: CASH_ID.to_string(),
            target_weight: round_weight(cash_target),
            identifiers: vec![CASH_ID.to_string()],
        });
    } else {
        let idx = cash_rows[0];
        let current = targets[idx].target_weight;
        if current < cash_target {
            let scale = (1.0 - cash_target) / (1.0 - current);
            targets[idx].target_weight = round_weight(cash_target);
            for (i, t) in targets.iter_mut().enumerate() {
                if i != idx {
                    t.target_weight = round_weight(t.target_weight * scale);
                }
            }
        }
    }

    Ok(())
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

    fn cash_weight(targets: &[AssetClassTarget]) -> f64 {
        targets
            .iter()
            .find(|t| t.asset_class == CASH_ID)
            .map(|t| t.target_weight)
            .unwrap()
    }

    #[test]
    fn test_cash_row_synthesized() {
        let out = initialize_targets(
            vec![
                target("us_equity", 0.6, &["VTI"]),
                target("bonds", 0.4, &["BND"]),
            ],
            0.0,
            0.02,
        )
        .unwrap();
        assert_eq!(out.len(), 3);
        assert!((cash_weight(&out) - 0.02).abs() < 1e-9);
        let total: f64 = out.iter().map(|t| t.target_weight).sum();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_withdrawal_fraction_raises_cash() {
        let out = initialize_targets(
            vec![target("equity", 1.0, &["VTI"])],
            0.10,
            0.0,
        )
        .unwrap();
        // cash = (1 - 0.10) * 0 + 0.10
        assert!((cash_weight(&out) - 0.10).abs() < 1e-9);
        let eq = out.iter().find(|t| t.asset_class == "EQUITY").unwrap();
        assert!((eq.target_weight - 0.90).abs() < 1e-9);
    }

    #[test]
    fn test_existing_cash_below_target_is_raised() {
        let out = initialize_targets(
            vec![
                target("equity", 0.95, &["VTI"]),
                target("cash", 0.05, &["CASH"]),
            ],
            0.20,
            0.0,
        )
        .unwrap();
        // cash = (1 - 0.2) * 0.05 + 0.2 = 0.24
        assert!((cash_weight(&out) - 0.24).abs() < 1e-9);
        let total: f64 = out.iter().map(|t| t.target_weight).sum();
        assert!((total - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_existing_cash_above_target_is_kept() {
        let out = initialize_targets(
            vec![
                target("equity", 0.8, &["VTI"]),
                target("CASH_AC", 0.2, &["CASH"]),
            ],
            0.0,
            0.01,
        )
        .unwrap();
        assert!((cash_weight(&out) - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_classes_rejected() {
        let err = initialize_targets(
            vec![
                target("equity", 0.5, &["VTI"]),
                target("EQUITY", 0.5, &["VOO"]),
            ],
            0.0,
            0.0,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate asset classes"));
    }

    #[test]
    fn test_three_identifiers_rejected() {
        let err = initialize_targets(
            vec![target("equity", 1.0, &["VTI", "VOO", "SPY"])],
            0.0,
            0.0,
        )
        .unwrap_err();
        assert!(err.to_string().contains("more than 2 identifiers"));
    }

    #[test]
    fn test_mis_summing_weights_rejected() {
        let err = initialize_targets(
            vec![
                target("equity", 0.5, &["VTI"]),
                target("bonds", 0.3, &["BND"]),
            ],
            0.0,
            0.0,
        )
        .unwrap_err();
        assert!(err.to_string().contains("must sum to 1"));
    }

    #[test]
    fn test_identifiers_uppercased() {
        let out = initialize_targets(vec![target("equity", 1.0, &["vti", "voo"])], 0.0, 0.0)
            .unwrap();
        let eq = out.iter().find(|t| t.asset_class == "EQUITY").unwrap();
        assert_eq!(eq.identifiers, vec!["VTI".to_string(), "VOO".to_string()]);
    }
}
