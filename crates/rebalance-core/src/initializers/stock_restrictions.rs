use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::RebalanceError;
use crate::types::canonical_identifier;
use crate::RebalanceResult;

/// A per-identifier trading restriction. Absence from the table means the
/// identifier is unrestricted; a row present with both flags set carries no
/// restriction at all and is rejected as contradictory input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockRestriction {
    pub identifier: String,
    pub can_buy: bool,
    pub can_sell: bool,
}

pub fn initialize_stock_restrictions(
    restrictions: Vec<StockRestriction>,
) -> RebalanceResult<Vec<StockRestriction>> {
    let mut out: Vec<StockRestriction> = restrictions
        .into_iter()
        .map(|r| StockRestriction {
            identifier: canonical_identifier(&r.identifier),
            ..r
        })
        .collect();
    out.sort_by(|a, b| a.identifier.cmp(&b.identifier));

    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for r in &out {
        if !seen.insert(r.identifier.clone()) {
            duplicates.push(r.identifier.clone());
        }
    }
    if !duplicates.is_empty() {
        return Err(RebalanceError::InvalidInput {
            field: "stock_restrictions.identifier".into(),
            reason: format!("duplicate identifiers: {}", duplicates.join(", ")),
        });
    }

    let contradictory: Vec<&str> = out
        .iter()
        .filter(|r| r.can_buy && r.can_sell)
        .map(|r| r.identifier.as_str())
        .collect();
    if !contradictory.is_empty() {
        return Err(RebalanceError::InvalidInput {
            field: "stock_restrictions".into(),
            reason: format!(
                "restriction rows that permit both buying and selling: {}; at least one \
                 of can_buy or can_sell must be false",
                contradictory.join(", ")
            ),
        });
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_table_means_unrestricted() {
        assert_eq!(initialize_stock_restrictions(vec![]).unwrap().len(), 0);
    }

    #[test]
    fn test_both_flags_true_rejected() {
        let err = initialize_stock_restrictions(vec![StockRestriction {
            identifier: "VTI".into(),
            can_buy: true,
            can_sell: true,
        }])
        .unwrap_err();
        assert!(err.to_string().contains("both buying and selling"));
    }

    #[test]
    fn test_duplicates_rejected() {
        let err = initialize_stock_restrictions(vec![
            StockRestriction {
                identifier: "vti".into(),
                can_buy: false,
                can_sell: true,
            },
            StockRestriction {
                identifier: "VTI".into(),
                can_buy: true,
                can_sell: false,
            },
        ])
        .unwrap_err();
        assert!(err.to_string().contains("duplicate identifiers"));
    }
}
