use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::RebalanceError;
use crate::types::canonical_identifier;
use crate::RebalanceResult;

/// A lot that has already been sold. Closed lots feed realized-gain
/// reporting and the wash-sale lookback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosedLot {
    pub identifier: String,
    pub quantity: f64,
    pub cost_basis: f64,
    pub date_acquired: NaiveDate,
    pub date_sold: NaiveDate,
    pub proceeds: f64,
    pub realized_gain: f64,
}

pub fn initialize_closed_lots(closed_lots: Vec<ClosedLot>) -> RebalanceResult<Vec<ClosedLot>> {
    let mut out: Vec<ClosedLot> = closed_lots
        .into_iter()
        .map(|c| ClosedLot {
            identifier: canonical_identifier(&c.identifier),
            ..c
        })
        .collect();
    out.sort_by(|a, b| a.date_sold.cmp(&b.date_sold));

    let mut bad_rows = Vec::new();
    for (i, lot) in out.iter().enumerate() {
        if lot.quantity < 0.0 || lot.cost_basis < 0.0 {
            bad_rows.push(format!("row {i} ({}): negative quantity or cost", lot.identifier));
        }
        if lot.date_acquired > lot.date_sold {
            bad_rows.push(format!(
                "row {i} ({}): acquired after sold",
                lot.identifier
            ));
        }
        if (lot.proceeds - lot.cost_basis - lot.realized_gain).abs() > 1e-6 {
            bad_rows.push(format!(
                "row {i} ({}): realized gain does not equal proceeds minus cost basis",
                lot.identifier
            ));
        }
    }
    if !bad_rows.is_empty() {
        return Err(RebalanceError::InvalidInput {
            field: "closed_lots".into(),
            reason: bad_rows.join("; "),
        });
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closed(identifier: &str, gain: f64) -> ClosedLot {
        ClosedLot {
            identifier: identifier.into(),
            quantity: 10.0,
            cost_basis: 100.0,
            date_acquired: "2023-01-10".parse().unwrap(),
            date_sold: "2024-01-10".parse().unwrap(),
            proceeds: 100.0 + gain,
            realized_gain: gain,
        }
    }

    #[test]
    fn test_valid_lots_pass() {
        let out = initialize_closed_lots(vec![closed("vti", -20.0)]).unwrap();
        assert_eq!(out[0].identifier, "VTI");
    }

    #[test]
    fn test_inconsistent_gain_rejected() {
        let mut lot = closed("VTI", -20.0);
        lot.realized_gain = 5.0;
        let err = initialize_closed_lots(vec![lot]).unwrap_err();
        assert!(err.to_string().contains("realized gain"));
    }

    #[test]
    fn test_date_order_enforced() {
        let mut lot = closed("VTI", 0.0);
        lot.date_acquired = "2025-01-01".parse().unwrap();
        let err = initialize_closed_lots(vec![lot]).unwrap_err();
        assert!(err.to_string().contains("acquired after sold"));
    }
}
