use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::RebalanceError;
use crate::types::canonical_identifier;
use crate::RebalanceResult;

/// Quantities below this are treated as fully consumed lots.
pub const LOT_EPSILON: f64 = 1e-6;

/// A tax lot as supplied by the caller. Lot ids are optional on input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTaxLot {
    #[serde(default)]
    pub tax_lot_id: Option<String>,
    pub identifier: String,
    pub quantity: f64,
    pub cost_basis: f64,
    #[serde(alias = "date_acquired")]
    pub date: NaiveDate,
}

/// A validated tax lot. Ids are unique across the strategy; cash lots carry
/// the dollar balance as their quantity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxLot {
    pub tax_lot_id: String,
    pub identifier: String,
    pub quantity: f64,
    pub cost_basis: f64,
    pub date: NaiveDate,
}

/// Validate and canonicalize the tax-lot table. Missing lot ids are filled
/// with generated ones derived from the current date and row position.
pub fn initialize_tax_lots(
    lots: Vec<RawTaxLot>,
    current_date: NaiveDate,
) -> RebalanceResult<Vec<TaxLot>> {
    let mut negative_quantities = Vec::new();
    let mut negative_costs = Vec::new();

    for (i, lot) in lots.iter().enumerate() {
        if lot.quantity < 0.0 {
            negative_quantities.push(format!("row {i} ({})", lot.identifier));
        }
        if lot.cost_basis < 0.0 {
            negative_costs.push(format!("row {i} ({})", lot.identifier));
        }
    }
    if !negative_quantities.is_empty() {
        return Err(RebalanceError::InvalidInput {
            field: "tax_lots.quantity".into(),
            reason: format!("negative quantities: {}", negative_quantities.join(", ")),
        });
    }
    if !negative_costs.is_empty() {
        return Err(RebalanceError::InvalidInput {
            field: "tax_lots.cost_basis".into(),
            reason: format!("negative cost basis: {}", negative_costs.join(", ")),
        });
    }

    let stamp = current_date.format("%Y%m%d").to_string();
    let mut out = Vec::with_capacity(lots.len());
    for (i, lot) in lots.into_iter().enumerate() {
        // Degenerate zero-quantity lots carry no position and no basis worth
        // tracking; drop them instead of generating empty sell variables.
        if lot.quantity < LOT_EPSILON {
            tracing::warn!(identifier = %lot.identifier, "dropping empty tax lot");
            continue;
        }
        let tax_lot_id = match lot.tax_lot_id {
            Some(id) if !id.trim().is_empty() => id.trim().to_string(),
            _ => format!("lot_{i}_{stamp}"),
        };
        out.push(TaxLot {
            tax_lot_id,
            identifier: canonical_identifier(&lot.identifier),
            quantity: lot.quantity,
            cost_basis: lot.cost_basis,
            date: lot.date,
        });
    }

    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for lot in &out {
        if !seen.insert(lot.tax_lot_id.as_str()) {
            duplicates.push(lot.tax_lot_id.clone());
        }
    }
    if !duplicates.is_empty() {
        return Err(RebalanceError::InvalidInput {
            field: "tax_lots.tax_lot_id".into(),
            reason: format!("duplicate tax lot ids: {}", duplicates.join(", ")),
        });
    }

    Ok(out)
}
