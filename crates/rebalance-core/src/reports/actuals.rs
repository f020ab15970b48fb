use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::initializers::prices::PriceTable;
use crate::initializers::tax_lots::TaxLot;
use crate::types::CASH_ID;
use crate::RebalanceResult;

/// Current market value and weight of one identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActualPosition {
    pub identifier: String,
    pub market_value: f64,
    pub actual_weight: f64,
    pub quantity: f64,
}

/// Aggregate tax lots by identifier at current prices and append the cash
/// position. Weights are fractions of total portfolio value.
pub fn generate_actuals_report(
    tax_lots: &[TaxLot],
    prices: &PriceTable,
    cash: f64,
) -> RebalanceResult<Vec<ActualPosition>> {
    if tax_lots.is_empty() && cash == 0.0 {
        return Ok(Vec::new());
    }

    let mut grouped: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    for lot in tax_lots {
        let price = prices.require(&lot.identifier)?;
        let entry = grouped.entry(lot.identifier.as_str()).or_insert((0.0, 0.0));
        entry.0 += lot.quantity * price;
        entry.1 += lot.quantity;
    }

    let mut actuals: Vec<ActualPosition> = grouped
        .into_iter()
        .map(|(identifier, (market_value, quantity))| ActualPosition {
            identifier: identifier.to_string(),
            market_value,
            actual_weight: 0.0,
            quantity,
        })
        .collect();

    actuals.push(ActualPosition {
        identifier: CASH_ID.to_string(),
        market_value: cash,
        actual_weight: 0.0,
        quantity: 1.0,
    });

    let total: f64 = actuals.iter().map(|p| p.market_value).sum();
    if total > 0.0 {
        for p in &mut actuals {
            p.actual_weight = p.market_value / total;
        }
    }

    Ok(actuals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::initializers::prices::{initialize_prices, Price};
    use pretty_assertions::assert_eq;

    fn lot(id: &str, identifier: &str, quantity: f64) -> TaxLot {
        TaxLot {
            tax_lot_id: id.into(),
            identifier: identifier.into(),
            quantity,
            cost_basis: quantity * 90.0,
            date: "2023-06-01".parse().unwrap(),
        }
    }

    fn prices() -> PriceTable {
        initialize_prices(
            vec![Price {
                identifier: "VTI".into(),
                price: 100.0,
            }],
            &["VTI".to_string()].into_iter().collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_lots_aggregate_by_identifier() {
        let report = generate_actuals_report(
            &[lot("l1", "VTI", 5.0), lot("l2", "VTI", 3.0)],
            &prices(),
            200.0,
        )
        .unwrap();
        let vti = report.iter().find(|p| p.identifier == "VTI").unwrap();
        assert_eq!(vti.market_value, 800.0);
        assert_eq!(vti.quantity, 8.0);
    }

    #[test]
    fn test_cash_row_appended_and_weights_sum_to_one() {
        let report =
            generate_actuals_report(&[lot("l1", "VTI", 8.0)], &prices(), 200.0).unwrap();
        let cash = report.iter().find(|p| p.identifier == CASH_ID).unwrap();
        assert_eq!(cash.market_value, 200.0);
        assert!((cash.actual_weight - 0.2).abs() < 1e-12);
        let total: f64 = report.iter().map(|p| p.actual_weight).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_portfolio_empty_report() {
        let report = generate_actuals_report(&[], &prices(), 0.0).unwrap();
        assert!(report.is_empty());
    }
}
