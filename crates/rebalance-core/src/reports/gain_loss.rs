use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::initializers::prices::PriceTable;
use crate::initializers::tax_lots::TaxLot;
use crate::initializers::tax_rates::TaxRateTable;
use crate::types::GainType;
use crate::RebalanceResult;

/// Positions held longer than this qualify for long-term treatment.
pub const LONG_TERM_DAYS: i64 = 365;

/// Unrealized gain, holding period, and tax liability for one tax lot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GainLossRow {
    pub tax_lot_id: String,
    pub identifier: String,
    pub quantity: f64,
    pub cost_basis: f64,
    pub cost_per_share: f64,
    pub current_price: f64,
    pub market_value: f64,
    pub unrealized_gain: f64,
    pub unrealized_gain_pct: f64,
    pub holding_period_days: i64,
    pub is_long_term: bool,
    pub gain_type: GainType,
    pub federal_tax_rate: f64,
    pub state_tax_rate: f64,
    pub total_tax_rate: f64,
    /// Signed: negative for losses, i.e. a harvestable tax benefit.
    pub tax_liability: f64,
    pub per_share_tax_liability: f64,
    pub tax_gain_loss_percentage: Option<f64>,
}

/// Per-lot unrealized gain/loss at current prices with the applicable tax
/// rates joined in.
pub fn generate_gain_loss_report(
    tax_lots: &[TaxLot],
    prices: &PriceTable,
    current_date: NaiveDate,
    tax_rates: &TaxRateTable,
) -> RebalanceResult<Vec<GainLossRow>> {
    let mut report = Vec::with_capacity(tax_lots.len());

    for lot in tax_lots {
        let current_price = prices.require(&lot.identifier)?;
        let cost_per_share = lot.cost_basis / lot.quantity;
        let market_value = lot.quantity * current_price;
        let unrealized_gain = market_value - lot.cost_basis;
        let unrealized_gain_pct = if lot.cost_basis > 0.0 {
            unrealized_gain / lot.cost_basis
        } else {
            0.0
        };
        let holding_period_days = (current_date - lot.date).num_days();
        let is_long_term = holding_period_days > LONG_TERM_DAYS;
        let gain_type = if is_long_term {
            GainType::LongTerm
        } else {
            GainType::ShortTerm
        };
        let rate = tax_rates.rate(gain_type);
        let tax_liability = unrealized_gain * rate.total_rate;

        report.push(GainLossRow {
            tax_lot_id: lot.tax_lot_id.clone(),
            identifier: lot.identifier.clone(),
            quantity: lot.quantity,
            cost_basis: lot.cost_basis,
            cost_per_share,
            current_price,
            market_value,
            unrealized_gain,
            unrealized_gain_pct,
            holding_period_days,
            is_long_term,
            gain_type,
            federal_tax_rate: rate.federal_rate,
            state_tax_rate: rate.state_rate,
            total_tax_rate: rate.total_rate,
            tax_liability,
            per_share_tax_liability: tax_liability / lot.quantity,
            tax_gain_loss_percentage: if rate.total_rate != 0.0 {
                Some(unrealized_gain_pct * rate.total_rate)
            } else {
                None
            },
        });
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::initializers::prices::{initialize_prices, Price};
    use crate::initializers::tax_rates::initialize_tax_rates;
    use pretty_assertions::assert_eq;

    fn prices() -> PriceTable {
        initialize_prices(
            vec![Price {
                identifier: "VTI".into(),
                price: 120.0,
            }],
            &["VTI".to_string()].into_iter().collect(),
        )
        .unwrap()
    }

    fn lot(id: &str, date: &str, quantity: f64, cost_basis: f64) -> TaxLot {
        TaxLot {
            tax_lot_id: id.into(),
            identifier: "VTI".into(),
            quantity,
            cost_basis,
            date: date.parse().unwrap(),
        }
    }

    fn current() -> NaiveDate {
        "2024-06-03".parse().unwrap()
    }

    #[test]
    fn test_long_term_classification_and_rates() {
        let rates = initialize_tax_rates(vec![]).unwrap();
        let report = generate_gain_loss_report(
            &[
                lot("old", "2022-01-03", 10.0, 1000.0),
                lot("new", "2024-03-01", 10.0, 1000.0),
            ],
            &prices(),
            current(),
            &rates,
        )
        .unwrap();

        let old = &report[0];
        assert!(old.is_long_term);
        assert_eq!(old.gain_type, GainType::LongTerm);
        assert_eq!(old.total_tax_rate, 0.26);

        let new = &report[1];
        assert!(!new.is_long_term);
        assert_eq!(new.gain_type, GainType::ShortTerm);
        assert_eq!(new.total_tax_rate, 0.41);
    }

    #[test]
    fn test_tax_liability_and_per_share() {
        let rates = initialize_tax_rates(vec![]).unwrap();
        let report = generate_gain_loss_report(
            &[lot("l1", "2022-01-03", 10.0, 1000.0)],
            &prices(),
            current(),
            &rates,
        )
        .unwrap();
        let row = &report[0];
        // market value 1200, gain 200, long-term rate 0.26
        assert!((row.unrealized_gain - 200.0).abs() < 1e-9);
        assert!((row.tax_liability - 52.0).abs() < 1e-9);
        assert!((row.per_share_tax_liability - 5.2).abs() < 1e-9);
        assert!((row.cost_per_share - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_loss_lot_has_negative_liability() {
        let rates = initialize_tax_rates(vec![]).unwrap();
        let report = generate_gain_loss_report(
            &[lot("l1", "2024-03-01", 10.0, 1500.0)],
            &prices(),
            current(),
            &rates,
        )
        .unwrap();
        let row = &report[0];
        assert!(row.unrealized_gain < 0.0);
        assert!(row.tax_liability < 0.0);
        assert!(row.per_share_tax_liability < 0.0);
    }

    #[test]
    fn test_holding_period_days() {
        let rates = initialize_tax_rates(vec![]).unwrap();
        let report = generate_gain_loss_report(
            &[lot("l1", "2024-05-24", 1.0, 100.0)],
            &prices(),
            current(),
            &rates,
        )
        .unwrap();
        assert_eq!(report[0].holding_period_days, 10);
    }
}
