use serde::{Deserialize, Serialize};

use crate::error::RebalanceError;
use crate::types::GainType;
use crate::RebalanceResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxRate {
    pub gain_type: GainType,
    pub federal_rate: f64,
    pub state_rate: f64,
    pub total_rate: f64,
}

/// The three validated tax rates keyed by gain type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxRateTable {
    rows: Vec<TaxRate>,
}

impl TaxRateTable {
    pub fn rows(&self) -> &[TaxRate] {
        &self.rows
    }

    pub fn rate(&self, gain_type: GainType) -> &TaxRate {
        // Construction guarantees all three gain types are present.
        self.rows
            .iter()
            .find(|r| r.gain_type == gain_type)
            .unwrap_or(&self.rows[0])
    }
}

/// Default rates for high-bracket filers: 35% ordinary income, 20% long-term
/// gains, 15% qualified dividends, 6% state.
fn default_rates() -> Vec<TaxRate> {
    vec![
        TaxRate {
            gain_type: GainType::ShortTerm,
            federal_rate: 0.35,
            state_rate: 0.06,
            total_rate: 0.41,
        },
        TaxRate {
            gain_type: GainType::LongTerm,
            federal_rate: 0.20,
            state_rate: 0.06,
            total_rate: 0.26,
        },
        TaxRate {
            gain_type: GainType::QualifiedDividend,
            federal_rate: 0.15,
            state_rate: 0.06,
            total_rate: 0.21,
        },
    ]
}

/// Validate the tax-rate table, falling back to the default high-bracket
/// rates when none are supplied.
pub fn initialize_tax_rates(tax_rates: Vec<TaxRate>) -> RebalanceResult<TaxRateTable> {
    let rows = if tax_rates.is_empty() {
        default_rates()
    } else {
        tax_rates
    };

    for required in [
        GainType::ShortTerm,
        GainType::LongTerm,
        GainType::QualifiedDividend,
    ] {
        if !rows.iter().any(|r| r.gain_type == required) {
            return Err(RebalanceError::InvalidInput {
                field: "tax_rates.gain_type".into(),
                reason: format!("missing required gain type: {}", required.as_str()),
            });
        }
    }

    for row in &rows {
        for (name, value) in [
            ("federal_rate", row.federal_rate),
            ("state_rate", row.state_rate),
            ("total_rate", row.total_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(RebalanceError::InvalidInput {
                    field: format!("tax_rates.{name}"),
                    reason: format!(
                        "rate {value} for {} outside [0, 1]",
                        row.gain_type.as_str()
                    ),
                });
            }
        }
    }

    Ok(TaxRateTable { rows })
}
