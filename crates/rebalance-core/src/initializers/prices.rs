use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::error::RebalanceError;
use crate::types::{canonical_identifier, CASH_ID};
use crate::RebalanceResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Price {
    pub identifier: String,
    pub price: f64,
}

/// Price table with an identifier index for O(1) lookup.
#[derive(Debug, Clone, Serialize)]
pub struct PriceTable {
    rows: Vec<Price>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl PriceTable {
    fn from_rows(rows: Vec<Price>) -> Self {
        let index = rows
            .iter()
            .enumerate()
            .map(|(i, p)| (p.identifier.clone(), i))
            .collect();
        PriceTable { rows, index }
    }

    pub fn rows(&self) -> &[Price] {
        &self.rows
    }

    pub fn get(&self, identifier: &str) -> Option<f64> {
        self.index.get(identifier).map(|&i| self.rows[i].price)
    }

    pub fn require(&self, identifier: &str) -> RebalanceResult<f64> {
        self.get(identifier)
            .ok_or_else(|| RebalanceError::InvalidInput {
                field: "prices".into(),
                reason: format!("no price for identifier {identifier}"),
            })
    }
}

/// Validate the price table against the set of identifiers the strategy
/// references. Cash is forced to 1.0.
pub fn initialize_prices(
    prices: Vec<Price>,
    all_identifiers: &BTreeSet<String>,
) -> RebalanceResult<PriceTable> {
    let mut rows: Vec<Price> = Vec::with_capacity(prices.len() + 1);
    let mut seen: HashMap<String, usize> = HashMap::new();

    let mut negatives = Vec::new();
    let mut duplicates = Vec::new();
    for p in prices {
        let identifier = canonical_identifier(&p.identifier);
        if p.price < 0.0 {
            negatives.push(identifier.clone());
        }
        match seen.get(&identifier) {
            // Cash rows can legitimately collapse to one entry; anything else
            // appearing twice is a data error.
            Some(_) if identifier == CASH_ID => continue,
            Some(_) => {
                duplicates.push(identifier);
                continue;
            }
            None => {
                seen.insert(identifier.clone(), rows.len());
                rows.push(Price {
                    identifier,
                    price: p.price,
                });
            }
        }
    }

    if !negatives.is_empty() {
        return Err(RebalanceError::InvalidInput {
            field: "prices.price".into(),
            reason: format!("negative prices for: {}", negatives.join(", ")),
        });
    }
    if !duplicates.is_empty() {
        return Err(RebalanceError::InvalidInput {
            field: "prices.identifier".into(),
            reason: format!("duplicate identifiers: {}", duplicates.join(", ")),
        });
    }

    match seen.get(CASH_ID) {
        Some(&i) => rows[i].price = 1.0,
        None => rows.push(Price {
            identifier: CASH_ID.to_string(),
            price: 1.0,
        }),
    }

    let table = PriceTable::from_rows(rows);
    let missing: Vec<&str> = all_identifiers
        .iter()
        .filter(|id| table.get(id).is_none())
        .map(|id| id.as_str())
        .collect();
    if !missing.is_empty() {
        return Err(RebalanceError::InvalidInput {
            field: "prices".into(),
            reason: format!("missing prices for identifiers: {}", missing.join(", ")),
        });
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn price(id: &str, p: f64) -> Price {
        Price {
            identifier: id.into(),
            price: p,
        }
    }

    fn ids(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_cash_forced_to_one() {
        let table = initialize_prices(
            vec![price("VTI", 250.0), price("cash", 0.99)],
            &ids(&["VTI"]),
        )
        .unwrap();
        assert_eq!(table.get(CASH_ID), Some(1.0));
        assert_eq!(table.get("VTI"), Some(250.0));
    }

    #[test]
    fn test_cash_inserted_when_absent() {
        let table = initialize_prices(vec![price("VTI", 250.0)], &ids(&["VTI"])).unwrap();
        assert_eq!(table.get(CASH_ID), Some(1.0));
    }

    #[test]
    fn test_missing_price_rejected() {
        let err = initialize_prices(vec![price("VTI", 250.0)], &ids(&["VTI", "BND"]))
            .unwrap_err();
        assert!(err.to_string().contains("missing prices"));
        assert!(err.to_string().contains("BND"));
    }

    #[test]
    fn test_negative_price_rejected() {
        let err = initialize_prices(vec![price("VTI", -1.0)], &ids(&["VTI"])).unwrap_err();
        assert!(err.to_string().contains("negative prices"));
    }

    #[test]
    fn test_duplicate_identifier_rejected() {
        let err = initialize_prices(
            vec![price("VTI", 250.0), price("vti", 251.0)],
            &ids(&["VTI"]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate identifiers"));
    }
}
