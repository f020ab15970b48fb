use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::error::RebalanceError;
use crate::initializers::prices::PriceTable;
use crate::types::{canonical_identifier, CASH_ID};
use crate::RebalanceResult;

/// Spread assumed when the whole table is absent (3 bps).
pub const DEFAULT_SPREAD: f64 = 0.0003;

/// Spread assumed for identifiers missing from a supplied table (1 bp).
pub const DEFAULT_MISSING_SPREAD: f64 = 0.0001;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSpread {
    pub identifier: String,
    pub spread: f64,
}

/// A bid-ask spread with its derived per-share transaction cost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spread {
    pub identifier: String,
    pub spread: f64,
    pub per_share_cost: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpreadTable {
    rows: Vec<Spread>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl SpreadTable {
    fn from_rows(rows: Vec<Spread>) -> Self {
        let index = rows
            .iter()
            .enumerate()
            .map(|(i, s)| (s.identifier.clone(), i))
            .collect();
        SpreadTable { rows, index }
    }

    pub fn rows(&self) -> &[Spread] {
        &self.rows
    }

    pub fn get(&self, identifier: &str) -> Option<&Spread> {
        self.index.get(identifier).map(|&i| &self.rows[i])
    }

    pub fn spread(&self, identifier: &str) -> f64 {
        self.get(identifier).map(|s| s.spread).unwrap_or(0.0)
    }

    pub fn per_share_cost(&self, identifier: &str) -> f64 {
        self.get(identifier).map(|s| s.per_share_cost).unwrap_or(0.0)
    }
}

/// Build the spread table for every identifier the strategy references,
/// filling defaults where the caller supplied nothing. Cash trades free.
pub fn initialize_spreads(
    spreads: Vec<RawSpread>,
    all_identifiers: &BTreeSet<String>,
    prices: &PriceTable,
) -> RebalanceResult<SpreadTable> {
    let mut by_id: HashMap<String, f64> = HashMap::new();
    let mut negatives = Vec::new();

    for raw in &spreads {
        let identifier = canonical_identifier(&raw.identifier);
        if raw.spread < 0.0 {
            negatives.push(identifier.clone());
        }
        by_id.entry(identifier).or_insert(raw.spread);
    }
    if !negatives.is_empty() {
        return Err(RebalanceError::InvalidInput {
            field: "spreads.spread".into(),
            reason: format!("negative spreads for: {}", negatives.join(", ")),
        });
    }

    let fill = if spreads.is_empty() {
        DEFAULT_SPREAD
    } else {
        DEFAULT_MISSING_SPREAD
    };

    let cash_id = CASH_ID.to_string();
    let mut wanted: Vec<&String> = all_identifiers.iter().collect();
    if !all_identifiers.contains(CASH_ID) {
        wanted.push(&cash_id);
    }

    let mut rows = Vec::with_capacity(wanted.len());
    for identifier in wanted {
        let spread = if identifier == CASH_ID {
            0.0
        } else {
            *by_id.get(identifier).unwrap_or(&fill)
        };
        let price = prices.require(identifier)?;
        rows.push(Spread {
            identifier: identifier.clone(),
            spread,
            per_share_cost: price * spread,
        });
    }

    Ok(SpreadTable::from_rows(rows))
}
