use good_lp::{Expression, Variable};
use std::collections::HashMap;

use crate::optimizer::ProblemBuilder;
use crate::strategy::Strategy;
use crate::types::{GainType, CASH_ID};
use crate::RebalanceResult;

/// One continuous buy variable per candidate identifier.
#[derive(Debug, Clone)]
pub struct BuyVar {
    pub identifier: String,
    pub price: f64,
    pub var: Variable,
}

/// One continuous sell variable per tax lot, bounded by the lot quantity.
/// Carries the lot metadata the constraint and objective builders need.
#[derive(Debug, Clone)]
pub struct SellVar {
    pub tax_lot_id: String,
    pub identifier: String,
    pub price: f64,
    pub lot_quantity: f64,
    pub cost_per_share: f64,
    pub per_share_tax_liability: f64,
    pub gain_type: GainType,
    pub var: Variable,
}

/// The decision variables of one solve, with identifier and lot indexes.
pub struct DecisionVars {
    pub buys: Vec<BuyVar>,
    pub sells: Vec<SellVar>,
    buy_index: HashMap<String, usize>,
    sell_index: HashMap<String, usize>,
    sells_by_identifier: HashMap<String, Vec<usize>>,
}

impl DecisionVars {
    /// Create buy variables for every target identifier and sell variables
    /// for every lot in the gain/loss report.
    pub fn create(pb: &mut ProblemBuilder, strategy: &Strategy) -> RebalanceResult<DecisionVars> {
        let mut buys = Vec::new();
        let mut buy_index = HashMap::new();

        for identifier in strategy.target_identifiers() {
            let price = strategy.prices.require(&identifier)?;
            let var = pb.continuous(&format!("buy_{identifier}"), 0.0);
            buy_index.insert(identifier.clone(), buys.len());
            buys.push(BuyVar {
                identifier,
                price,
                var,
            });
        }

        let mut sells = Vec::new();
        let mut sell_index = HashMap::new();
        let mut sells_by_identifier: HashMap<String, Vec<usize>> = HashMap::new();

        for row in &strategy.gain_loss {
            let var = pb.bounded(&format!("sell_{}", row.tax_lot_id), 0.0, row.quantity);
            sell_index.insert(row.tax_lot_id.clone(), sells.len());
            sells_by_identifier
                .entry(row.identifier.clone())
                .or_default()
                .push(sells.len());
            sells.push(SellVar {
                tax_lot_id: row.tax_lot_id.clone(),
                identifier: row.identifier.clone(),
                price: row.current_price,
                lot_quantity: row.quantity,
                cost_per_share: row.cost_per_share,
                per_share_tax_liability: row.per_share_tax_liability,
                gain_type: row.gain_type,
                var,
            });
        }

        Ok(DecisionVars {
            buys,
            sells,
            buy_index,
            sell_index,
            sells_by_identifier,
        })
    }

    pub fn buy(&self, identifier: &str) -> Option<&BuyVar> {
        self.buy_index.get(identifier).map(|&i| &self.buys[i])
    }

    pub fn sell(&self, tax_lot_id: &str) -> Option<&SellVar> {
        self.sell_index.get(tax_lot_id).map(|&i| &self.sells[i])
    }

    pub fn sells_for(&self, identifier: &str) -> impl Iterator<Item = &SellVar> {
        self.sells_by_identifier
            .get(identifier)
            .into_iter()
            .flatten()
            .map(|&i| &self.sells[i])
    }

    pub fn has_sells_for(&self, identifier: &str) -> bool {
        self.sells_by_identifier
            .get(identifier)
            .map(|v| !v.is_empty())
            .unwrap_or(false)
    }

    /// Total sold quantity of one identifier, in shares.
    pub fn sell_quantity_sum(&self, identifier: &str) -> Expression {
        self.sells_for(identifier)
            .map(|s| Expression::from(s.var))
            .sum()
    }

    /// Total dollars spent on buys, cash included (its buy is pinned to 0).
    pub fn total_buy_cost(&self) -> Expression {
        self.buys.iter().map(|b| b.price * b.var).sum()
    }

    /// Dollars spent on non-cash buys.
    pub fn non_cash_buy_cost(&self) -> Expression {
        self.buys
            .iter()
            .filter(|b| b.identifier != CASH_ID)
            .map(|b| b.price * b.var)
            .sum()
    }

    /// Total dollars raised by sells.
    pub fn total_sell_proceeds(&self) -> Expression {
        self.sells.iter().map(|s| s.price * s.var).sum()
    }

    /// The all-zero trade vector used as a warm start.
    pub fn zero_seed(&self) -> Vec<(Variable, f64)> {
        self.buys
            .iter()
            .map(|b| (b.var, 0.0))
            .chain(self.sells.iter().map(|s| (s.var, 0.0)))
            .collect()
    }
}
