use good_lp::Solution;

use crate::objectives::tax::get_tax_cost;
use crate::objectives::transaction::{get_buy_cost, get_sell_cost};
use crate::optimizer::DecisionVars;
use crate::strategy::Strategy;
use crate::types::{Trade, TradeAction, TradeGainLoss, TradeTransaction};

const QUANTITY_EPSILON: f64 = 1e-9;

/// Turn positive variable values into annotated trades. Quantities are
/// still fractional here; rounding happens afterwards.
pub fn extract_trades(
    vars: &DecisionVars,
    solution: &impl Solution,
    strategy: &Strategy,
    tax_normalization: f64,
    transaction_normalization: f64,
) -> Vec<Trade> {
    let total_value = strategy.total_value();
    let replacements = strategy.tlh_replacements();
    let should_tlh = strategy.optimization_type.should_tlh();
    let mut trades = Vec::new();

    for buy in &vars.buys {
        let quantity = solution.value(buy.var);
        if quantity <= QUANTITY_EPSILON {
            continue;
        }
        let spread = strategy.spreads.spread(&buy.identifier);
        let per_share_cost = strategy.spreads.per_share_cost(&buy.identifier);
        let trade_value = quantity * buy.price;
        let is_tlh_trade = should_tlh && replacements.contains(buy.identifier.as_str());

        trades.push(Trade {
            identifier: buy.identifier.clone(),
            tax_lot_id: None,
            action: TradeAction::Buy,
            quantity,
            lot_quantity: quantity,
            price: buy.price,
            trade_value,
            gain_loss: TradeGainLoss {
                cost_basis: trade_value,
                realized_gain: 0.0,
                gain_type: None,
                is_tlh_trade,
                tax_cost: 0.0,
            },
            transaction: TradeTransaction {
                spread,
                transaction_cost: get_buy_cost(
                    quantity,
                    per_share_cost,
                    total_value,
                    transaction_normalization,
                ),
            },
        });
    }

    for sell in &vars.sells {
        let quantity = solution.value(sell.var);
        if quantity <= QUANTITY_EPSILON {
            continue;
        }
        let spread = strategy.spreads.spread(&sell.identifier);
        let per_share_cost = strategy.spreads.per_share_cost(&sell.identifier);
        let trade_value = quantity * sell.price;
        let realized_gain = quantity * (sell.price - sell.cost_per_share);
        let is_tlh_trade = should_tlh
            && sell.per_share_tax_liability < 0.0
            && strategy.has_replacement_for(&sell.identifier);

        trades.push(Trade {
            identifier: sell.identifier.clone(),
            tax_lot_id: Some(sell.tax_lot_id.clone()),
            action: TradeAction::Sell,
            quantity,
            lot_quantity: sell.lot_quantity,
            price: sell.price,
            trade_value,
            gain_loss: TradeGainLoss {
                cost_basis: quantity * sell.cost_per_share,
                realized_gain,
                gain_type: Some(sell.gain_type),
                is_tlh_trade,
                tax_cost: get_tax_cost(
                    quantity,
                    sell.per_share_tax_liability,
                    total_value,
                    tax_normalization,
                ),
            },
            transaction: TradeTransaction {
                spread,
                transaction_cost: get_sell_cost(
                    quantity,
                    per_share_cost,
                    total_value,
                    transaction_normalization,
                ),
            },
        });
    }

    trades
}
