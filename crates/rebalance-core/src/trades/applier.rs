use chrono::NaiveDate;
use std::collections::HashSet;

use crate::initializers::closed_lots::ClosedLot;
use crate::initializers::tax_lots::{TaxLot, LOT_EPSILON};
use crate::types::{Trade, TradeAction};

/// A portfolio after a trade set has been executed.
#[derive(Debug, Clone)]
pub struct AppliedTrades {
    pub tax_lots: Vec<TaxLot>,
    pub cash: f64,
    pub closed_lots: Vec<ClosedLot>,
}

/// Execute trades against a lot table and cash balance. Sells consume the
/// referenced lot pro-rata and emit a closed-lot row; buys open a fresh
/// lot dated today. Unresolvable sells are skipped with a warning.
pub fn apply_trades_to_portfolio(
    tax_lots: &[TaxLot],
    trades: &[Trade],
    cash: f64,
    current_date: NaiveDate,
) -> AppliedTrades {
    let mut lots: Vec<TaxLot> = tax_lots.to_vec();
    let mut cash = cash;
    let mut closed_lots = Vec::new();
    let mut new_lots: Vec<TaxLot> = Vec::new();

    let mut lot_ids: HashSet<String> = lots.iter().map(|l| l.tax_lot_id.clone()).collect();
    let stamp = current_date.format("%Y%m%d").to_string();
    let mut counter = 0usize;

    for trade in trades {
        match trade.action {
            TradeAction::Sell => {
                let Some(lot_id) = trade.tax_lot_id.as_deref() else {
                    tracing::warn!(
                        identifier = %trade.identifier,
                        "sell trade missing tax_lot_id; skipping"
                    );
                    continue;
                };
                let Some(position) = lots.iter().position(|l| l.tax_lot_id == lot_id) else {
                    tracing::warn!(
                        identifier = %trade.identifier,
                        tax_lot_id = %lot_id,
                        "tax lot not found for sell; skipping"
                    );
                    continue;
                };

                let current_quantity = lots[position].quantity;
                let mut quantity = trade.quantity;
                if quantity > current_quantity + LOT_EPSILON {
                    tracing::warn!(
                        tax_lot_id = %lot_id,
                        requested = quantity,
                        held = current_quantity,
                        "sell exceeds lot quantity; clamping"
                    );
                    quantity = current_quantity;
                }

                let proceeds = quantity * trade.price;
                let cost_per_share = lots[position].cost_basis / current_quantity;
                let sold_cost_basis = cost_per_share * quantity;
                closed_lots.push(ClosedLot {
                    identifier: trade.identifier.clone(),
                    quantity,
                    cost_basis: sold_cost_basis,
                    date_acquired: lots[position].date,
                    date_sold: current_date,
                    proceeds,
                    realized_gain: proceeds - sold_cost_basis,
                });

                let remaining = current_quantity - quantity;
                if remaining < LOT_EPSILON {
                    lots.remove(position);
                } else {
                    let lot = &mut lots[position];
                    lot.cost_basis *= remaining / current_quantity;
                    lot.quantity = remaining;
                }
                cash += proceeds;
            }
            TradeAction::Buy => {
                let cost_basis = trade.quantity * trade.price;
                let mut tax_lot_id = format!("lot_{}_{stamp}_{counter}", trade.identifier);
                while lot_ids.contains(&tax_lot_id) {
                    counter += 1;
                    tax_lot_id = format!("lot_{}_{stamp}_{counter}", trade.identifier);
                }
                lot_ids.insert(tax_lot_id.clone());
                counter += 1;

                new_lots.push(TaxLot {
                    tax_lot_id,
                    identifier: trade.identifier.clone(),
                    quantity: trade.quantity,
                    cost_basis,
                    date: current_date,
                });
                cash -= cost_basis;
            }
        }
    }

    lots.extend(new_lots);
    AppliedTrades {
        tax_lots: lots,
        cash,
        closed_lots,
    }
}
