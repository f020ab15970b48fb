use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::error::RebalanceError;
use crate::types::{GainType, Trade, TradeAction};
use crate::RebalanceResult;

const QUANTITY_EPSILON: f64 = 1e-9;

/// One row of the cross-strategy netted trade list. Sell rows carry the
/// tax lot they consume and the realized gain/loss split by holding
/// period; buy rows net to a single unlotted row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NettedTrade {
    pub identifier: String,
    pub action: TradeAction,
    pub quantity: f64,
    pub price: f64,
    pub tax_lot_id: Option<String>,
    pub short_term_gain: f64,
    pub short_term_loss: f64,
    pub long_term_gain: f64,
    pub long_term_loss: f64,
}

fn quantize(quantity: f64, decimals: u32) -> f64 {
    Decimal::from_f64_retain(quantity)
        .unwrap_or_default()
        .round_dp_with_strategy(decimals, RoundingStrategy::MidpointNearestEven)
        .to_f64()
        .unwrap_or(0.0)
}

struct SignedTrade<'a> {
    trade: &'a Trade,
    signed_quantity: f64,
}

/// Net opposing trades across strategies that share an execution ledger.
/// Buys count positive and sells negative; identifiers netting to zero
/// disappear, and the sign of the remainder fixes the action. Sell-side
/// realized gains are apportioned to the cumulative sold quantity where
/// it crosses zero, per tax lot.
pub fn net_trades_across_strategies(
    strategy_trades: &[Vec<Trade>],
    trade_rounding: u32,
) -> RebalanceResult<Vec<NettedTrade>> {
    let mut signed: Vec<SignedTrade> = Vec::new();
    for trades in strategy_trades {
        for trade in trades {
            let quantity = quantize(trade.quantity, trade_rounding);
            let signed_quantity = match trade.action {
                TradeAction::Buy => quantity,
                TradeAction::Sell => -quantity,
            };
            signed.push(SignedTrade {
                trade,
                signed_quantity,
            });
        }
    }
    if signed.is_empty() {
        return Ok(Vec::new());
    }

    // Net quantity and first-seen price per identifier, in arrival order.
    let mut order: Vec<&str> = Vec::new();
    let mut net: HashMap<&str, (f64, f64)> = HashMap::new();
    for st in &signed {
        let entry = net
            .entry(st.trade.identifier.as_str())
            .or_insert_with(|| {
                order.push(st.trade.identifier.as_str());
                (0.0, st.trade.price)
            });
        entry.0 += st.signed_quantity;
    }

    // Buys first, then sells, so the cumulative quantity only dips below
    // zero for the part of each sell that survives netting.
    signed.sort_by(|a, b| {
        b.signed_quantity
            .partial_cmp(&a.signed_quantity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut cumulative: HashMap<&str, f64> = HashMap::new();
    let mut matched_lots: HashMap<&str, Vec<NettedTrade>> = HashMap::new();
    let mut seen_lots: HashSet<(&str, &str)> = HashSet::new();

    for st in &signed {
        let identifier = st.trade.identifier.as_str();
        let cum = cumulative.entry(identifier).or_insert(0.0);
        *cum += st.signed_quantity;
        if *cum >= 0.0 || st.signed_quantity >= 0.0 {
            continue;
        }

        // The surviving (net) part of this sell.
        let net_quantity = st.signed_quantity.max(*cum);
        let net_pct = net_quantity / st.signed_quantity;
        let realized = st.trade.gain_loss.realized_gain * net_pct;

        let lot_id = st.trade.tax_lot_id.as_deref().ok_or_else(|| {
            RebalanceError::Netting(format!("sell of {identifier} carries no tax lot id"))
        })?;
        if !seen_lots.insert((identifier, lot_id)) {
            return Err(RebalanceError::Netting(format!(
                "duplicate sell tax lot {lot_id} for {identifier}"
            )));
        }

        let (short_gain, short_loss, long_gain, long_loss) =
            match st.trade.gain_loss.gain_type {
                Some(GainType::ShortTerm) => (realized.max(0.0), (-realized).max(0.0), 0.0, 0.0),
                Some(GainType::LongTerm) => (0.0, 0.0, realized.max(0.0), (-realized).max(0.0)),
                _ => (0.0, 0.0, 0.0, 0.0),
            };

        let price = net.get(identifier).map(|&(_, p)| p).unwrap_or(st.trade.price);
        matched_lots.entry(identifier).or_default().push(NettedTrade {
            identifier: identifier.to_string(),
            action: TradeAction::Sell,
            quantity: -net_quantity,
            price,
            tax_lot_id: Some(lot_id.to_string()),
            short_term_gain: short_gain,
            short_term_loss: short_loss,
            long_term_gain: long_gain,
            long_term_loss: long_loss,
        });
    }

    let mut out = Vec::new();
    for identifier in order {
        let (quantity, price) = net[identifier];
        if quantity.abs() <= QUANTITY_EPSILON {
            continue;
        }
        if quantity > 0.0 {
            out.push(NettedTrade {
                identifier: identifier.to_string(),
                action: TradeAction::Buy,
                quantity,
                price,
                tax_lot_id: None,
                short_term_gain: 0.0,
                short_term_loss: 0.0,
                long_term_gain: 0.0,
                long_term_loss: 0.0,
            });
        } else {
            let lots = matched_lots.remove(identifier).ok_or_else(|| {
                RebalanceError::Netting(format!(
                    "net sell of {identifier} has no matching tax lots"
                ))
            })?;
            out.extend(lots);
        }
    }

    if out.iter().any(|t| t.quantity <= 0.0) {
        return Err(RebalanceError::Netting(
            "netting produced a non-positive quantity".into(),
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TradeGainLoss, TradeTransaction};
    use pretty_assertions::assert_eq;

    fn buy(identifier: &str, quantity: f64, price: f64) -> Trade {
        Trade {
            identifier: identifier.into(),
            tax_lot_id: None,
            action: TradeAction::Buy,
            quantity,
            lot_quantity: quantity,
            price,
            trade_value: quantity * price,
            gain_loss: TradeGainLoss {
                cost_basis: quantity * price,
                realized_gain: 0.0,
                gain_type: None,
                is_tlh_trade: false,
                tax_cost: 0.0,
            },
            transaction: TradeTransaction {
                spread: 0.0,
                transaction_cost: 0.0,
            },
        }
    }

    fn sell(
        identifier: &str,
        lot: &str,
        quantity: f64,
        price: f64,
        realized_gain: f64,
        gain_type: GainType,
    ) -> Trade {
        Trade {
            identifier: identifier.into(),
            tax_lot_id: Some(lot.into()),
            action: TradeAction::Sell,
            quantity,
            lot_quantity: quantity,
            price,
            trade_value: quantity * price,
            gain_loss: TradeGainLoss {
                cost_basis: quantity * price - realized_gain,
                realized_gain,
                gain_type: Some(gain_type),
                is_tlh_trade: false,
                tax_cost: 0.0,
            },
            transaction: TradeTransaction {
                spread: 0.0,
                transaction_cost: 0.0,
            },
        }
    }

    #[test]
    fn test_exact_offset_cancels() {
        let a = vec![buy("VTI", 10.0, 100.0)];
        let b = vec![sell("VTI", "l1", 10.0, 100.0, 50.0, GainType::LongTerm)];
        let netted = net_trades_across_strategies(&[a, b], 2).unwrap();
        assert!(netted.is_empty());
    }

    #[test]
    fn test_partial_offset_nets_to_sell_with_apportioned_gain() {
        let a = vec![buy("VTI", 10.0, 100.0)];
        let b = vec![sell("VTI", "l1", 15.0, 100.0, 150.0, GainType::ShortTerm)];
        let netted = net_trades_across_strategies(&[a, b], 2).unwrap();
        assert_eq!(netted.len(), 1);
        let row = &netted[0];
        assert_eq!(row.action, TradeAction::Sell);
        assert!((row.quantity - 5.0).abs() < 1e-9);
        // A third of the sell survives, so a third of its gain does.
        assert!((row.short_term_gain - 50.0).abs() < 1e-9);
        assert_eq!(row.short_term_loss, 0.0);
        assert_eq!(row.long_term_gain, 0.0);
    }

    #[test]
    fn test_net_buy_keeps_single_row() {
        let a = vec![buy("VTI", 10.0, 100.0)];
        let b = vec![sell("VTI", "l1", 4.0, 100.0, -20.0, GainType::LongTerm)];
        let netted = net_trades_across_strategies(&[a, b], 2).unwrap();
        assert_eq!(netted.len(), 1);
        assert_eq!(netted[0].action, TradeAction::Buy);
        assert!((netted[0].quantity - 6.0).abs() < 1e-9);
        assert!(netted[0].tax_lot_id.is_none());
    }

    #[test]
    fn test_loss_lands_in_loss_column() {
        let trades = vec![sell("VTI", "l1", 5.0, 80.0, -40.0, GainType::LongTerm)];
        let netted = net_trades_across_strategies(&[trades], 2).unwrap();
        assert_eq!(netted.len(), 1);
        assert!((netted[0].long_term_loss - 40.0).abs() < 1e-9);
        assert_eq!(netted[0].long_term_gain, 0.0);
    }

    #[test]
    fn test_multiple_lots_split_rows() {
        let trades = vec![
            sell("VTI", "l1", 5.0, 80.0, 10.0, GainType::ShortTerm),
            sell("VTI", "l2", 3.0, 80.0, -6.0, GainType::LongTerm),
        ];
        let netted = net_trades_across_strategies(&[trades], 2).unwrap();
        assert_eq!(netted.len(), 2);
        let total: f64 = netted.iter().map(|t| t.quantity).sum();
        assert!((total - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_lot_rejected() {
        let a = vec![sell("VTI", "l1", 5.0, 80.0, 10.0, GainType::ShortTerm)];
        let b = vec![sell("VTI", "l1", 2.0, 80.0, 4.0, GainType::ShortTerm)];
        let err = net_trades_across_strategies(&[a, b], 2).unwrap_err();
        assert!(err.to_string().contains("duplicate sell tax lot"));
    }

    #[test]
    fn test_quantities_quantized_before_netting() {
        // 10.004 vs 10.001 at two decimals both quantize to 10.00.
        let a = vec![buy("VTI", 10.004, 100.0)];
        let b = vec![sell("VTI", "l1", 10.001, 100.0, 0.0, GainType::LongTerm)];
        let netted = net_trades_across_strategies(&[a, b], 2).unwrap();
        assert!(netted.is_empty());
    }
}
