use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashMap;

use crate::types::{Trade, TradeAction};

const VALUE_EPSILON: f64 = 1e-9;

/// Quantize down to the trade increment. Exact decimal arithmetic keeps
/// float dust out of the rounded quantities.
fn floor_to_increment(quantity: f64, decimals: u32) -> f64 {
    Decimal::from_f64_retain(quantity)
        .unwrap_or_default()
        .round_dp_with_strategy(decimals, RoundingStrategy::ToNegativeInfinity)
        .to_f64()
        .unwrap_or(0.0)
}

fn quantize(quantity: f64, decimals: u32) -> f64 {
    Decimal::from_f64_retain(quantity)
        .unwrap_or_default()
        .round_dp_with_strategy(decimals, RoundingStrategy::MidpointNearestEven)
        .to_f64()
        .unwrap_or(0.0)
}

/// Round fractional trades to lot units while preserving the total traded
/// value and the minimum-notional floor:
///
/// 1. floor every quantity to the increment,
/// 2. raise below-minimum (identifier, action) groups by increments until
///    the group crosses the threshold (sell round-ups capped at the lot),
/// 3. hand the residual value back, increment by increment, largest trade
///    first, in whichever direction closes the gap,
/// 4. drop empty trades and groups still under the minimum.
pub fn smart_round_trades(
    trades: Vec<Trade>,
    trade_rounding: u32,
    min_notional: f64,
) -> Vec<Trade> {
    let mut working: Vec<Trade> = trades.into_iter().filter(|t| t.quantity > 0.0).collect();
    if working.is_empty() {
        return working;
    }

    let original_total: f64 = working.iter().map(|t| t.quantity * t.price).sum();
    let min_increment = 10f64.powi(-(trade_rounding as i32));

    for trade in &mut working {
        trade.quantity = floor_to_increment(trade.quantity, trade_rounding);
        trade.trade_value = trade.quantity * trade.price;
    }

    if min_notional > 0.0 {
        raise_small_groups(&mut working, trade_rounding, min_increment, min_notional);
    }

    let new_total: f64 = working.iter().map(|t| t.trade_value).sum();
    let mut difference = original_total - new_total;

    working.sort_by(|a, b| {
        b.trade_value
            .partial_cmp(&a.trade_value)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let min_increment_value = working
        .iter()
        .map(|t| t.price * min_increment)
        .fold(f64::INFINITY, f64::min);

    if difference.abs() >= min_increment_value {
        let add = difference > 0.0;
        for trade in &mut working {
            if difference.abs() <= VALUE_EPSILON {
                break;
            }
            let unit_value = trade.price * min_increment;
            if unit_value > difference.abs() + VALUE_EPSILON {
                continue;
            }
            if add {
                // Never round a sell past the lot it references.
                if trade.action == TradeAction::Sell
                    && trade.quantity + min_increment > trade.lot_quantity + VALUE_EPSILON
                {
                    continue;
                }
                trade.quantity = quantize(trade.quantity + min_increment, trade_rounding);
                difference -= unit_value;
            } else {
                if trade.quantity < min_increment - VALUE_EPSILON {
                    continue;
                }
                trade.quantity = quantize(trade.quantity - min_increment, trade_rounding);
                difference += unit_value;
            }
            trade.trade_value = trade.quantity * trade.price;
        }
    }

    working.retain(|t| t.quantity > min_increment / 2.0);

    if min_notional > 0.0 {
        let totals = group_totals(&working);
        working.retain(|t| {
            totals
                .get(&(t.identifier.clone(), t.action))
                .map(|&v| v + VALUE_EPSILON >= min_notional)
                .unwrap_or(false)
        });
    }

    working.sort_by(|a, b| {
        b.trade_value
            .partial_cmp(&a.trade_value)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    working
}

fn group_totals(trades: &[Trade]) -> HashMap<(String, TradeAction), f64> {
    let mut totals: HashMap<(String, TradeAction), f64> = HashMap::new();
    for trade in trades {
        *totals
            .entry((trade.identifier.clone(), trade.action))
            .or_insert(0.0) += trade.trade_value;
    }
    totals
}

fn raise_small_groups(
    working: &mut [Trade],
    trade_rounding: u32,
    min_increment: f64,
    min_notional: f64,
) {
    let mut groups: HashMap<(String, TradeAction), Vec<usize>> = HashMap::new();
    for (i, trade) in working.iter().enumerate() {
        groups
            .entry((trade.identifier.clone(), trade.action))
            .or_default()
            .push(i);
    }

    for (_, mut members) in groups {
        let mut total: f64 = members.iter().map(|&i| working[i].trade_value).sum();
        if total + VALUE_EPSILON >= min_notional {
            continue;
        }
        members.sort_by(|&a, &b| {
            working[b]
                .trade_value
                .partial_cmp(&working[a].trade_value)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        'members: for &i in &members {
            loop {
                if total + VALUE_EPSILON >= min_notional {
                    break 'members;
                }
                let trade = &mut working[i];
                if trade.action == TradeAction::Sell
                    && trade.quantity + min_increment > trade.lot_quantity + VALUE_EPSILON
                {
                    break;
                }
                trade.quantity = quantize(trade.quantity + min_increment, trade_rounding);
                trade.trade_value = trade.quantity * trade.price;
                total += trade.price * min_increment;
            }
        }
    }
}
