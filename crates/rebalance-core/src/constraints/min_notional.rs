use good_lp::constraint;
use std::collections::BTreeSet;

use crate::constraints::TradeCheck;
use crate::optimizer::{DecisionVars, ProblemBuilder};
use crate::strategy::Strategy;
use crate::types::CASH_ID;
use crate::RebalanceResult;

/// Upper bound on any single trade, in shares.
const BIG_M: f64 = 1e6;

/// Either an identifier trades at least the minimum notional or it does
/// not trade at all, via a binary `happens` indicator per buy and per
/// identifier-aggregated sell.
pub fn emit(
    pb: &mut ProblemBuilder,
    vars: &DecisionVars,
    strategy: &Strategy,
    min_notional: f64,
) -> RebalanceResult<()> {
    if min_notional <= 0.0 {
        return Ok(());
    }

    for buy in &vars.buys {
        if buy.identifier == CASH_ID || buy.price <= 0.0 {
            continue;
        }
        let happens = pb.binary(&format!("buy_happens_{}", buy.identifier));
        pb.constrain(
            format!("buy_upper_{}", buy.identifier),
            constraint!(buy.var <= BIG_M * happens),
        );
        pb.constrain(
            format!("buy_min_notional_{}", buy.identifier),
            constraint!(buy.var >= (min_notional / buy.price) * happens),
        );
    }

    let identifiers: BTreeSet<&String> = vars.sells.iter().map(|s| &s.identifier).collect();
    for identifier in identifiers {
        let price = strategy.prices.require(identifier)?;
        if price <= 0.0 {
            continue;
        }
        let max_sell = strategy.held_quantity(identifier);
        let happens = pb.binary(&format!("sell_happens_{identifier}"));
        let sell_sum = vars.sell_quantity_sum(identifier);
        pb.constrain(
            format!("sell_upper_{identifier}"),
            constraint!(sell_sum.clone() <= max_sell * happens),
        );
        pb.constrain(
            format!("sell_min_notional_{identifier}"),
            constraint!(sell_sum >= (min_notional / price) * happens),
        );
    }

    Ok(())
}

/// Per-trade form for buys.
pub fn check_buy(
    strategy: &Strategy,
    identifier: &str,
    quantity: f64,
    min_notional: f64,
) -> RebalanceResult<TradeCheck> {
    if min_notional <= 0.0 {
        return Ok(TradeCheck::Allowed);
    }
    let price = strategy.prices.require(identifier)?;
    let notional = quantity * price;
    if notional < min_notional {
        return Ok(TradeCheck::Rejected(format!(
            "trade notional ({notional:.2}) below minimum ({min_notional})"
        )));
    }
    Ok(TradeCheck::Allowed)
}

/// Per-trade form for sells.
pub fn check_sell(
    strategy: &Strategy,
    tax_lot_id: &str,
    quantity: f64,
    min_notional: f64,
) -> RebalanceResult<TradeCheck> {
    if min_notional <= 0.0 {
        return Ok(TradeCheck::Allowed);
    }
    let Some(lot) = strategy.lot(tax_lot_id) else {
        return Ok(TradeCheck::Rejected(format!(
            "unknown tax lot {tax_lot_id}"
        )));
    };
    let price = strategy.prices.require(&lot.identifier)?;
    let notional = quantity * price;
    if notional < min_notional {
        return Ok(TradeCheck::Rejected(format!(
            "trade notional ({notional:.2}) below minimum ({min_notional})"
        )));
    }
    Ok(TradeCheck::Allowed)
}
