use good_lp::constraint;

use crate::calendar::TradingCalendar;
use crate::constraints::TradeCheck;
use crate::optimizer::{DecisionVars, ProblemBuilder};
use crate::strategy::Strategy;
use crate::RebalanceResult;

/// Pin the sell variable of every lot acquired on or after the before-date
/// (current date minus the holding window, snapped to the nearest prior
/// trading day).
pub fn emit(
    pb: &mut ProblemBuilder,
    vars: &DecisionVars,
    strategy: &Strategy,
    days: i64,
) -> RebalanceResult<()> {
    if days <= 0 {
        return Ok(());
    }
    let before_date = TradingCalendar::shared().before_date(strategy.current_date, days);

    for lot in &strategy.tax_lots {
        if lot.date >= before_date {
            if let Some(sell) = vars.sell(&lot.tax_lot_id) {
                pb.constrain(
                    format!("no_sell_recently_bought_{}", lot.tax_lot_id),
                    constraint!(sell.var == 0.0),
                );
            }
        }
    }

    Ok(())
}

/// Per-trade form: a lot inside the holding window may not be sold.
pub fn check_sell(
    strategy: &Strategy,
    tax_lot_id: &str,
    days: i64,
) -> RebalanceResult<TradeCheck> {
    if days <= 0 {
        return Ok(TradeCheck::Allowed);
    }
    let Some(lot) = strategy.lot(tax_lot_id) else {
        return Ok(TradeCheck::Rejected(format!(
            "unknown tax lot {tax_lot_id}"
        )));
    };

    let before_date = TradingCalendar::shared().before_date(strategy.current_date, days);
    if lot.date >= before_date {
        let held = (strategy.current_date - lot.date).num_days();
        let remaining = (days - held).max(0);
        return Ok(TradeCheck::Rejected(format!(
            "tax lot {tax_lot_id} must be held for {} more days",
            remaining + 1
        )));
    }

    Ok(TradeCheck::Allowed)
}
