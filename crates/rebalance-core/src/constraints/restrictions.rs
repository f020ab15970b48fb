use chrono::{Duration, NaiveDate};
use good_lp::constraint;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::constraints::TradeCheck;
use crate::initializers::closed_lots::ClosedLot;
use crate::initializers::tax_lots::TaxLot;
use crate::optimizer::{DecisionVars, ProblemBuilder};
use crate::strategy::Strategy;
use crate::types::canonical_identifier;
use crate::RebalanceResult;

/// Lookback window for deriving wash-sale restrictions from closed lots.
pub const WASH_SALE_WINDOW_DAYS: i64 = 30;

/// A lot that may only be sold as part of a full liquidation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestrictedLot {
    pub tax_lot_id: String,
    pub quantity: f64,
}

/// An explicit wash-sale restriction supplied with the event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WashSaleEntry {
    pub identifier: String,
    #[serde(default)]
    pub restricted_from_buying: bool,
    #[serde(default)]
    pub restricted_lot_ids: Vec<String>,
}

/// Wash-sale state per identifier: buy prohibitions and the lots that may
/// only leave in a full liquidation. Built from explicit entries merged
/// with restrictions derived from recent loss sales in the closed-lot
/// history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WashSaleRestrictions {
    buy_restricted: BTreeSet<String>,
    restricted_lots: BTreeMap<String, Vec<RestrictedLot>>,
}

impl WashSaleRestrictions {
    pub fn is_restricted_from_buying(&self, identifier: &str) -> bool {
        self.buy_restricted.contains(identifier)
    }

    pub fn restricted_lots(&self, identifier: &str) -> &[RestrictedLot] {
        self.restricted_lots
            .get(identifier)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn restricted_identifiers(&self) -> impl Iterator<Item = &String> {
        self.buy_restricted
            .iter()
            .chain(self.restricted_lots.keys())
    }

    pub fn is_lot_restricted(&self, identifier: &str, tax_lot_id: &str) -> bool {
        self.restricted_lots(identifier)
            .iter()
            .any(|lot| lot.tax_lot_id == tax_lot_id)
    }

    /// Merge explicit entries with restrictions derived from the trailing
    /// loss-sale window: an identifier sold at a loss within the window is
    /// restricted from buying, and its still-held lots acquired inside the
    /// window may only be sold by liquidating the position.
    pub fn build(
        entries: &[WashSaleEntry],
        closed_lots: &[ClosedLot],
        tax_lots: &[TaxLot],
        current_date: NaiveDate,
    ) -> WashSaleRestrictions {
        let mut out = WashSaleRestrictions::default();
        let window_start = current_date - Duration::days(WASH_SALE_WINDOW_DAYS);

        for entry in entries {
            let identifier = canonical_identifier(&entry.identifier);
            if entry.restricted_from_buying {
                out.buy_restricted.insert(identifier.clone());
            }
            for lot_id in &entry.restricted_lot_ids {
                match tax_lots.iter().find(|l| &l.tax_lot_id == lot_id) {
                    Some(lot) => out.push_lot(&identifier, lot),
                    None => {
                        tracing::warn!(
                            tax_lot_id = %lot_id,
                            "wash-sale entry references an unknown tax lot; ignoring"
                        );
                    }
                }
            }
        }

        let loss_sellers: BTreeSet<String> = closed_lots
            .iter()
            .filter(|c| c.realized_gain < 0.0)
            .filter(|c| c.date_sold > window_start && c.date_sold <= current_date)
            .map(|c| c.identifier.clone())
            .collect();

        for identifier in loss_sellers {
            out.buy_restricted.insert(identifier.clone());
            for lot in tax_lots
                .iter()
                .filter(|l| l.identifier == identifier && l.date > window_start)
            {
                out.push_lot(&identifier, lot);
            }
        }

        out
    }

    fn push_lot(&mut self, identifier: &str, lot: &TaxLot) {
        let lots = self.restricted_lots.entry(identifier.to_string()).or_default();
        if !lots.iter().any(|l| l.tax_lot_id == lot.tax_lot_id) {
            lots.push(RestrictedLot {
                tax_lot_id: lot.tax_lot_id.clone(),
                quantity: lot.quantity,
            });
        }
    }
}

/// Emit stock-restriction pins plus the wash-sale buy pins and
/// full-liquidation indicators.
pub fn emit(
    pb: &mut ProblemBuilder,
    vars: &DecisionVars,
    strategy: &Strategy,
    enforce_wash_sales: bool,
) -> RebalanceResult<()> {
    for restriction in &strategy.stock_restrictions {
        if !restriction.can_buy {
            if let Some(buy) = vars.buy(&restriction.identifier) {
                pb.constrain(
                    format!("no_buy_{}", restriction.identifier),
                    constraint!(buy.var == 0.0),
                );
            }
        }
        if !restriction.can_sell {
            for sell in vars.sells_for(&restriction.identifier) {
                pb.constrain(
                    format!("no_sell_{}", sell.tax_lot_id),
                    constraint!(sell.var == 0.0),
                );
            }
        }
    }

    if !enforce_wash_sales {
        return Ok(());
    }
    let wash_sales = &strategy.wash_sales;

    let identifiers: BTreeSet<&String> = wash_sales.restricted_identifiers().collect();
    for identifier in identifiers {
        if wash_sales.is_restricted_from_buying(identifier) {
            if let Some(buy) = vars.buy(identifier) {
                pb.constrain(
                    format!("wash_sale_buy_{identifier}"),
                    constraint!(buy.var == 0.0),
                );
            }
        }

        let restricted = wash_sales.restricted_lots(identifier);
        if restricted.is_empty() || !vars.has_sells_for(identifier) {
            continue;
        }

        // A restricted lot may leave only when the whole position does:
        // sells of the identifier must cover the full held quantity times
        // the liquidation indicator, and each restricted lot sells exactly
        // its quantity times the indicator.
        let liquidate = pb.binary(&format!("liquidate_{identifier}"));
        let held_quantity = strategy.held_quantity(identifier);
        let sell_sum = vars.sell_quantity_sum(identifier);
        pb.constrain(
            format!("wash_sale_liquidate_{identifier}"),
            constraint!(sell_sum >= held_quantity * liquidate),
        );
        for lot in restricted {
            if let Some(sell) = vars.sell(&lot.tax_lot_id) {
                pb.constrain(
                    format!("wash_sale_sell_{}", lot.tax_lot_id),
                    constraint!(sell.var == lot.quantity * liquidate),
                );
            }
        }
    }

    Ok(())
}

/// Per-trade form of the buy restrictions.
pub fn check_buy(strategy: &Strategy, identifier: &str, enforce_wash_sales: bool) -> TradeCheck {
    if let Some(restriction) = strategy
        .stock_restrictions
        .iter()
        .find(|r| r.identifier == identifier)
    {
        if !restriction.can_buy {
            return TradeCheck::Rejected(format!(
                "security {identifier} is restricted from buying"
            ));
        }
    }
    if enforce_wash_sales && strategy.wash_sales.is_restricted_from_buying(identifier) {
        return TradeCheck::Rejected(format!(
            "security {identifier} is restricted due to wash sale rules"
        ));
    }
    TradeCheck::Allowed
}

/// Per-trade form of the sell restrictions.
pub fn check_sell(
    strategy: &Strategy,
    tax_lot_id: &str,
    enforce_wash_sales: bool,
) -> RebalanceResult<TradeCheck> {
    let Some(lot) = strategy.lot(tax_lot_id) else {
        return Ok(TradeCheck::Rejected(format!(
            "unknown tax lot {tax_lot_id}"
        )));
    };

    if let Some(restriction) = strategy
        .stock_restrictions
        .iter()
        .find(|r| r.identifier == lot.identifier)
    {
        if !restriction.can_sell {
            return Ok(TradeCheck::Rejected(format!(
                "security {} is restricted from selling",
                lot.identifier
            )));
        }
    }

    if enforce_wash_sales && strategy.wash_sales.is_lot_restricted(&lot.identifier, tax_lot_id) {
        return Ok(TradeCheck::Rejected(format!(
            "tax lot {tax_lot_id} is restricted due to wash sale rules"
        )));
    }

    Ok(TradeCheck::Allowed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lot(id: &str, identifier: &str, date: &str, quantity: f64) -> TaxLot {
        TaxLot {
            tax_lot_id: id.into(),
            identifier: identifier.into(),
            quantity,
            cost_basis: quantity * 10.0,
            date: date.parse().unwrap(),
        }
    }

    fn loss_sale(identifier: &str, sold: &str) -> ClosedLot {
        ClosedLot {
            identifier: identifier.into(),
            quantity: 5.0,
            cost_basis: 100.0,
            date_acquired: "2023-06-01".parse().unwrap(),
            date_sold: sold.parse().unwrap(),
            proceeds: 80.0,
            realized_gain: -20.0,
        }
    }

    #[test]
    fn test_recent_loss_sale_restricts_buying() {
        let restrictions = WashSaleRestrictions::build(
            &[],
            &[loss_sale("VTI", "2024-05-20")],
            &[],
            "2024-06-03".parse().unwrap(),
        );
        assert!(restrictions.is_restricted_from_buying("VTI"));
    }

    #[test]
    fn test_old_loss_sale_does_not_restrict() {
        let restrictions = WashSaleRestrictions::build(
            &[],
            &[loss_sale("VTI", "2024-04-01")],
            &[],
            "2024-06-03".parse().unwrap(),
        );
        assert!(!restrictions.is_restricted_from_buying("VTI"));
    }

    #[test]
    fn test_recent_lots_of_loss_seller_are_restricted() {
        let lots = vec![
            lot("fresh", "VTI", "2024-05-25", 10.0),
            lot("old", "VTI", "2023-01-10", 20.0),
        ];
        let restrictions = WashSaleRestrictions::build(
            &[],
            &[loss_sale("VTI", "2024-05-20")],
            &lots,
            "2024-06-03".parse().unwrap(),
        );
        let restricted = restrictions.restricted_lots("VTI");
        assert_eq!(restricted.len(), 1);
        assert_eq!(restricted[0].tax_lot_id, "fresh");
        assert!(restrictions.is_lot_restricted("VTI", "fresh"));
        assert!(!restrictions.is_lot_restricted("VTI", "old"));
    }

    #[test]
    fn test_explicit_entries_merge() {
        let lots = vec![lot("l1", "BND", "2024-05-01", 4.0)];
        let restrictions = WashSaleRestrictions::build(
            &[WashSaleEntry {
                identifier: "bnd".into(),
                restricted_from_buying: true,
                restricted_lot_ids: vec!["l1".into(), "ghost".into()],
            }],
            &[],
            &lots,
            "2024-06-03".parse().unwrap(),
        );
        assert!(restrictions.is_restricted_from_buying("BND"));
        assert_eq!(restrictions.restricted_lots("BND").len(), 1);
    }
}
