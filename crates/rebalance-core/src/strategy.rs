use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use crate::constraints::{ConstraintManager, TradeCheck, WashSaleEntry, WashSaleRestrictions};
use crate::error::RebalanceError;
use crate::initializers::{
    initialize_closed_lots, initialize_factor_model, initialize_prices, initialize_spreads,
    initialize_stock_restrictions, initialize_targets, initialize_tax_lots, initialize_tax_rates,
    AssetClassTarget, ClosedLot, FactorBundle, Price, PriceTable, RawFactorRow, RawSpread,
    RawTaxLot, SpreadTable, StockRestriction, TaxLot, TaxRate, TaxRateTable,
};
use crate::reports::{
    generate_actuals_report, generate_drift_report, generate_gain_loss_report, ActualPosition,
    DriftRow, GainLossRow,
};
use crate::trades::applier::apply_trades_to_portfolio;
use crate::types::{canonical_identifier, ObjectiveWeights, OptimizationType, Trade, CASH_ID};
use crate::RebalanceResult;

/// Tunables of one strategy solve.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategySettings {
    pub withdrawal_amount: f64,
    pub min_cash: f64,
    pub min_notional: f64,
    pub trade_rounding: u32,
    pub holding_time_days: i64,
    pub enforce_wash_sale_prevention: bool,
    pub range_min_weight_multiplier: f64,
    pub range_max_weight_multiplier: f64,
    pub deminimus_cash_target: f64,
    pub weights: ObjectiveWeights,
}

impl Default for StrategySettings {
    fn default() -> Self {
        StrategySettings {
            withdrawal_amount: 0.0,
            min_cash: 0.0,
            min_notional: 0.0,
            trade_rounding: 4,
            holding_time_days: 0,
            enforce_wash_sale_prevention: true,
            range_min_weight_multiplier: 0.5,
            range_max_weight_multiplier: 2.0,
            deminimus_cash_target: 0.0,
            weights: ObjectiveWeights::default(),
        }
    }
}

/// The raw input tables of one strategy, exactly as supplied by the caller.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StrategyInputs {
    pub tax_lots: Vec<RawTaxLot>,
    pub targets: Vec<AssetClassTarget>,
    pub prices: Vec<Price>,
    #[serde(default)]
    pub spreads: Vec<RawSpread>,
    #[serde(default)]
    pub stock_restrictions: Vec<StockRestriction>,
    #[serde(default)]
    pub tax_rates: Vec<TaxRate>,
    #[serde(default)]
    pub closed_lots: Vec<ClosedLot>,
    #[serde(default)]
    pub factor_model: Vec<RawFactorRow>,
    #[serde(default)]
    pub wash_sale_restrictions: Vec<WashSaleEntry>,
}

/// A validated portfolio strategy: canonical tables plus the derived
/// reports. Immutable after construction; applying trades returns a new
/// strategy.
#[derive(Debug, Clone)]
pub struct Strategy {
    pub strategy_id: String,
    pub optimization_type: OptimizationType,
    pub current_date: NaiveDate,
    pub settings: StrategySettings,

    /// Cash balance, folded out of the supplied `CASH` lots.
    pub cash: f64,
    /// Non-cash tax lots.
    pub tax_lots: Vec<TaxLot>,
    pub targets: Vec<AssetClassTarget>,
    pub prices: PriceTable,
    pub spreads: SpreadTable,
    pub stock_restrictions: Vec<StockRestriction>,
    pub tax_rates: Arc<TaxRateTable>,
    pub closed_lots: Vec<ClosedLot>,
    pub wash_sale_entries: Vec<WashSaleEntry>,

    // Derived state, recomputed whenever the portfolio changes.
    pub wash_sales: WashSaleRestrictions,
    pub actuals: Vec<ActualPosition>,
    pub drift: Vec<DriftRow>,
    pub gain_loss: Vec<GainLossRow>,
    pub factor: Option<Arc<FactorBundle>>,

    lot_index: HashMap<String, usize>,
}

impl Strategy {
    pub fn new(
        strategy_id: impl Into<String>,
        optimization_type: OptimizationType,
        current_date: NaiveDate,
        settings: StrategySettings,
        inputs: StrategyInputs,
    ) -> RebalanceResult<Strategy> {
        if settings.withdrawal_amount > 0.0 && !optimization_type.can_handle_withdrawal() {
            return Err(RebalanceError::InvalidInput {
                field: "withdrawal_amount".into(),
                reason: format!(
                    "{} strategies cannot process withdrawals",
                    optimization_type.as_str()
                ),
            });
        }
        if optimization_type == OptimizationType::DirectIndex && inputs.factor_model.is_empty() {
            return Err(RebalanceError::InvalidInput {
                field: "factor_model".into(),
                reason: "DIRECT_INDEX strategies require a factor model".into(),
            });
        }

        let all_lots = initialize_tax_lots(inputs.tax_lots, current_date)?;
        let cash: f64 = all_lots
            .iter()
            .filter(|l| l.identifier == CASH_ID)
            .map(|l| l.quantity)
            .sum();
        let tax_lots: Vec<TaxLot> = all_lots
            .into_iter()
            .filter(|l| l.identifier != CASH_ID)
            .collect();

        let mut all_identifiers: BTreeSet<String> = tax_lots
            .iter()
            .map(|l| l.identifier.clone())
            .collect();
        for target in &inputs.targets {
            for id in &target.identifiers {
                all_identifiers.insert(canonical_identifier(id));
            }
        }
        all_identifiers.insert(CASH_ID.to_string());

        let prices = initialize_prices(inputs.prices, &all_identifiers)?;

        let position_value: f64 = tax_lots
            .iter()
            .map(|l| l.quantity * prices.get(&l.identifier).unwrap_or(0.0))
            .sum();
        let total_value = cash + position_value;
        let withdraw_target = if settings.withdrawal_amount > 0.0 && total_value > 0.0 {
            (settings.withdrawal_amount / total_value).min(1.0)
        } else {
            0.0
        };

        let targets = initialize_targets(
            inputs.targets,
            withdraw_target,
            settings.deminimus_cash_target,
        )?;
        let spreads = initialize_spreads(inputs.spreads, &all_identifiers, &prices)?;
        let stock_restrictions = initialize_stock_restrictions(inputs.stock_restrictions)?;
        let tax_rates = Arc::new(initialize_tax_rates(inputs.tax_rates)?);
        let closed_lots = initialize_closed_lots(inputs.closed_lots)?;

        let mut strategy = Strategy {
            strategy_id: strategy_id.into(),
            optimization_type,
            current_date,
            settings,
            cash,
            tax_lots,
            targets,
            prices,
            spreads,
            stock_restrictions,
            tax_rates,
            closed_lots,
            wash_sale_entries: inputs.wash_sale_restrictions,
            wash_sales: WashSaleRestrictions::default(),
            actuals: Vec::new(),
            drift: Vec::new(),
            gain_loss: Vec::new(),
            factor: None,
            lot_index: HashMap::new(),
        };
        strategy.derive_reports()?;

        if !inputs.factor_model.is_empty() {
            let bundle =
                initialize_factor_model(inputs.factor_model, &strategy.targets, &strategy.actuals)?;
            strategy.factor = Some(Arc::new(bundle));
        }

        Ok(strategy)
    }

    fn derive_reports(&mut self) -> RebalanceResult<()> {
        self.lot_index = self
            .tax_lots
            .iter()
            .enumerate()
            .map(|(i, l)| (l.tax_lot_id.clone(), i))
            .collect();
        self.actuals = generate_actuals_report(&self.tax_lots, &self.prices, self.cash)?;
        self.drift = generate_drift_report(&self.targets, &self.actuals);
        self.gain_loss = generate_gain_loss_report(
            &self.tax_lots,
            &self.prices,
            self.current_date,
            &self.tax_rates,
        )?;
        self.wash_sales = WashSaleRestrictions::build(
            &self.wash_sale_entries,
            &self.closed_lots,
            &self.tax_lots,
            self.current_date,
        );
        if let Some(bundle) = &self.factor {
            self.factor = Some(Arc::new(bundle.with_actuals(&self.actuals)));
        }
        Ok(())
    }

    /// Total portfolio value including cash.
    pub fn total_value(&self) -> f64 {
        self.actuals.iter().map(|p| p.market_value).sum()
    }

    /// Candidate buy identifiers: every identifier the targets mention, in
    /// target order, cash included.
    pub fn target_identifiers(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for target in &self.targets {
            for id in &target.identifiers {
                if seen.insert(id.clone()) {
                    out.push(id.clone());
                }
            }
        }
        out
    }

    pub fn lot(&self, tax_lot_id: &str) -> Option<&TaxLot> {
        self.lot_index.get(tax_lot_id).map(|&i| &self.tax_lots[i])
    }

    /// Total held quantity of one identifier across its lots.
    pub fn held_quantity(&self, identifier: &str) -> f64 {
        self.tax_lots
            .iter()
            .filter(|l| l.identifier == identifier)
            .map(|l| l.quantity)
            .sum()
    }

    pub fn asset_class_of(&self, identifier: &str) -> Option<&str> {
        self.targets
            .iter()
            .find(|t| t.identifiers.iter().any(|id| id == identifier))
            .map(|t| t.asset_class.as_str())
    }

    /// Replacement identifiers of the two-identifier asset classes (the
    /// harvest pair's second leg).
    pub fn tlh_replacements(&self) -> HashSet<&str> {
        self.targets
            .iter()
            .filter(|t| t.identifiers.len() == 2)
            .map(|t| t.identifiers[1].as_str())
            .collect()
    }

    /// Whether the identifier's asset class carries a replacement leg it
    /// could harvest into.
    pub fn has_replacement_for(&self, identifier: &str) -> bool {
        self.targets.iter().any(|t| {
            t.identifiers.len() == 2
                && t.identifiers.iter().any(|id| id == identifier)
                && t.identifiers[1] != identifier
        })
    }

    pub fn cash_drift_row(&self) -> Option<&DriftRow> {
        self.drift.iter().find(|r| r.asset_class == CASH_ID)
    }

    /// Per-trade admissibility of a proposed buy, using the validators
    /// that can judge a trade in isolation.
    pub fn validate_buy(&self, identifier: &str, quantity: f64) -> TradeCheck {
        ConstraintManager::for_rebalance(self).check_buy(self, identifier, quantity)
    }

    /// Per-trade admissibility of a proposed sell.
    pub fn validate_sell(&self, tax_lot_id: &str, quantity: f64) -> TradeCheck {
        ConstraintManager::for_rebalance(self).check_sell(self, tax_lot_id, quantity)
    }

    /// Execute a trade set, returning the post-trade strategy with all
    /// reports recomputed and the closed-lot history extended.
    pub fn apply_trades(&self, trades: &[Trade]) -> RebalanceResult<Strategy> {
        let applied =
            apply_trades_to_portfolio(&self.tax_lots, trades, self.cash, self.current_date);
        let mut next = self.clone();
        next.tax_lots = applied.tax_lots;
        next.cash = applied.cash;
        next.closed_lots.extend(applied.closed_lots);
        next.derive_reports()?;
        Ok(next)
    }

    /// The liquidation variant used by the max-withdrawal driver. In
    /// non-preserving mode every non-cash target drops to zero and cash
    /// becomes the whole target. The holding window is lifted in both
    /// modes; the cash floor stays and is paid back out of the reported
    /// withdrawal capacity.
    pub fn liquidation_clone(&self, preserve_targets: bool) -> RebalanceResult<Strategy> {
        let mut next = self.clone();
        next.settings.withdrawal_amount = 0.0;
        next.settings.holding_time_days = 0;
        if !preserve_targets {
            for target in &mut next.targets {
                target.target_weight = if target.asset_class == CASH_ID { 1.0 } else { 0.0 };
            }
        }
        next.derive_reports()?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn raw_lot(id: &str, identifier: &str, quantity: f64, cost: f64, date: &str) -> RawTaxLot {
        RawTaxLot {
            tax_lot_id: Some(id.into()),
            identifier: identifier.into(),
            quantity,
            cost_basis: cost,
            date: d(date),
        }
    }

    fn target(class: &str, weight: f64, ids: &[&str]) -> AssetClassTarget {
        AssetClassTarget {
            asset_class: class.into(),
            target_weight: weight,
            identifiers: ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn price(identifier: &str, value: f64) -> Price {
        Price {
            identifier: identifier.into(),
            price: value,
        }
    }

    fn basic_inputs() -> StrategyInputs {
        StrategyInputs {
            tax_lots: vec![
                raw_lot("l1", "VTI", 9.0, 810.0, "2023-01-10"),
                raw_lot("cash", "CASH", 100.0, 100.0, "2023-01-10"),
            ],
            targets: vec![target("equity", 1.0, &["VTI"])],
            prices: vec![price("VTI", 100.0)],
            ..Default::default()
        }
    }

    fn build(inputs: StrategyInputs) -> Strategy {
        Strategy::new(
            "test",
            OptimizationType::TaxAware,
            d("2024-06-03"),
            StrategySettings::default(),
            inputs,
        )
        .unwrap()
    }

    #[test]
    fn test_cash_folds_out_of_lots() {
        let strategy = build(basic_inputs());
        assert_eq!(strategy.cash, 100.0);
        assert_eq!(strategy.tax_lots.len(), 1);
        assert!((strategy.total_value() - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_reports_derived_on_construction() {
        let strategy = build(basic_inputs());
        assert_eq!(strategy.actuals.len(), 2);
        assert_eq!(strategy.gain_loss.len(), 1);
        assert!(strategy.cash_drift_row().is_some());
        let equity = strategy
            .drift
            .iter()
            .find(|r| r.asset_class == "EQUITY")
            .unwrap();
        assert!((equity.actual_weight - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_withdrawal_rejected_for_buy_only() {
        let mut settings = StrategySettings::default();
        settings.withdrawal_amount = 100.0;
        let err = Strategy::new(
            "test",
            OptimizationType::BuyOnly,
            d("2024-06-03"),
            settings,
            basic_inputs(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("cannot process withdrawals"));
    }

    #[test]
    fn test_direct_index_requires_factor_model() {
        let err = Strategy::new(
            "test",
            OptimizationType::DirectIndex,
            d("2024-06-03"),
            StrategySettings::default(),
            basic_inputs(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("factor model"));
    }

    #[test]
    fn test_withdrawal_raises_cash_target() {
        let mut settings = StrategySettings::default();
        settings.withdrawal_amount = 200.0;
        let strategy = Strategy::new(
            "test",
            OptimizationType::TaxAware,
            d("2024-06-03"),
            settings,
            basic_inputs(),
        )
        .unwrap();
        let cash_target = strategy.cash_drift_row().unwrap().target_weight;
        assert!((cash_target - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_apply_trades_returns_new_strategy() {
        let strategy = build(basic_inputs());
        let trades = vec![Trade {
            identifier: "VTI".into(),
            tax_lot_id: Some("l1".into()),
            action: crate::types::TradeAction::Sell,
            quantity: 4.0,
            lot_quantity: 9.0,
            price: 100.0,
            trade_value: 400.0,
            gain_loss: crate::types::TradeGainLoss {
                cost_basis: 360.0,
                realized_gain: 40.0,
                gain_type: Some(crate::types::GainType::LongTerm),
                is_tlh_trade: false,
                tax_cost: 0.0,
            },
            transaction: crate::types::TradeTransaction {
                spread: 0.0,
                transaction_cost: 0.0,
            },
        }];
        let next = strategy.apply_trades(&trades).unwrap();

        // Original untouched.
        assert_eq!(strategy.tax_lots[0].quantity, 9.0);
        assert!((next.cash - 500.0).abs() < 1e-9);
        assert!((next.lot("l1").unwrap().quantity - 5.0).abs() < 1e-9);
        assert_eq!(next.closed_lots.len(), 1);

        // Weight conservation after the round trip.
        let total: f64 = next.actuals.iter().map(|p| p.actual_weight).sum();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_liquidation_clone_rewrites_targets() {
        let strategy = build(basic_inputs());
        let liquidation = strategy.liquidation_clone(false).unwrap();
        let cash_row = liquidation.cash_drift_row().unwrap();
        assert!((cash_row.target_weight - 1.0).abs() < 1e-9);
        let equity = liquidation
            .drift
            .iter()
            .find(|r| r.asset_class == "EQUITY")
            .unwrap();
        assert_eq!(equity.target_weight, 0.0);
    }

    #[test]
    fn test_tlh_replacements() {
        let mut inputs = basic_inputs();
        inputs.targets = vec![target("equity", 1.0, &["VTI", "VOO"])];
        inputs.prices.push(price("VOO", 200.0));
        let strategy = build(inputs);
        let replacements = strategy.tlh_replacements();
        assert!(replacements.contains("VOO"));
        assert!(!replacements.contains("VTI"));
        assert!(strategy.has_replacement_for("VTI"));
        assert!(!strategy.has_replacement_for("VOO"));
    }

    #[test]
    fn test_held_quantity_sums_lots() {
        let mut inputs = basic_inputs();
        inputs
            .tax_lots
            .push(raw_lot("l2", "VTI", 3.0, 300.0, "2024-05-01"));
        let strategy = build(inputs);
        assert!((strategy.held_quantity("VTI") - 12.0).abs() < 1e-12);
    }
}
