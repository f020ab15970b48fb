//! Validators. Each one both (a) judges a single proposed trade and
//! (b) emits linear constraints into the problem. Validators whose
//! admissibility depends on the entire trade set only contribute through
//! the problem form and answer per-trade queries with a typed error.

pub mod cash;
pub mod drift_range;
pub mod holding_time;
pub mod min_notional;
pub mod no_buy;
pub mod no_simultaneous;
pub mod restrictions;
pub mod withdrawal;

use serde::Serialize;

use crate::error::RebalanceError;
use crate::optimizer::{DecisionVars, ProblemBuilder};
use crate::strategy::Strategy;
use crate::RebalanceResult;

pub use restrictions::{RestrictedLot, WashSaleEntry, WashSaleRestrictions};

/// Admissibility of one proposed trade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TradeCheck {
    Allowed,
    Rejected(String),
}

impl TradeCheck {
    pub fn is_allowed(&self) -> bool {
        matches!(self, TradeCheck::Allowed)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            TradeCheck::Allowed => None,
            TradeCheck::Rejected(reason) => Some(reason),
        }
    }
}

/// The constraint contributors, composed in a fixed order.
#[derive(Debug, Clone, PartialEq)]
pub enum Validator {
    Cash { min_cash: f64 },
    Withdrawal { amount: f64 },
    DriftRange { min_multiplier: f64, max_multiplier: f64 },
    HoldingTime { days: i64 },
    Restrictions { enforce_wash_sales: bool },
    MinNotional { amount: f64 },
    NoSimultaneousTrade,
    NoBuy { exclude_cash: bool },
}

impl Validator {
    pub fn name(&self) -> &'static str {
        match self {
            Validator::Cash { .. } => "cash",
            Validator::Withdrawal { .. } => "withdrawal",
            Validator::DriftRange { .. } => "drift_range",
            Validator::HoldingTime { .. } => "holding_time",
            Validator::Restrictions { .. } => "restrictions",
            Validator::MinNotional { .. } => "min_notional",
            Validator::NoSimultaneousTrade => "no_simultaneous_trade",
            Validator::NoBuy { .. } => "no_buy",
        }
    }

    fn requires_full_trade_set(&self) -> bool {
        matches!(
            self,
            Validator::Cash { .. }
                | Validator::Withdrawal { .. }
                | Validator::DriftRange { .. }
                | Validator::NoSimultaneousTrade
        )
    }

    /// Judge a single proposed buy.
    pub fn validate_buy(
        &self,
        strategy: &Strategy,
        identifier: &str,
        quantity: f64,
    ) -> RebalanceResult<TradeCheck> {
        if self.requires_full_trade_set() {
            return Err(RebalanceError::RequiresFullTradeSet {
                validator: self.name().to_string(),
            });
        }
        match self {
            Validator::HoldingTime { .. } => Ok(TradeCheck::Allowed),
            Validator::Restrictions { enforce_wash_sales } => {
                Ok(restrictions::check_buy(strategy, identifier, *enforce_wash_sales))
            }
            Validator::MinNotional { amount } => {
                min_notional::check_buy(strategy, identifier, quantity, *amount)
            }
            Validator::NoBuy { exclude_cash } => {
                Ok(no_buy::check_buy(identifier, *exclude_cash))
            }
            _ => unreachable!("global validators answered above"),
        }
    }

    /// Judge a single proposed sell.
    pub fn validate_sell(
        &self,
        strategy: &Strategy,
        tax_lot_id: &str,
        quantity: f64,
    ) -> RebalanceResult<TradeCheck> {
        if self.requires_full_trade_set() {
            return Err(RebalanceError::RequiresFullTradeSet {
                validator: self.name().to_string(),
            });
        }
        match self {
            Validator::HoldingTime { days } => {
                holding_time::check_sell(strategy, tax_lot_id, *days)
            }
            Validator::Restrictions { enforce_wash_sales } => {
                restrictions::check_sell(strategy, tax_lot_id, *enforce_wash_sales)
            }
            Validator::MinNotional { amount } => {
                min_notional::check_sell(strategy, tax_lot_id, quantity, *amount)
            }
            Validator::NoBuy { .. } => Ok(TradeCheck::Allowed),
            _ => unreachable!("global validators answered above"),
        }
    }

    /// Emit this validator's constraints into the problem.
    pub fn emit_constraints(
        &self,
        pb: &mut ProblemBuilder,
        vars: &DecisionVars,
        strategy: &Strategy,
    ) -> RebalanceResult<()> {
        match self {
            Validator::Cash { min_cash } => cash::emit(pb, vars, strategy, *min_cash),
            Validator::Withdrawal { amount } => withdrawal::emit(pb, vars, strategy, *amount),
            Validator::DriftRange {
                min_multiplier,
                max_multiplier,
            } => drift_range::emit(pb, vars, strategy, *min_multiplier, *max_multiplier),
            Validator::HoldingTime { days } => holding_time::emit(pb, vars, strategy, *days),
            Validator::Restrictions { enforce_wash_sales } => {
                restrictions::emit(pb, vars, strategy, *enforce_wash_sales)
            }
            Validator::MinNotional { amount } => min_notional::emit(pb, vars, strategy, *amount),
            Validator::NoSimultaneousTrade => no_simultaneous::emit(pb, vars),
            Validator::NoBuy { exclude_cash } => no_buy::emit(pb, vars, *exclude_cash),
        }
    }
}

/// Composes the enabled validators into one constraint set and answers
/// per-trade admissibility questions with the subset that can.
pub struct ConstraintManager {
    validators: Vec<Validator>,
}

impl ConstraintManager {
    /// The standard rebalance composition, in emission order.
    pub fn for_rebalance(strategy: &Strategy) -> ConstraintManager {
        let settings = &strategy.settings;
        ConstraintManager {
            validators: vec![
                Validator::Cash {
                    min_cash: settings.min_cash,
                },
                Validator::Withdrawal {
                    amount: settings.withdrawal_amount,
                },
                Validator::DriftRange {
                    min_multiplier: settings.range_min_weight_multiplier,
                    max_multiplier: settings.range_max_weight_multiplier,
                },
                Validator::HoldingTime {
                    days: settings.holding_time_days,
                },
                Validator::Restrictions {
                    enforce_wash_sales: settings.enforce_wash_sale_prevention,
                },
                Validator::MinNotional {
                    amount: settings.min_notional,
                },
                Validator::NoSimultaneousTrade,
            ],
        }
    }

    /// The liquidation composition used by the max-withdrawal driver:
    /// no buys, no holding-time pinning, everything else preserved.
    pub fn for_liquidation(strategy: &Strategy) -> ConstraintManager {
        let settings = &strategy.settings;
        ConstraintManager {
            validators: vec![
                Validator::Cash {
                    min_cash: settings.min_cash,
                },
                Validator::DriftRange {
                    min_multiplier: settings.range_min_weight_multiplier,
                    max_multiplier: settings.range_max_weight_multiplier,
                },
                Validator::Restrictions {
                    enforce_wash_sales: settings.enforce_wash_sale_prevention,
                },
                Validator::MinNotional {
                    amount: settings.min_notional,
                },
                Validator::NoSimultaneousTrade,
                Validator::NoBuy { exclude_cash: true },
            ],
        }
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    pub fn emit_constraints(
        &self,
        pb: &mut ProblemBuilder,
        vars: &DecisionVars,
        strategy: &Strategy,
    ) -> RebalanceResult<()> {
        for validator in &self.validators {
            validator.emit_constraints(pb, vars, strategy)?;
        }
        Ok(())
    }

    /// Run the per-trade-capable validators against a proposed buy.
    pub fn check_buy(&self, strategy: &Strategy, identifier: &str, quantity: f64) -> TradeCheck {
        for validator in &self.validators {
            if validator.requires_full_trade_set() {
                continue;
            }
            match validator.validate_buy(strategy, identifier, quantity) {
                Ok(TradeCheck::Allowed) => {}
                Ok(rejected) => return rejected,
                Err(_) => {}
            }
        }
        TradeCheck::Allowed
    }

    /// Run the per-trade-capable validators against a proposed sell.
    pub fn check_sell(&self, strategy: &Strategy, tax_lot_id: &str, quantity: f64) -> TradeCheck {
        for validator in &self.validators {
            if validator.requires_full_trade_set() {
                continue;
            }
            match validator.validate_sell(strategy, tax_lot_id, quantity) {
                Ok(TradeCheck::Allowed) => {}
                Ok(rejected) => return rejected,
                Err(_) => {}
            }
        }
        TradeCheck::Allowed
    }
}
