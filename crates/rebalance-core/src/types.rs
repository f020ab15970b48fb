use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::RebalanceError;

/// Monetary values and prices. The optimizer works in floating point end to
/// end; exact decimal arithmetic is confined to trade-quantity rounding.
pub type Money = f64;

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = f64;

/// Share or unit counts. Fractional quantities are allowed before rounding.
pub type Quantity = f64;

/// The distinguished cash identifier. Cash always prices at 1.0.
pub const CASH_ID: &str = "CASH";

/// Alternate spellings that collapse to [`CASH_ID`].
pub const CASH_ALIASES: [&str; 2] = ["CASH", "CASH_AC"];

/// Normalize an identifier: uppercase, cash aliases collapsed.
pub fn canonical_identifier(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    if CASH_ALIASES.contains(&upper.as_str()) {
        CASH_ID.to_string()
    } else {
        upper
    }
}

/// Tax treatment of a realized or unrealized gain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GainType {
    ShortTerm,
    LongTerm,
    QualifiedDividend,
}

impl GainType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GainType::ShortTerm => "short_term",
            GainType::LongTerm => "long_term",
            GainType::QualifiedDividend => "qualified_dividend",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeAction {
    Buy,
    Sell,
}

/// Gain/loss metadata attached to every extracted trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeGainLoss {
    pub cost_basis: Money,
    pub realized_gain: Money,
    pub gain_type: Option<GainType>,
    pub is_tlh_trade: bool,
    pub tax_cost: Money,
}

/// Transaction-cost metadata attached to every extracted trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeTransaction {
    pub spread: Rate,
    pub transaction_cost: Money,
}

/// A single buy or sell produced by the optimizer. Sells always reference a
/// tax lot; buys never do.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub identifier: String,
    pub tax_lot_id: Option<String>,
    pub action: TradeAction,
    pub quantity: Quantity,
    /// Full quantity of the referenced lot (equal to `quantity` for buys).
    pub lot_quantity: Quantity,
    pub price: Money,
    pub trade_value: Money,
    pub gain_loss: TradeGainLoss,
    pub transaction: TradeTransaction,
}

/// Relative weights of the objective components. The optimization type remaps
/// these before the objective is assembled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectiveWeights {
    pub tax: f64,
    pub drift: f64,
    pub transaction: f64,
    pub factor: f64,
    pub cash: f64,
}

impl Default for ObjectiveWeights {
    fn default() -> Self {
        ObjectiveWeights {
            tax: 1.0,
            drift: 1.0,
            transaction: 1.0,
            factor: 1.0,
            cash: 1.0,
        }
    }
}

/// The rebalancing styles the engine supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptimizationType {
    /// No trades allowed.
    Hold,
    /// Only buys allowed, no sells.
    BuyOnly,
    /// Rebalance towards targets ignoring tax implications.
    TaxUnaware,
    /// Rebalance considering tax implications.
    TaxAware,
    /// Tax-loss harvesting across asset-class pairs.
    PairsTlh,
    /// Direct indexing with factor tracking.
    DirectIndex,
}

impl FromStr for OptimizationType {
    type Err = RebalanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "HOLD" => Ok(OptimizationType::Hold),
            "BUY_ONLY" => Ok(OptimizationType::BuyOnly),
            "TAX_UNAWARE" => Ok(OptimizationType::TaxUnaware),
            "TAX_AWARE" => Ok(OptimizationType::TaxAware),
            "PAIRS_TLH" => Ok(OptimizationType::PairsTlh),
            "DIRECT_INDEX" => Ok(OptimizationType::DirectIndex),
            other => Err(RebalanceError::InvalidInput {
                field: "optimization_type".into(),
                reason: format!("unknown optimization type '{other}'"),
            }),
        }
    }
}

impl OptimizationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizationType::Hold => "HOLD",
            OptimizationType::BuyOnly => "BUY_ONLY",
            OptimizationType::TaxUnaware => "TAX_UNAWARE",
            OptimizationType::TaxAware => "TAX_AWARE",
            OptimizationType::PairsTlh => "PAIRS_TLH",
            OptimizationType::DirectIndex => "DIRECT_INDEX",
        }
    }

    pub fn allows_sells(&self) -> bool {
        !matches!(self, OptimizationType::Hold | OptimizationType::BuyOnly)
    }

    /// Whether this style pursues tax-loss harvesting. Harvesting strategies
    /// mark replacement buys and loss sells as TLH trades on extraction.
    pub fn should_tlh(&self) -> bool {
        matches!(
            self,
            OptimizationType::PairsTlh | OptimizationType::DirectIndex
        )
    }

    pub fn can_handle_withdrawal(&self) -> bool {
        !matches!(self, OptimizationType::Hold | OptimizationType::BuyOnly)
    }

    /// Remap the configured component weights for this style.
    pub fn adjust_weights(&self, weights: ObjectiveWeights) -> ObjectiveWeights {
        match self {
            OptimizationType::Hold => ObjectiveWeights {
                tax: 0.0,
                drift: 0.0,
                transaction: 0.0,
                factor: 0.0,
                cash: 0.0,
            },
            OptimizationType::BuyOnly | OptimizationType::TaxUnaware => ObjectiveWeights {
                tax: 0.0,
                factor: 0.0,
                ..weights
            },
            OptimizationType::TaxAware | OptimizationType::PairsTlh => ObjectiveWeights {
                factor: 0.0,
                ..weights
            },
            OptimizationType::DirectIndex => weights,
        }
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "f64_milp".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_canonical_identifier_uppercases() {
        assert_eq!(canonical_identifier(" vti "), "VTI");
    }

    #[test]
    fn test_cash_aliases_collapse() {
        assert_eq!(canonical_identifier("cash"), CASH_ID);
        assert_eq!(canonical_identifier("Cash_AC"), CASH_ID);
    }

    #[test]
    fn test_optimization_type_from_str() {
        assert_eq!(
            "tax_aware".parse::<OptimizationType>().unwrap(),
            OptimizationType::TaxAware
        );
        assert_eq!(
            "PAIRS_TLH".parse::<OptimizationType>().unwrap(),
            OptimizationType::PairsTlh
        );
        assert!("TLH_MAX".parse::<OptimizationType>().is_err());
    }

    #[test]
    fn test_hold_zeroes_all_weights() {
        let w = OptimizationType::Hold.adjust_weights(ObjectiveWeights::default());
        assert_eq!(w.tax, 0.0);
        assert_eq!(w.drift, 0.0);
        assert_eq!(w.transaction, 0.0);
        assert_eq!(w.factor, 0.0);
        assert_eq!(w.cash, 0.0);
    }

    #[test]
    fn test_tax_unaware_zeroes_tax() {
        let w = OptimizationType::TaxUnaware.adjust_weights(ObjectiveWeights::default());
        assert_eq!(w.tax, 0.0);
        assert_eq!(w.drift, 1.0);
        assert_eq!(w.factor, 0.0);
    }

    #[test]
    fn test_direct_index_keeps_factor_weight() {
        let w = OptimizationType::DirectIndex.adjust_weights(ObjectiveWeights::default());
        assert_eq!(w.factor, 1.0);
        assert_eq!(w.tax, 1.0);
    }

    #[test]
    fn test_sells_and_withdrawal_dispatch() {
        assert!(!OptimizationType::Hold.allows_sells());
        assert!(!OptimizationType::BuyOnly.allows_sells());
        assert!(OptimizationType::TaxAware.allows_sells());
        assert!(!OptimizationType::BuyOnly.can_handle_withdrawal());
        assert!(OptimizationType::DirectIndex.can_handle_withdrawal());
        assert!(OptimizationType::PairsTlh.should_tlh());
        assert!(!OptimizationType::TaxAware.should_tlh());
    }
}
