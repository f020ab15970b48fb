//! Input-table validation and canonicalization. Each initializer is a total
//! function: it either returns a canonical, fully-typed table or fails with
//! an error naming the offending rows. No partial acceptance.

pub mod closed_lots;
pub mod factor_model;
pub mod prices;
pub mod spreads;
pub mod stock_restrictions;
pub mod targets;
pub mod tax_lots;
pub mod tax_rates;

pub use closed_lots::{initialize_closed_lots, ClosedLot};
pub use factor_model::{initialize_factor_model, FactorBundle, FactorModel, RawFactorRow};
pub use prices::{initialize_prices, Price, PriceTable};
pub use spreads::{initialize_spreads, RawSpread, Spread, SpreadTable};
pub use stock_restrictions::{initialize_stock_restrictions, StockRestriction};
pub use targets::{initialize_targets, AssetClassTarget};
pub use tax_lots::{initialize_tax_lots, RawTaxLot, TaxLot};
pub use tax_rates::{initialize_tax_rates, TaxRate, TaxRateTable};
