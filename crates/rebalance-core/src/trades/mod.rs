//! From solver values to executable trades: extraction with gain-loss and
//! cost metadata, cash-preserving rounding, cross-strategy netting, and
//! application back onto a portfolio.

pub mod applier;
pub mod extractor;
pub mod netting;
pub mod rounding;

pub use applier::{apply_trades_to_portfolio, AppliedTrades};
pub use extractor::extract_trades;
pub use netting::{net_trades_across_strategies, NettedTrade};
pub use rounding::smart_round_trades;
