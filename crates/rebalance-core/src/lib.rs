pub mod calendar;
pub mod constraints;
pub mod engine;
pub mod error;
pub mod initializers;
pub mod objectives;
pub mod optimizer;
pub mod reports;
pub mod strategy;
pub mod trades;
pub mod types;
pub mod withdrawal;

pub use error::RebalanceError;
pub use types::*;

/// Standard result type for all rebalancing operations
pub type RebalanceResult<T> = Result<T, RebalanceError>;
