use thiserror::Error;

#[derive(Debug, Error)]
pub enum RebalanceError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("{validator} validation requires knowledge of the full trade set")]
    RequiresFullTradeSet { validator: String },

    #[error("Solver failure: {0}")]
    Solver(String),

    #[error("Netting failure: {0}")]
    Netting(String),

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Date error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for RebalanceError {
    fn from(e: serde_json::Error) -> Self {
        RebalanceError::SerializationError(e.to_string())
    }
}
