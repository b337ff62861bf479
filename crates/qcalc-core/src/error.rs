use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalcError {
    // Evaluation
    #[error("Unknown function: {0}")]
    UnknownSymbol(String),

    #[error("Mismatched parentheses")]
    MismatchedParentheses,

    #[error("Error: Cannot divide by zero")]
    DivideByZero,

    #[error("Syntax Error: {0}")]
    Syntax(String),

    #[error("Invalid arguments for {0}()")]
    InvalidArguments(String),

    #[error("{0}")]
    Evaluation(String),

    // Input validation
    #[error("'{0}' is not a valid number.")]
    InvalidNumber(String),

    #[error("{0}")]
    OutOfRange(String),

    #[error("This solver currently supports linear and quadratic equations only (up to x^2), got degree {0}.")]
    UnsupportedDegree(usize),

    #[error("{0}")]
    InvalidInput(String),

    // Infrastructure
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("network error: {0}")]
    Network(String),

    #[error("config error: {0}")]
    Config(String),
}

pub type CalcResult<T> = Result<T, CalcError>;

impl CalcError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
