use thiserror::Error;

/// Error type shared by the statistical core and the execution layer
#[derive(Error, Debug)]
pub enum Error {
    #[error("No data: {0}")]
    EmptyData(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Length mismatch: expected {expected}, actual {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Variable '{variable}' contains a non-numeric value: {value}")]
    NonNumeric { variable: String, value: String },

    #[error("Invalid case weight at row {index}: {value}")]
    InvalidWeight { index: usize, value: f64 },

    #[error("Singular matrix: {0}")]
    SingularMatrix(String),

    #[error("Zero variance: {0}")]
    ZeroVariance(String),

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Unknown compute module: {0}")]
    UnknownModule(String),

    #[error("Module '{module}' has no method '{method}'")]
    UnknownMethod { module: String, method: String },

    #[error("Compute unit terminated: {0}")]
    UnitTerminated(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Error::ComputationError(format!("lock poisoned: {}", err))
    }
}
