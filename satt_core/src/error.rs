use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AttError {
    #[error("channel error: {0}")]
    Channel(String),
    #[error("channel disconnected: {0}")]
    Disconnected(String),
    #[error("setpoint {value} outside [{low}, {high}]")]
    OutOfRange { value: f64, low: f64, high: f64 },
    #[error("expected {expected} blade readbacks, got {found}")]
    BladeCount { expected: usize, found: usize },
    #[error("no channel bound to {0}")]
    MissingChannel(String),
    #[error("not supported by this attenuator: {0}")]
    Unsupported(&'static str),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing blade reader")]
    MissingBlades,
    #[error("missing transmission bounds reader")]
    MissingBounds,
    #[error("missing command sink")]
    MissingSink,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
