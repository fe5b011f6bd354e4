use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("channel {0} is disconnected")]
    Disconnected(String),
    #[error("channel {channel}: expected a number, got {found:?}")]
    NotNumeric { channel: String, found: String },
    #[error("put to {0} rejected (read-only channel)")]
    ReadOnly(String),
}

pub type Result<T> = std::result::Result<T, HwError>;
