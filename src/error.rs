use std::time::Duration;

use thiserror::Error;

/// Reply grammar failures. Kept separate from [`BearerError`] so the parsers
/// stay free of channel concerns.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("couldn't parse CID from {0} response")]
    InvalidCid(&'static str),

    #[error("couldn't parse a valid IP address from +CGPADDR response")]
    NoValidAddress,

    #[error("malformed {command} record: '{line}'")]
    Malformed { command: &'static str, line: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BearerError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("no carrier")]
    NoCarrier,

    #[error("operation canceled")]
    Canceled,

    #[error("command timed out after {0:?}")]
    Timeout(Duration),

    #[error("wrong state: {0}")]
    WrongState(String),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("{0}")]
    Failed(String),
}

impl BearerError {
    /// True for the reply a modem gives when the link is already gone.
    pub fn is_no_carrier(&self) -> bool {
        matches!(self, BearerError::NoCarrier)
    }
}
