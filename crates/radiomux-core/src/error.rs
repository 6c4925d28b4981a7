//! Error taxonomy for the scan engine.
//!
//! Each variant corresponds to a row in the error handling design: config
//! errors abort startup, registry errors are handed back to the caller
//! (UI/CLI), and everything reachable from the scan loop or the logger
//! dispatch is recovered locally and only logged.

use thiserror::Error;

/// A frequency entry failed validation at construction time.
#[derive(Debug, Error, PartialEq)]
pub enum FrequencyError {
    #[error("priority must be an integer >= 1, got {0}")]
    InvalidPriority(i64),
    #[error("range lower bound {lo} must be less than upper bound {hi}")]
    InvalidRange { lo: f64, hi: f64 },
    #[error("frequencies must be non-negative, got {0}")]
    NegativeFrequency(f64),
    #[error("entry must specify either `single` or both `lo` and `hi`, not both or neither")]
    AmbiguousSpecification,
}

/// Errors surfaced by [`crate::registry::FrequencyRegistry`] mutation.
#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error(transparent)]
    Invalid(#[from] FrequencyError),
    #[error("frequency entry already occurs in the registry")]
    DuplicateEntry,
    #[error("no matching frequency entry found")]
    NotFound,
}

/// Hardware-facing error: surfaced at startup or mid-run, process exits with code 1.
#[derive(Debug, Error)]
pub enum HardwareError {
    #[error("failed to initialize receiver: {0}")]
    Init(String),
    #[error("failed to tune receiver: {0}")]
    Tune(String),
}

/// A channel event could not be delivered to its logger. Recovered locally:
/// logged as an error and the scan loop continues.
#[derive(Debug, Error)]
pub enum LogDeliveryError {
    #[error("i/o error writing channel log: {0}")]
    Io(String),
    #[error("error delivering channel log: {0}")]
    Transport(String),
}
