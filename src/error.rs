//! Error types for stub configuration and request verification.

use crate::verify::CountMatch;
use thiserror::Error;

/// A stub or request pattern could not be turned into something the engine can run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid regex `{pattern}`: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid status code: {0}")]
    InvalidStatus(u16),

    #[error("stub {index}: {source}")]
    Stub {
        index: usize,
        #[source]
        source: Box<ConfigError>,
    },

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// A verification over the request log did not hold.
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("invalid verification pattern: {0}")]
    InvalidPattern(#[from] ConfigError),

    #[error("expected {expected} matching requests but received {actual}")]
    CountMismatch { expected: CountMatch, actual: usize },
}
