//! Count expectations over the request log.

use crate::error::VerificationError;
use crate::matcher::RequestPattern;
use crate::request_log::RequestLog;
use serde::Serialize;
use std::fmt;

/// How many logged requests a verification expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CountMatch {
    Exactly(usize),
    AtLeast(usize),
    AtMost(usize),
}

impl CountMatch {
    pub fn satisfied_by(&self, actual: usize) -> bool {
        match *self {
            CountMatch::Exactly(n) => actual == n,
            CountMatch::AtLeast(n) => actual >= n,
            CountMatch::AtMost(n) => actual <= n,
        }
    }
}

impl Default for CountMatch {
    fn default() -> Self {
        CountMatch::AtLeast(1)
    }
}

impl fmt::Display for CountMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CountMatch::Exactly(n) => write!(f, "exactly {}", n),
            CountMatch::AtLeast(n) => write!(f, "at least {}", n),
            CountMatch::AtMost(n) => write!(f, "at most {}", n),
        }
    }
}

/// Check that the number of logged requests matching `pattern` meets `expected`.
pub fn verify(
    log: &RequestLog,
    pattern: &RequestPattern,
    expected: CountMatch,
) -> Result<(), VerificationError> {
    let actual = log.count_matching(pattern);
    if expected.satisfied_by(actual) {
        Ok(())
    } else {
        Err(VerificationError::CountMismatch { expected, actual })
    }
}
