//! Registered stub rules.

use crate::config::{ResponseDefinition, StubDefinition};
use crate::error::ConfigError;
use crate::matcher::RequestPattern;
use crate::request::IncomingRequest;
use serde::Serialize;
use std::cmp::{Ordering, Reverse};
use std::fmt;

/// Identifier assigned at registration. Later registrations get larger ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct StubId(pub u64);

impl fmt::Display for StubId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stub priority. Any explicit priority outranks `Normal`; among explicit
/// priorities the lower value wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Priority {
    Explicit(u32),
    Normal,
}

impl Priority {
    pub fn from_option(priority: Option<u32>) -> Self {
        priority.map_or(Priority::Normal, Priority::Explicit)
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Priority::Explicit(a), Priority::Explicit(b)) => a.cmp(b),
            (Priority::Explicit(_), Priority::Normal) => Ordering::Less,
            (Priority::Normal, Priority::Explicit(_)) => Ordering::Greater,
            (Priority::Normal, Priority::Normal) => Ordering::Equal,
        }
    }
}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Explicit(p) => write!(f, "{}", p),
            Priority::Normal => f.write_str("normal"),
        }
    }
}

/// An immutable, compiled stub.
#[derive(Debug, Clone)]
pub struct StubRule {
    id: StubId,
    name: Option<String>,
    pattern: RequestPattern,
    priority: Priority,
    response: ResponseDefinition,
}

impl StubRule {
    /// Compile a definition into a rule with the given id.
    pub(crate) fn compile(id: StubId, def: &StubDefinition) -> Result<Self, ConfigError> {
        let pattern = RequestPattern::compile(&def.request)?;
        def.response.validate()?;

        Ok(Self {
            id,
            name: def.name.clone(),
            pattern,
            priority: Priority::from_option(def.priority),
            response: def.response.clone(),
        })
    }

    pub fn id(&self) -> StubId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn pattern(&self) -> &RequestPattern {
        &self.pattern
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn response(&self) -> &ResponseDefinition {
        &self.response
    }

    pub fn matches(&self, request: &IncomingRequest) -> bool {
        self.pattern.matches(request)
    }

    /// Ordering key for selection: smallest wins.
    pub fn selection_key(&self) -> (Priority, Reverse<StubId>) {
        (self.priority, Reverse(self.id))
    }
}
