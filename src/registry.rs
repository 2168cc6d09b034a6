//! Stub registry.
//!
//! Owns the registered rules and the request log. Registration and reset take
//! the write lock; readers work on an immutable snapshot of the rule list, so
//! a dispatch never sees a half-registered or half-reset state.

use crate::config::StubDefinition;
use crate::error::ConfigError;
use crate::request_log::RequestLog;
use crate::stub::{StubId, StubRule};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

/// Ordered collection of stub rules plus the request log.
#[derive(Debug, Default)]
pub struct StubRegistry {
    state: RwLock<RegistryState>,
    log: RequestLog,
}

#[derive(Debug, Default)]
struct RegistryState {
    rules: Arc<Vec<Arc<StubRule>>>,
    next_id: u64,
}

impl StubRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and register a stub, returning its id.
    ///
    /// A definition that fails to compile is not added and consumes no id.
    pub fn register(&self, def: &StubDefinition) -> Result<StubId, ConfigError> {
        let mut state = self.state.write();
        let id = StubId(state.next_id);
        let rule = StubRule::compile(id, def)?;

        debug!(
            stub_id = %id,
            name = rule.name().unwrap_or(""),
            priority = %rule.priority(),
            pattern = %rule.pattern(),
            "Registered stub"
        );

        Arc::make_mut(&mut state.rules).push(Arc::new(rule));
        state.next_id += 1;
        Ok(id)
    }

    /// Register definitions in order, stopping at the first invalid one.
    pub fn register_all(&self, defs: &[StubDefinition]) -> Result<Vec<StubId>, ConfigError> {
        defs.iter()
            .enumerate()
            .map(|(index, def)| {
                self.register(def).map_err(|e| ConfigError::Stub {
                    index,
                    source: Box::new(e),
                })
            })
            .collect()
    }

    /// Drop every rule and every logged request.
    pub fn reset(&self) {
        let mut state = self.state.write();
        let dropped = state.rules.len();
        state.rules = Arc::new(Vec::new());
        self.log.clear();
        info!(stubs = dropped, "Registry reset");
    }

    /// Snapshot of the rules in registration order.
    pub fn find_all(&self) -> StubSnapshot {
        StubSnapshot {
            rules: Arc::clone(&self.state.read().rules),
        }
    }

    pub fn get(&self, id: StubId) -> Option<Arc<StubRule>> {
        self.state
            .read()
            .rules
            .iter()
            .find(|rule| rule.id() == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.state.read().rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().rules.is_empty()
    }

    pub fn request_log(&self) -> &RequestLog {
        &self.log
    }
}

/// Immutable view of the registered rules. Can be iterated any number of times.
#[derive(Debug, Clone)]
pub struct StubSnapshot {
    rules: Arc<Vec<Arc<StubRule>>>,
}

impl StubSnapshot {
    pub fn iter(&self) -> std::slice::Iter<'_, Arc<StubRule>> {
        self.rules.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<StubRule>> {
        self.rules.get(index)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
