//! Request dispatch.
//!
//! Selection order among matching rules: lowest explicit priority first,
//! `Normal` after every explicit priority, then the most recently registered.

use crate::config::ResponseDefinition;
use crate::registry::StubRegistry;
use crate::request::IncomingRequest;
use crate::stub::{StubId, StubRule};
use std::sync::Arc;
use tracing::debug;

/// Result of dispatching one request.
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    Matched(Arc<StubRule>),
    Unmatched,
}

impl DispatchOutcome {
    pub fn is_matched(&self) -> bool {
        matches!(self, DispatchOutcome::Matched(_))
    }

    pub fn stub_id(&self) -> Option<StubId> {
        match self {
            DispatchOutcome::Matched(rule) => Some(rule.id()),
            DispatchOutcome::Unmatched => None,
        }
    }

    pub fn stub(&self) -> Option<&StubRule> {
        match self {
            DispatchOutcome::Matched(rule) => Some(rule),
            DispatchOutcome::Unmatched => None,
        }
    }

    /// The selected response, or 404 with an empty body when nothing matched.
    pub fn response(&self) -> ResponseDefinition {
        match self {
            DispatchOutcome::Matched(rule) => rule.response().clone(),
            DispatchOutcome::Unmatched => ResponseDefinition::not_found(),
        }
    }
}

/// Selects the best stub for a request. Holds no state of its own.
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher<'a> {
    registry: &'a StubRegistry,
}

impl<'a> Dispatcher<'a> {
    pub fn new(registry: &'a StubRegistry) -> Self {
        Self { registry }
    }

    /// Log the request, then select a stub from the current rule snapshot.
    pub fn dispatch(&self, request: &IncomingRequest) -> DispatchOutcome {
        self.registry.request_log().record(request.clone());
        self.select(request)
    }

    /// Select without logging the request.
    pub fn select(&self, request: &IncomingRequest) -> DispatchOutcome {
        let snapshot = self.registry.find_all();

        let selected = snapshot
            .iter()
            .filter(|rule| rule.matches(request))
            .min_by_key(|rule| rule.selection_key())
            .cloned();

        match selected {
            Some(rule) => {
                debug!(
                    stub_id = %rule.id(),
                    priority = %rule.priority(),
                    method = %request.method(),
                    url = %request.url(),
                    "Selected stub"
                );
                DispatchOutcome::Matched(rule)
            }
            None => {
                debug!(
                    method = %request.method(),
                    url = %request.url(),
                    candidates = snapshot.len(),
                    "No stub matched"
                );
                DispatchOutcome::Unmatched
            }
        }
    }
}
