//! Append-only journal of received requests.

use crate::matcher::RequestPattern;
use crate::request::IncomingRequest;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A request snapshot with its arrival time.
#[derive(Debug, Clone, Serialize)]
pub struct RequestLogEntry {
    pub sequence: u64,
    pub request: IncomingRequest,
    pub received_at: DateTime<Utc>,
}

/// Requests in arrival order.
#[derive(Debug, Default)]
pub struct RequestLog {
    entries: RwLock<Vec<Arc<RequestLogEntry>>>,
    next_sequence: AtomicU64,
}

impl RequestLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a request. Never fails.
    pub fn record(&self, request: IncomingRequest) -> Arc<RequestLogEntry> {
        let mut entries = self.entries.write();
        let entry = Arc::new(RequestLogEntry {
            sequence: self.next_sequence.fetch_add(1, Ordering::Relaxed),
            request,
            received_at: Utc::now(),
        });
        entries.push(Arc::clone(&entry));
        entry
    }

    /// Entries satisfying `predicate`, over a snapshot taken now.
    pub fn query<P>(&self, predicate: P) -> LogQuery<P>
    where
        P: Fn(&RequestLogEntry) -> bool,
    {
        LogQuery {
            snapshot: self.entries(),
            predicate,
        }
    }

    pub fn count<P>(&self, predicate: P) -> usize
    where
        P: Fn(&RequestLogEntry) -> bool,
    {
        self.entries
            .read()
            .iter()
            .map(Arc::as_ref)
            .filter(|&e| predicate(e))
            .count()
    }

    /// Entries whose request satisfies every matcher of `pattern`.
    pub fn find(&self, pattern: &RequestPattern) -> Vec<Arc<RequestLogEntry>> {
        self.entries
            .read()
            .iter()
            .filter(|e| pattern.matches(&e.request))
            .cloned()
            .collect()
    }

    pub fn count_matching(&self, pattern: &RequestPattern) -> usize {
        self.count(|e| pattern.matches(&e.request))
    }

    pub fn entries(&self) -> Vec<Arc<RequestLogEntry>> {
        self.entries.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub(crate) fn clear(&self) {
        self.entries.write().clear();
    }
}

/// A filtered view over a log snapshot. Can be iterated any number of times.
pub struct LogQuery<P> {
    snapshot: Vec<Arc<RequestLogEntry>>,
    predicate: P,
}

impl<P> LogQuery<P>
where
    P: Fn(&RequestLogEntry) -> bool,
{
    pub fn iter(&self) -> impl Iterator<Item = &RequestLogEntry> + '_ {
        self.snapshot
            .iter()
            .map(Arc::as_ref)
            .filter(move |&e| (self.predicate)(e))
    }

    pub fn count(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}
