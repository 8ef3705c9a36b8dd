use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde_json::Value;

pub const DEFAULT_CAPACITY: usize = 50;

/// One logged outcome of a network call attempt. Write-once: the recorder
/// hands out clones and never touches a stored record again.
#[derive(Clone, Debug, Serialize)]
pub struct CallRecord {
    pub id: String,
    pub url: String,
    pub method: String,
    /// 0 is reserved for transport-level failure (no response received).
    pub status: u16,
    pub status_text: String,
    pub latency_ms: u64,
    pub payload_hash: Option<String>,
    pub payload: Option<Value>,
    pub timestamp_ms: u64,
    pub trace_id: Option<String>,
    pub error: Option<String>,
}

impl CallRecord {
    pub fn is_error(&self) -> bool {
        self.error.is_some() || self.status >= 400
    }
}

#[derive(Clone, Debug, Default)]
pub struct RecordFilter {
    pub errors_only: bool,
    pub endpoint: Option<String>,
    pub limit: Option<usize>,
}

/// Bounded call history, newest first. Inserting past capacity evicts the
/// oldest entry; nothing else ever removes a record short of `clear`.
pub struct CallRecorder {
    entries: VecDeque<CallRecord>,
    capacity: usize,
}

impl Default for CallRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl CallRecorder {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn record(&mut self, entry: CallRecord) {
        self.entries.push_front(entry);
        if self.entries.len() > self.capacity {
            self.entries.pop_back();
        }
    }

    pub fn query(&self, filter: &RecordFilter) -> Vec<CallRecord> {
        let iter = self
            .entries
            .iter()
            .filter(|r| !filter.errors_only || r.is_error())
            .filter(|r| match &filter.endpoint {
                Some(needle) => r.url.contains(needle.as_str()),
                None => true,
            });
        match filter.limit {
            Some(n) => iter.take(n).cloned().collect(),
            None => iter.cloned().collect(),
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Shared handle over the recorder; the sole read boundary for consumers.
/// Critical sections are short and never held across an await.
#[derive(Clone)]
pub struct RecorderHandle {
    inner: Arc<Mutex<CallRecorder>>,
}

impl RecorderHandle {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CallRecorder::new(capacity))),
        }
    }

    pub fn record(&self, entry: CallRecord) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(entry);
    }

    pub fn query(&self, filter: &RecordFilter) -> Vec<CallRecord> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .query(filter)
    }

    pub fn clear(&self) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
