use crate::histogram::Histogram;
use crate::validity::{ValidityInterval, VALID_FROM_HEADER, VALID_UNTIL_HEADER};
use moving_windows_common::{MovingWindowsError, Result};
use std::cell::RefCell;
use std::collections::HashMap;

/// pass name that carries no `PassName` filter
pub const ONLINE_PASS: &str = "online";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryMetadata {
    pub run: u32,
    pub pass: String,
}

impl QueryMetadata {
    pub fn new(run: u32, pass: impl Into<String>) -> Self {
        Self { run, pass: pass.into() }
    }

    /// metadata filters in request order
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut out = vec![("RunNumber", self.run.to_string())];
        if self.pass != ONLINE_PASS {
            out.push(("PassName", self.pass.clone()));
        }
        out
    }
}

/// an object as the store hands it back: payload plus raw headers
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub histogram: Histogram,
    pub headers: HashMap<String, String>,
}

/// Time-indexed object retrieval.
///
/// `Ok(None)` means nothing is valid at the requested instant; `Err` is a
/// connection or protocol failure.
pub trait ValidityStore {
    fn query_at(&self, key: &str, metadata: &QueryMetadata, timestamp: i64) -> Result<Option<StoredObject>>;

    /// resolve a run boundary marker (e.g. `STF`, `EOR`); None when the marker is absent
    fn query_run_bound(&self, run: u32, marker: &str) -> Result<Option<i64>>;
}

impl<S: ValidityStore + ?Sized> ValidityStore for &S {
    fn query_at(&self, key: &str, metadata: &QueryMetadata, timestamp: i64) -> Result<Option<StoredObject>> {
        (**self).query_at(key, metadata, timestamp)
    }
    fn query_run_bound(&self, run: u32, marker: &str) -> Result<Option<i64>> {
        (**self).query_run_bound(run, marker)
    }
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    key: String,
    validity: ValidityInterval,
    histogram: Histogram,
    headers: HashMap<String, String>,
}

/// record of one `query_at` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryRecord {
    pub timestamp: i64,
    pub found: bool,
}

/// In-process store backed by a list of objects with closed validity ranges.
/// Records every query so callers can inspect the access pattern.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Vec<MemoryEntry>,
    bounds: HashMap<(u32, String), i64>,
    fail_at: Option<i64>,
    queries: RefCell<Vec<QueryRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_run_bounds(mut self, run: u32, sor_marker: &str, start: i64, eor_marker: &str, end: i64) -> Self {
        self.bounds.insert((run, sor_marker.to_owned()), start);
        self.bounds.insert((run, eor_marker.to_owned()), end);
        self
    }

    pub fn insert(&mut self, key: &str, validity: ValidityInterval, histogram: Histogram) {
        let headers = HashMap::from([
            (VALID_FROM_HEADER.to_owned(), validity.from.to_string()),
            (VALID_UNTIL_HEADER.to_owned(), validity.until.to_string()),
        ]);
        self.insert_with_headers(key, validity, histogram, headers);
    }

    /// insert with explicit headers; `validity` only decides which queries match
    pub fn insert_with_headers(
        &mut self,
        key: &str,
        validity: ValidityInterval,
        histogram: Histogram,
        headers: HashMap<String, String>,
    ) {
        self.entries.push(MemoryEntry {
            key: key.to_owned(),
            validity,
            histogram,
            headers,
        });
    }

    /// every query at or past `timestamp` fails as a connection error
    pub fn fail_from(mut self, timestamp: i64) -> Self {
        self.fail_at = Some(timestamp);
        self
    }

    pub fn queries(&self) -> Vec<QueryRecord> {
        self.queries.borrow().clone()
    }

    pub fn not_found_count(&self) -> usize {
        self.queries.borrow().iter().filter(|q| !q.found).count()
    }
}

impl ValidityStore for MemoryStore {
    fn query_at(&self, key: &str, _metadata: &QueryMetadata, timestamp: i64) -> Result<Option<StoredObject>> {
        if self.fail_at.is_some_and(|t| timestamp >= t) {
            return Err(MovingWindowsError::Store(format!("connection refused querying {key} at {timestamp}")));
        }
        let hit = self
            .entries
            .iter()
            .find(|e| e.key == key && e.validity.from <= timestamp && timestamp <= e.validity.until)
            .map(|e| StoredObject {
                histogram: e.histogram.clone(),
                headers: e.headers.clone(),
            });
        self.queries.borrow_mut().push(QueryRecord {
            timestamp,
            found: hit.is_some(),
        });
        Ok(hit)
    }

    fn query_run_bound(&self, run: u32, marker: &str) -> Result<Option<i64>> {
        Ok(self.bounds.get(&(run, marker.to_owned())).copied())
    }
}
