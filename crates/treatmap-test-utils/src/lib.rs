//! treatmap-test-utils: Scripted PubTator transport for unit and integration tests.
//!
//! `MockTransport` answers the three PubTator endpoints from in-memory routes,
//! records every call with its (tokio) timestamp, and can be told to fail the
//! next N calls to a path with an HTTP status or a transport fault.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;
use tokio::time::Instant;
use treatmap_common::{HttpReply, HttpTransport, Result, TreatmapError};

pub const AUTOCOMPLETE_PATH: &str = "/entity/autocomplete/";
pub const RELATIONS_PATH: &str = "/relations";
pub const SEARCH_PATH: &str = "/search/";

/// One call observed by the mock.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub path: String,
    pub params: Vec<(String, String)>,
    pub at: Instant,
}

impl RecordedCall {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
enum Scripted {
    Reply(HttpReply),
    TransportFault,
    Route,
}

#[derive(Default)]
struct Routes {
    autocomplete: HashMap<String, Value>,
    relations: HashMap<String, Value>,
    /// search text → page → body
    search: HashMap<String, BTreeMap<u32, Value>>,
    scripted: HashMap<String, VecDeque<Scripted>>,
}

#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<Routes>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Route builders ───────────────────────────────────────────────────────

    /// Autocomplete rows for an exact query string. A `limit` param truncates them.
    pub fn with_autocomplete(self, query: &str, matches: &[(&str, &str)]) -> Self {
        let rows: Vec<Value> = matches
            .iter()
            .map(|(name, id)| json!({ "name": name, "_id": id }))
            .collect();
        self.with_autocomplete_json(query, Value::Array(rows))
    }

    pub fn with_autocomplete_json(self, query: &str, body: Value) -> Self {
        self.routes.lock().unwrap().autocomplete.insert(query.to_string(), body);
        self
    }

    /// Relation rows `(source, target, publications)` returned for anchor `e1`.
    pub fn with_relations(self, e1: &str, rows: &[(&str, &str, u64)]) -> Self {
        let rows: Vec<Value> = rows
            .iter()
            .map(|(s, t, n)| json!({ "source": s, "target": t, "type": "treat", "publications": n }))
            .collect();
        self.with_relations_json(e1, Value::Array(rows))
    }

    pub fn with_relations_json(self, e1: &str, body: Value) -> Self {
        self.routes.lock().unwrap().relations.insert(e1.to_string(), body);
        self
    }

    /// Search pages for `relations:ANY|chemical|disease`, page numbers starting at 1.
    /// Each page is `(pmids, count)`.
    pub fn with_search(self, chemical_id: &str, disease_id: &str, pages: &[(&[&str], u64)]) -> Self {
        let text = format!("relations:ANY|{}|{}", chemical_id, disease_id);
        for (i, (pmids, count)) in pages.iter().enumerate() {
            let results: Vec<Value> = pmids.iter().map(|p| json!({ "pmid": p })).collect();
            let body = json!({ "results": results, "count": count });
            self.routes
                .lock()
                .unwrap()
                .search
                .entry(text.clone())
                .or_default()
                .insert(i as u32 + 1, body);
        }
        self
    }

    /// Search body for an arbitrary page of an arbitrary text query.
    pub fn with_search_page_json(self, text: &str, page: u32, body: Value) -> Self {
        self.routes
            .lock()
            .unwrap()
            .search
            .entry(text.to_string())
            .or_default()
            .insert(page, body);
        self
    }

    /// The next `times` calls to `path` answer with `status` before routing resumes.
    pub fn fail_with_status(self, path: &str, status: u16, times: usize) -> Self {
        self.script(path, Scripted::Reply(HttpReply::new(status, "")), times)
    }

    /// The next `times` calls to `path` fail below HTTP (timeout).
    pub fn fail_with_transport(self, path: &str, times: usize) -> Self {
        self.script(path, Scripted::TransportFault, times)
    }

    /// The next `times` calls to `path` are answered from the routes. Use before
    /// a `fail_with_*` to fail a later call instead of the first.
    pub fn pass_through(self, path: &str, times: usize) -> Self {
        self.script(path, Scripted::Route, times)
    }

    fn script(self, path: &str, item: Scripted, times: usize) -> Self {
        {
            let mut routes = self.routes.lock().unwrap();
            let queue = routes.scripted.entry(path.to_string()).or_default();
            for _ in 0..times {
                queue.push_back(item.clone());
            }
        }
        self
    }

    // ── Call inspection ──────────────────────────────────────────────────────

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.path == path).count()
    }

    /// Search calls whose query text mentions `entity_id`.
    pub fn search_calls_mentioning(&self, entity_id: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.path == SEARCH_PATH)
            .filter(|c| c.param("text").map_or(false, |t| t.split('|').any(|p| p == entity_id)))
            .count()
    }

    fn route(&self, call: &RecordedCall) -> Result<HttpReply> {
        let mut routes = self.routes.lock().unwrap();

        if let Some(queue) = routes.scripted.get_mut(&call.path) {
            match queue.pop_front() {
                Some(Scripted::Reply(reply)) => return Ok(reply),
                Some(Scripted::TransportFault) => {
                    return Err(TreatmapError::Transport {
                        message: "operation timed out".to_string(),
                        timeout: true,
                    })
                }
                Some(Scripted::Route) | None => {}
            }
        }

        let body = match call.path.as_str() {
            AUTOCOMPLETE_PATH => {
                let query = call.param("query").unwrap_or_default();
                let mut body = routes.autocomplete.get(query).cloned().unwrap_or_else(|| json!([]));
                if let (Some(limit), Value::Array(rows)) =
                    (call.param("limit").and_then(|l| l.parse::<usize>().ok()), &mut body)
                {
                    rows.truncate(limit);
                }
                body
            }
            RELATIONS_PATH => {
                let e1 = call.param("e1").unwrap_or_default();
                routes.relations.get(e1).cloned().unwrap_or_else(|| json!([]))
            }
            SEARCH_PATH => {
                let text = call.param("text").unwrap_or_default();
                let page = call.param("page").and_then(|p| p.parse::<u32>().ok()).unwrap_or(1);
                routes
                    .search
                    .get(text)
                    .and_then(|pages| pages.get(&page))
                    .cloned()
                    .unwrap_or_else(|| json!({ "results": [], "count": 0 }))
            }
            _ => return Ok(HttpReply::new(404, "")),
        };

        Ok(HttpReply::ok_json(&body))
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn get(&self, path: &str, params: &[(String, String)]) -> Result<HttpReply> {
        let call = RecordedCall {
            path: path.to_string(),
            params: params.to_vec(),
            at: Instant::now(),
        };
        let reply = self.route(&call);
        self.calls.lock().unwrap().push(call);
        reply
    }
}
