//! Result types of the PubTator client and defensive parsing of its JSON replies.
//! Shapes drift between endpoint versions, so every field is read with fallbacks
//! and a missing field becomes empty/zero instead of an error.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use treatmap_common::{ConceptKind, EntityRef, RelationEdge};

/// Outcome of `resolve_entities`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    /// Matches in server order (name → id, one entry per name).
    pub entities: Vec<EntityRef>,
    /// Size of the unfiltered autocomplete list.
    pub total_count: usize,
}

/// Outcome of `related_entities`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Related {
    pub anchor_id: String,
    /// Ranked by descending publication count, one edge per counterpart, truncated to the limit.
    pub edges: Vec<RelationEdge>,
    /// Unique counterparts before truncation.
    pub total_unique: usize,
}

impl Related {
    pub fn empty(anchor_id: &str) -> Self {
        Self { anchor_id: anchor_id.to_string(), ..Default::default() }
    }

    /// Counterpart ids in rank order.
    pub fn related_ids(&self) -> Vec<String> {
        self.edges
            .iter()
            .filter_map(|e| e.counterpart(&self.anchor_id).map(String::from))
            .collect()
    }
}

/// One search result row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub pmid: Option<String>,
    pub title: Option<String>,
    pub journal: Option<String>,
    pub date: Option<String>,
}

/// Outcome of `paginated_search`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    /// Server-reported total from the first fetched page.
    pub total_count: u64,
    pub pages_fetched: u32,
}

impl SearchResults {
    pub fn pmids(&self) -> impl Iterator<Item = &str> {
        self.hits.iter().filter_map(|h| h.pmid.as_deref())
    }

    /// Append hits that carry a PMID not already present.
    pub fn push_unique(&mut self, hits: Vec<SearchHit>) {
        for hit in hits {
            let Some(pmid) = hit.pmid.as_deref() else { continue };
            if !self.pmids().any(|p| p == pmid) {
                self.hits.push(hit);
            }
        }
    }
}

// ── Field helpers ─────────────────────────────────────────────────────────────

/// List payload either top-level or wrapped under one of `keys`.
fn as_rows<'a>(v: &'a Value, keys: &[&str]) -> &'a [Value] {
    if let Some(rows) = v.as_array() {
        return rows;
    }
    keys.iter()
        .find_map(|k| v.get(*k).and_then(Value::as_array))
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// First present key rendered as a non-empty string (numbers included).
fn first_str(v: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match v.get(*k)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn first_u64(v: &Value, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|k| match v.get(*k)? {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

// ── Autocomplete ──────────────────────────────────────────────────────────────

/// Number of rows in an autocomplete reply.
pub fn autocomplete_len(v: &Value) -> usize {
    as_rows(v, &["results", "data"]).len()
}

/// Parse autocomplete rows into entity refs. A repeated name keeps its first
/// position and takes the later id. Rows whose concept cannot be determined
/// (neither from the id prefix nor from `requested`) are skipped.
pub fn parse_autocomplete(v: &Value, requested: Option<ConceptKind>) -> Vec<EntityRef> {
    let mut out: Vec<EntityRef> = Vec::new();

    for row in as_rows(v, &["results", "data"]) {
        let name = first_str(row, &["label", "name", "text"]);
        let id = first_str(row, &["id", "identifier", "entity_id", "_id"]);
        let (Some(name), Some(id)) = (name, id) else { continue };

        let Some(kind) = ConceptKind::from_entity_id(&id).or(requested) else { continue };

        match out.iter_mut().find(|e| e.display_name == name) {
            Some(existing) => {
                existing.id = id;
                existing.concept_kind = kind;
            }
            None => out.push(EntityRef::new(id, name, kind)),
        }
    }
    out
}

// ── Relations ─────────────────────────────────────────────────────────────────

pub fn parse_relations(v: &Value) -> Vec<RelationEdge> {
    as_rows(v, &["results", "data"])
        .iter()
        .filter_map(|row| {
            Some(RelationEdge {
                source_id: first_str(row, &["source", "e1"])?,
                target_id: first_str(row, &["target", "e2"])?,
                publication_count: first_u64(row, &["publications", "publication_count", "count"])
                    .unwrap_or(0),
            })
        })
        .collect()
}

// ── Search ────────────────────────────────────────────────────────────────────

pub fn parse_search(v: &Value) -> (Vec<SearchHit>, u64) {
    let hits = as_rows(v, &["results", "data"])
        .iter()
        .map(|row| SearchHit {
            pmid: first_str(row, &["pmid", "_id", "id"]),
            title: first_str(row, &["title"]),
            journal: first_str(row, &["journal"]),
            date: first_str(row, &["date", "pubdate"]),
        })
        .collect();
    let count = first_u64(v, &["count", "total"]).unwrap_or(0);
    (hits, count)
}
