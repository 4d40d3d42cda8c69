//! PubTator3 REST client.
//!
//! Endpoints used (base https://www.ncbi.nlm.nih.gov/research/pubtator3-api):
//!   /entity/autocomplete/  name to @CONCEPT_slug ids
//!   /relations             relations of one entity, with publication counts
//!   /search/               paged full-text search (`relations:ANY|e1|e2`)
//!
//! Lenient by default: a failed call is logged and yields an empty (or partial)
//! result. A client built `with_strict(true)` returns the failure as an error
//! instead.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use treatmap_common::{
    ConceptKind, HttpReply, HttpTransport, RelationEdge, ReqwestTransport, Result, TreatmapError,
};
use treatmap_config::PubTatorConfig;

use crate::models::{self, Related, Resolution, SearchResults};
use crate::rate_gate::RateGate;
use crate::retry::RetryPolicy;

pub const AUTOCOMPLETE_PATH: &str = "/entity/autocomplete/";
pub const RELATIONS_PATH: &str = "/relations";
pub const SEARCH_PATH: &str = "/search/";

pub const DEFAULT_SEARCH_MAX_RESULTS: usize = 100;
pub const DEFAULT_SEARCH_MAX_PAGES: u32 = 10;

pub struct PubTatorClient {
    transport: Arc<dyn HttpTransport>,
    gate: RateGate,
    retry: RetryPolicy,
    strict: bool,
}

impl PubTatorClient {
    pub fn new(transport: Arc<dyn HttpTransport>, cfg: &PubTatorConfig) -> Self {
        Self {
            transport,
            gate: RateGate::new(cfg.min_interval(), Duration::from_millis(cfg.jitter_ms)),
            retry: RetryPolicy::new(cfg.retries, cfg.initial_backoff_ms, cfg.max_backoff_ms),
            strict: false,
        }
    }

    /// Client talking to the configured PubTator base URL over HTTPS.
    pub fn from_config(cfg: &PubTatorConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(&cfg.base_url, cfg.timeout(), &cfg.user_agent)?;
        Ok(Self::new(Arc::new(transport), cfg))
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// One logical GET: every attempt passes the rate gate, retries follow the policy.
    async fn get(&self, path: &str, params: &[(String, String)]) -> Result<HttpReply> {
        let transport = &self.transport;
        let gate = &self.gate;
        self.retry
            .retry(path, move || async move { gate.run(|| transport.get(path, params)).await })
            .await
    }

    /// GET and decode JSON. `Ok(None)` means the call failed in lenient mode.
    async fn get_json(&self, path: &str, params: &[(String, String)]) -> Result<Option<Value>> {
        let outcome = match self.get(path, params).await {
            Ok(reply) if reply.is_success() => reply.json(),
            Ok(reply) => Err(TreatmapError::Status { status: reply.status, path: path.to_string() }),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(v) => Ok(Some(v)),
            Err(e) if self.strict => Err(e),
            Err(e) => {
                warn!(path, error = %e, "PubTator call failed, continuing with empty result");
                Ok(None)
            }
        }
    }

    // ── Entity autocomplete ──────────────────────────────────────────────────

    /// Resolve a free-text name to entity ids.
    ///
    /// The first call (no limit) establishes `total_count`; when `limit` is set a
    /// second call with the limit supplies the returned matches.
    #[instrument(skip(self))]
    pub async fn resolve_entities(
        &self,
        query: &str,
        concept: Option<ConceptKind>,
        limit: Option<usize>,
    ) -> Result<Resolution> {
        let mut params = vec![("query".to_string(), query.to_string())];
        if let Some(c) = concept {
            params.push(("concept".to_string(), c.as_str().to_string()));
        }

        let Some(first) = self.get_json(AUTOCOMPLETE_PATH, &params).await? else {
            return Ok(Resolution::default());
        };
        let total_count = models::autocomplete_len(&first);

        let body = match limit {
            None => first,
            Some(limit) => {
                params.push(("limit".to_string(), limit.to_string()));
                match self.get_json(AUTOCOMPLETE_PATH, &params).await? {
                    Some(v) => v,
                    None => return Ok(Resolution { entities: Vec::new(), total_count }),
                }
            }
        };

        let mut entities = models::parse_autocomplete(&body, concept);
        if let Some(limit) = limit {
            entities.truncate(limit);
        }
        debug!(n = entities.len(), total_count, "Autocomplete resolved");
        Ok(Resolution { entities, total_count })
    }

    // ── Relations ────────────────────────────────────────────────────────────

    /// Entities related to `anchor_id` by `relation_type`, ranked by publication count.
    #[instrument(skip(self))]
    pub async fn related_entities(
        &self,
        anchor_id: &str,
        relation_type: &str,
        target: ConceptKind,
        limit: Option<usize>,
    ) -> Result<Related> {
        let params = vec![
            ("e1".to_string(), anchor_id.to_string()),
            ("type".to_string(), relation_type.to_string()),
            ("e2".to_string(), target.relation_param().to_string()),
        ];

        let Some(body) = self.get_json(RELATIONS_PATH, &params).await? else {
            return Ok(Related::empty(anchor_id));
        };

        let rows = models::parse_relations(&body);
        let (edges, total_unique) = rank_related(rows, anchor_id, target, limit);
        debug!(n = edges.len(), total_unique, "Relations ranked");
        Ok(Related { anchor_id: anchor_id.to_string(), edges, total_unique })
    }

    // ── Search ───────────────────────────────────────────────────────────────

    /// One page of `relations:ANY|chemical|disease`. `Ok(None)` on lenient failure.
    async fn search_page(&self, text: &str, page: u32) -> Result<Option<(Vec<models::SearchHit>, u64)>> {
        let params = vec![
            ("text".to_string(), text.to_string()),
            ("page".to_string(), page.to_string()),
        ];
        Ok(self
            .get_json(SEARCH_PATH, &params)
            .await?
            .map(|body| models::parse_search(&body)))
    }

    /// Collect search hits for a chemical–disease pair across pages.
    ///
    /// `total_count` comes from the first fetched page. Further pages are
    /// fetched from `start_page + 1` until the last page estimated from the
    /// first page's size, `max_pages` pages in total, `max_results` hits, or an
    /// empty page, whichever comes first. Only hits carrying a PMID are kept and
    /// a PMID seen on an earlier page is not repeated. Never returns more than
    /// `max_results` hits.
    #[instrument(skip(self))]
    pub async fn paginated_search(
        &self,
        chemical_id: &str,
        disease_id: &str,
        start_page: u32,
        max_results: usize,
        max_pages: u32,
    ) -> Result<SearchResults> {
        let text = format!("relations:ANY|{}|{}", chemical_id, disease_id);
        let start_page = start_page.max(1);

        let Some((hits, total_count)) = self.search_page(&text, start_page).await? else {
            return Ok(SearchResults::default());
        };

        let page_size = hits.len();
        let mut out = SearchResults { hits: Vec::new(), total_count, pages_fetched: 1 };
        out.push_unique(hits);

        let next_page = start_page.checked_add(1);
        let (Some(mut page), false) = (next_page, page_size == 0 || page_size as u64 >= total_count) else {
            out.hits.truncate(max_results);
            return Ok(out);
        };

        let last_page = total_count.div_ceil(page_size as u64).min(u32::MAX as u64) as u32;

        while page <= last_page && out.pages_fetched < max_pages && out.pmids().count() < max_results {
            match self.search_page(&text, page).await? {
                Some((hits, _)) if !hits.is_empty() => {
                    out.push_unique(hits);
                    out.pages_fetched += 1;
                }
                Some(_) => {
                    debug!(page, "Empty page before estimated end, stopping");
                    break;
                }
                None => break,
            }
            match page.checked_add(1) {
                Some(next) => page = next,
                None => break,
            }
        }

        out.hits.truncate(max_results);
        debug!(hits = out.hits.len(), total_count, pages = out.pages_fetched, "Search collected");
        Ok(out)
    }
}

/// Keep rows that connect `anchor_id` to a `target` counterpart, order by
/// descending publication count (stable), deduplicate counterparts, and truncate.
/// Returns the kept edges and the number of unique counterparts before truncation.
fn rank_related(
    rows: Vec<RelationEdge>,
    anchor_id: &str,
    target: ConceptKind,
    limit: Option<usize>,
) -> (Vec<RelationEdge>, usize) {
    let anchor_kind = ConceptKind::from_entity_id(anchor_id);

    let mut matching: Vec<RelationEdge> = rows
        .into_iter()
        .filter(|row| {
            let counterpart = match anchor_kind {
                Some(ConceptKind::Chemical) => (row.source_id == anchor_id).then_some(row.target_id.as_str()),
                Some(ConceptKind::Disease) => (row.target_id == anchor_id).then_some(row.source_id.as_str()),
                None => row.counterpart(anchor_id),
            };
            counterpart.is_some_and(|id| counterpart_is(id, target))
        })
        .collect();

    // sort_by is stable: equal counts keep server order
    matching.sort_by(|a, b| b.publication_count.cmp(&a.publication_count));

    let mut seen = std::collections::HashSet::new();
    let mut unique: Vec<RelationEdge> = matching
        .into_iter()
        .filter(|row| {
            let id = row.counterpart(anchor_id).unwrap_or_default().to_string();
            seen.insert(id)
        })
        .collect();

    let total_unique = unique.len();
    if let Some(limit) = limit {
        unique.truncate(limit);
    }
    (unique, total_unique)
}

/// Tagged ids (`@CONCEPT_...`) must carry the target concept; untagged ids pass.
fn counterpart_is(id: &str, target: ConceptKind) -> bool {
    match ConceptKind::from_entity_id(id) {
        Some(kind) => kind == target,
        None => !id.is_empty() && !id.starts_with('@'),
    }
}
