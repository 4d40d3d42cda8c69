//! Batch pipeline driver.
//!
//! Per seed: SEEDED → RESOLVED → RELATED → EVIDENCED, or DROPPED when
//! resolution or relation lookup comes back empty. A failing seed or pair is
//! logged and skipped; only writing the outputs can fail a run.

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use treatmap_common::{pretty_label, ConceptKind, EvidenceRecord, Result};
use treatmap_config::PipelineConfig;
use treatmap_ingestion::{PubTatorClient, Related, Resolution, SearchResults};

use crate::artifact::{DropReason, DropRecord, IndicationRecord, Limits, PipelineArtifact, SeedResolution};
use crate::resolve::preferred_ids;
use crate::seeds::SeedProvider;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const RUN_ID_FORMAT: &str = "%Y%m%d_%H%M%S";

// ── Run context ───────────────────────────────────────────────────────────────

/// Identity and output locations of one run: `<output_dir>/pipeline_<run_id>/`.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub run_dir: PathBuf,
    pub started: DateTime<Local>,
}

impl RunContext {
    /// New run id from the current local time; creates the run directory.
    pub fn create(output_dir: impl AsRef<Path>) -> Result<Self> {
        let started = Local::now();
        Self::with_run_id(output_dir, started.format(RUN_ID_FORMAT).to_string(), started)
    }

    pub fn with_run_id(output_dir: impl AsRef<Path>, run_id: impl Into<String>, started: DateTime<Local>) -> Result<Self> {
        let run_id = run_id.into();
        let run_dir = output_dir.as_ref().join(format!("pipeline_{run_id}"));
        std::fs::create_dir_all(&run_dir)?;
        Ok(Self { run_id, run_dir, started })
    }

    pub fn json_path(&self) -> PathBuf {
        self.run_dir.join(format!("pipeline_{}.json", self.run_id))
    }

    pub fn csv_path(&self) -> PathBuf {
        self.run_dir.join(format!("pipeline_{}_summary.csv", self.run_id))
    }

    pub fn log_path(&self) -> PathBuf {
        self.run_dir.join(format!("pipeline_{}.log", self.run_id))
    }
}

// ── Result summary ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub artifact: PipelineArtifact,
    pub json_path: PathBuf,
    pub csv_path: PathBuf,
    pub elapsed: Duration,
}

// ── Driver ────────────────────────────────────────────────────────────────────

pub struct Pipeline {
    client: PubTatorClient,
    cfg: PipelineConfig,
}

impl Pipeline {
    /// The client is switched to lenient mode: a failed call yields an empty or
    /// partial result and the run carries on.
    pub fn new(client: PubTatorClient, cfg: PipelineConfig) -> Self {
        Self { client: client.with_strict(false), cfg }
    }

    fn limits(&self) -> Limits {
        Limits {
            max_entity_ids: self.cfg.max_entity_ids,
            max_counterparts: self.cfg.max_counterparts,
            max_pmids: self.cfg.max_pmids,
        }
    }

    /// Run all four stages and write the artifact and summary into `ctx.run_dir`.
    #[instrument(skip(self, seeds, ctx), fields(run_id = %ctx.run_id))]
    pub async fn run(&self, seeds: &dyn SeedProvider, ctx: &RunContext) -> Result<PipelineReport> {
        let t0 = Instant::now();
        let anchor = self.cfg.anchor;
        info!("Run start: {}", ctx.started.format(TIMESTAMP_FORMAT));

        // ── 1. Seeds ──────────────────────────────────────────────────────────
        info!(source = seeds.name(), "Stage 1: collecting seeds");
        let seed_terms = seeds.provide_seeds().await?;
        info!(n = seed_terms.len(), "  seeds: {:?}", seed_terms);

        let mut artifact = PipelineArtifact {
            run_id: ctx.run_id.clone(),
            started_at: ctx.started.format(TIMESTAMP_FORMAT).to_string(),
            finished_at: None,
            anchor,
            relation_type: self.cfg.relation_type.clone(),
            seed_source: seeds.name().to_string(),
            seeds: seed_terms.clone(),
            resolutions: Vec::new(),
            indications: Vec::new(),
            dropped: Vec::new(),
            limits: self.limits(),
        };

        // ── 2. Resolve ────────────────────────────────────────────────────────
        info!(
            "Stage 2: resolving to PubTator {} IDs (≤{} per seed)",
            anchor, self.cfg.max_entity_ids
        );
        for seed in &seed_terms {
            match self.resolve_seed(seed).await {
                Some(res) => {
                    info!(
                        seed = %seed,
                        ids = res.entity_ids.len(),
                        total = res.total_entity_ids,
                        "  {}: {} IDs (total={}) -> {}",
                        seed,
                        res.entity_ids.len(),
                        res.total_entity_ids,
                        preview(&res.entity_ids, 3)
                    );
                    artifact.resolutions.push(res);
                }
                None => {
                    info!(seed = %seed, "  drop (unresolved): {}", seed);
                    artifact.dropped.push(DropRecord {
                        seed: seed.clone(),
                        entity_id: None,
                        reason: DropReason::Unresolved,
                    });
                }
            }
        }

        // ── 3. Relate ─────────────────────────────────────────────────────────
        info!(
            "Stage 3: fetching '{}' {} counterparts (top {} by publications)",
            self.cfg.relation_type,
            anchor.opposite(),
            self.cfg.max_counterparts
        );
        for res in &artifact.resolutions {
            for id in &res.entity_ids {
                let related = self.relate(id).await;
                let counterpart_ids = related.related_ids();
                if counterpart_ids.is_empty() {
                    info!(seed = %res.seed, entity_id = %id, "  drop (no relations): {} ({})", res.seed, id);
                    artifact.dropped.push(DropRecord {
                        seed: res.seed.clone(),
                        entity_id: Some(id.clone()),
                        reason: DropReason::NoRelations,
                    });
                    continue;
                }
                info!(
                    "  {} ({}): {} counterparts (total={})",
                    res.seed,
                    id,
                    counterpart_ids.len(),
                    related.total_unique
                );
                artifact.indications.push(IndicationRecord {
                    seed: res.seed.clone(),
                    anchor_id: id.clone(),
                    counterpart_ids,
                    total_counterparts: related.total_unique,
                    evidence: Vec::new(),
                });
            }
        }

        // ── 4. Evidence ───────────────────────────────────────────────────────
        info!(
            "Stage 4: fetching PMIDs per drug–disease pair (up to {} per pair)",
            self.cfg.max_pmids
        );
        for ind in &mut artifact.indications {
            for counterpart in &ind.counterpart_ids {
                let (drug_id, disease_id) = match anchor {
                    ConceptKind::Chemical => (ind.anchor_id.as_str(), counterpart.as_str()),
                    ConceptKind::Disease => (counterpart.as_str(), ind.anchor_id.as_str()),
                };
                let ev = self.collect_evidence(drug_id, disease_id).await;
                info!(
                    "  {} ~ {}: {} PMIDs (total={}) {}",
                    pretty_label(drug_id),
                    pretty_label(disease_id),
                    ev.pmids.len(),
                    ev.total_articles,
                    preview(&ev.pmids, 10)
                );
                ind.evidence.push(ev);
            }
        }

        // ── 5. Finalize ───────────────────────────────────────────────────────
        info!("Chat-style outputs:");
        for line in artifact.chat_lines() {
            info!("{}", line);
        }

        artifact.finished_at = Some(Local::now().format(TIMESTAMP_FORMAT).to_string());
        let json_path = ctx.json_path();
        let csv_path = ctx.csv_path();
        artifact.write_json(&json_path)?;
        artifact.write_summary_csv(&csv_path)?;

        let elapsed = t0.elapsed();
        info!("Saved JSON: {}", json_path.display());
        info!("Saved CSV:  {}", csv_path.display());
        info!(
            resolved = artifact.resolutions.len(),
            indications = artifact.indications.len(),
            pairs = artifact.evidence_count(),
            dropped = artifact.dropped.len(),
            "Run end: {} | Total runtime: {}",
            artifact.finished_at.as_deref().unwrap_or_default(),
            format_elapsed(elapsed)
        );

        Ok(PipelineReport { artifact, json_path, csv_path, elapsed })
    }

    /// Stage 2 for one seed. `None` when neither the seed nor its lowercase form resolves.
    async fn resolve_seed(&self, seed: &str) -> Option<SeedResolution> {
        let kind = self.cfg.anchor;
        let mut res = self.lookup(seed).await;
        if res.entities.is_empty() {
            let lower = seed.to_lowercase();
            if lower != seed {
                debug!(seed, "No match, retrying lowercase");
                res = self.lookup(&lower).await;
            }
        }
        if res.entities.is_empty() {
            return None;
        }

        let entity_ids = preferred_ids(seed, kind, &res.entities, &self.cfg.denylist, self.cfg.max_entity_ids);
        Some(SeedResolution {
            seed: seed.to_string(),
            entity_ids,
            total_entity_ids: res.total_count,
        })
    }

    async fn lookup(&self, query: &str) -> Resolution {
        self.client
            .resolve_entities(query, Some(self.cfg.anchor), None)
            .await
            .unwrap_or_else(|e| {
                warn!(query, error = %e, "Resolution failed");
                Resolution::default()
            })
    }

    async fn relate(&self, anchor_id: &str) -> Related {
        self.client
            .related_entities(
                anchor_id,
                &self.cfg.relation_type,
                self.cfg.anchor.opposite(),
                Some(self.cfg.max_counterparts),
            )
            .await
            .unwrap_or_else(|e| {
                warn!(anchor_id, error = %e, "Relation lookup failed");
                Related::empty(anchor_id)
            })
    }

    async fn collect_evidence(&self, drug_id: &str, disease_id: &str) -> EvidenceRecord {
        let max_results = self.cfg.max_pmids.min(self.cfg.search_max_results);
        let results = self
            .client
            .paginated_search(drug_id, disease_id, 1, max_results, self.cfg.search_max_pages)
            .await
            .unwrap_or_else(|e| {
                warn!(drug_id, disease_id, error = %e, "Evidence search failed");
                SearchResults::default()
            });

        let mut ev = EvidenceRecord::new(drug_id, disease_id);
        ev.extend_pmids(results.pmids(), self.cfg.max_pmids);
        ev.total_articles = results.total_count;
        ev.pages_fetched = results.pages_fetched;
        ev
    }
}

/// First `n` items joined, with "..." when more remain.
fn preview(items: &[String], n: usize) -> String {
    let head = items.iter().take(n).cloned().collect::<Vec<_>>().join(", ");
    if items.len() > n {
        format!("{head}...")
    } else {
        head
    }
}

/// `H:MM:SS`, rounded to whole seconds.
fn format_elapsed(d: Duration) -> String {
    let secs = d.as_secs_f64().round() as u64;
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}
