//! Configuration loading for treatmap.
//! Reads treatmap.toml from the current directory or the path in TREATMAP_CONFIG,
//! then applies environment overrides. A missing file yields the defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use treatmap_common::{ConceptKind, Result, TreatmapError};

pub const PUBTATOR_BASE_URL: &str = "https://www.ncbi.nlm.nih.gov/research/pubtator3-api";

/// Accepted range for `pubtator.requests_per_second`.
pub const MIN_REQUESTS_PER_SECOND: f64 = 0.01;
pub const MAX_REQUESTS_PER_SECOND: f64 = 1000.0;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pubtator: PubTatorConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub seeds: SeedConfig,
}

// ── PubTator client ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubTatorConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_rps")]
    pub requests_per_second: f64,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Upper bound of random extra delay added by the rate gate.
    #[serde(default)]
    pub jitter_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_base_url()           -> String { PUBTATOR_BASE_URL.to_string() }
fn default_rps()                -> f64    { 2.0 }
fn default_retries()            -> u32    { 2 }
fn default_initial_backoff_ms() -> u64    { 500 }
fn default_max_backoff_ms()     -> u64    { 8_000 }
fn default_timeout_secs()       -> u64    { 15 }
fn default_user_agent()         -> String { format!("treatmap/{}", env!("CARGO_PKG_VERSION")) }

impl Default for PubTatorConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            requests_per_second: default_rps(),
            retries: default_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            jitter_ms: 0,
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl PubTatorConfig {
    /// Minimum spacing between two outbound calls.
    pub fn min_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.requests_per_second)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ── Pipeline driver ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Concept of the seed terms; counterparts are the opposite concept.
    #[serde(default = "default_anchor")]
    pub anchor: ConceptKind,
    #[serde(default = "default_relation_type")]
    pub relation_type: String,
    #[serde(default = "default_200")]
    pub max_entity_ids: usize,
    #[serde(default = "default_200")]
    pub max_counterparts: usize,
    #[serde(default = "default_max_pmids")]
    pub max_pmids: usize,
    #[serde(default = "default_search_max_results")]
    pub search_max_results: usize,
    #[serde(default = "default_search_max_pages")]
    pub search_max_pages: u32,
    /// Tokens that demote a substring match (salts, metabolites, …).
    #[serde(default = "default_denylist")]
    pub denylist: Vec<String>,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

fn default_anchor()             -> ConceptKind { ConceptKind::Chemical }
fn default_relation_type()      -> String      { "treat".to_string() }
fn default_200()                -> usize       { 200 }
fn default_max_pmids()          -> usize       { 10 }
fn default_search_max_results() -> usize       { 100 }
fn default_search_max_pages()   -> u32         { 10 }
fn default_output_dir()         -> String      { "outputs".to_string() }

fn default_denylist() -> Vec<String> {
    [
        "sulfone", "glucuronide", "metabolite", "hydroxy", "methyl", "oxide",
        "phosphate", "lactate", "acetate", "nitrate", "sulfate", "salt",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            anchor: default_anchor(),
            relation_type: default_relation_type(),
            max_entity_ids: default_200(),
            max_counterparts: default_200(),
            max_pmids: default_max_pmids(),
            search_max_results: default_search_max_results(),
            search_max_pages: default_search_max_pages(),
            denylist: default_denylist(),
            output_dir: default_output_dir(),
        }
    }
}

// ── Seeds ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SeedSource {
    Static,
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedConfig {
    #[serde(default = "default_seed_source")]
    pub source: SeedSource,
    #[serde(default = "default_terms")]
    pub terms: Vec<String>,
    #[serde(default)]
    pub ollama: OllamaConfig,
}

fn default_seed_source() -> SeedSource { SeedSource::Static }

fn default_terms() -> Vec<String> {
    [
        "metformin", "atenolol", "simvastatin", "lisinopril", "amlodipine",
        "omeprazole", "furosemide", "warfarin", "levofloxacin", "glyburide",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            source: default_seed_source(),
            terms: default_terms(),
            ollama: OllamaConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
    #[serde(default = "default_ollama_model")]
    pub model: String,
    #[serde(default = "default_seed_count")]
    pub count: usize,
    #[serde(default = "default_ollama_timeout")]
    pub timeout_secs: u64,
}

fn default_ollama_url()     -> String { "http://localhost:11434".to_string() }
fn default_ollama_model()   -> String { "llama3.3:latest".to_string() }
fn default_seed_count()     -> usize  { 15 }
fn default_ollama_timeout() -> u64    { 120 }

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_url(),
            model: default_ollama_model(),
            count: default_seed_count(),
            timeout_secs: default_ollama_timeout(),
        }
    }
}


impl Config {
    /// Load configuration from treatmap.toml.
    /// Checks TREATMAP_CONFIG env var first, then current directory; a missing
    /// default file is not an error. `anchor` replaces the configured anchor
    /// before environment overrides are applied.
    pub fn load(anchor: Option<ConceptKind>) -> Result<Self> {
        let explicit = std::env::var("TREATMAP_CONFIG").ok();
        let path = explicit.clone().unwrap_or_else(|| "treatmap.toml".to_string());

        if Path::new(&path).exists() {
            return Self::load_from(&path, anchor);
        }
        if explicit.is_some() {
            return Err(TreatmapError::Config(format!("Config file not found: {}", path)));
        }
        tracing::debug!("No treatmap.toml found, using defaults");
        Self::finish(Config::default(), anchor, |key| std::env::var(key).ok())
    }

    /// Load an explicit file, then apply environment overrides and validate.
    pub fn load_from(path: impl AsRef<Path>, anchor: Option<ConceptKind>) -> Result<Self> {
        Self::finish(Self::from_file(path)?, anchor, |key| std::env::var(key).ok())
    }

    /// Environment caps are keyed by anchor, so the anchor is fixed before the
    /// single env pass.
    fn finish<F>(mut config: Config, anchor: Option<ConceptKind>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(anchor) = anchor {
            config.pipeline.anchor = anchor;
        }
        config.apply_env(lookup)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| TreatmapError::Config(e.to_string()))
    }

    /// Apply the recognized environment knobs through `lookup`.
    /// `MAX_CHEM_IDS`/`MAX_DISEASES` map onto the anchor/counterpart caps
    /// according to the configured anchor.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (anchor_key, counterpart_key) = match self.pipeline.anchor {
            ConceptKind::Chemical => ("MAX_CHEM_IDS", "MAX_DISEASES"),
            ConceptKind::Disease  => ("MAX_DISEASES", "MAX_CHEM_IDS"),
        };

        if let Some(v) = parse_env(&lookup, anchor_key)? {
            self.pipeline.max_entity_ids = v;
        }
        if let Some(v) = parse_env(&lookup, counterpart_key)? {
            self.pipeline.max_counterparts = v;
        }
        if let Some(v) = parse_env(&lookup, "MAX_PMIDS")? {
            self.pipeline.max_pmids = v;
        }
        if let Some(v) = parse_env(&lookup, "TREATMAP_RPS")? {
            self.pubtator.requests_per_second = v;
        }
        if let Some(v) = parse_env(&lookup, "TREATMAP_RETRIES")? {
            self.pubtator.retries = v;
        }
        if let Some(v) = parse_env(&lookup, "TREATMAP_TIMEOUT_SECS")? {
            self.pubtator.timeout_secs = v;
        }
        if let Some(v) = lookup("TREATMAP_OUTPUT_DIR") {
            self.pipeline.output_dir = v;
        }
        if let Some(v) = lookup("OLLAMA_HOST") {
            self.seeds.ollama.base_url = v;
        }
        if let Some(v) = lookup("OLLAMA_MODEL") {
            self.seeds.ollama.model = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let rps = self.pubtator.requests_per_second;
        if !(MIN_REQUESTS_PER_SECOND..=MAX_REQUESTS_PER_SECOND).contains(&rps) {
            return Err(TreatmapError::Config(format!(
                "pubtator.requests_per_second must be between {} and {}, got {}",
                MIN_REQUESTS_PER_SECOND, MAX_REQUESTS_PER_SECOND, rps
            )));
        }
        let caps = [
            ("pipeline.max_entity_ids", self.pipeline.max_entity_ids),
            ("pipeline.max_counterparts", self.pipeline.max_counterparts),
            ("pipeline.max_pmids", self.pipeline.max_pmids),
            ("pipeline.search_max_results", self.pipeline.search_max_results),
            ("pipeline.search_max_pages", self.pipeline.search_max_pages as usize),
        ];
        for (name, value) in caps {
            if value == 0 {
                return Err(TreatmapError::Config(format!("{} must be at least 1", name)));
            }
        }
        if self.seeds.source == SeedSource::Ollama && self.seeds.ollama.count == 0 {
            return Err(TreatmapError::Config("seeds.ollama.count must be at least 1".into()));
        }
        Ok(())
    }
}

fn parse_env<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| TreatmapError::Config(format!("{} has an invalid value: {:?}", key, raw))),
    }
}
