//! Seed sources for stage 1.
//!
//!   StaticSeeds  - a fixed, configured list
//!   OllamaSeeds  - one JSON-mode chat call to a local Ollama server

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};
use treatmap_common::{ConceptKind, Result, TreatmapError};
use treatmap_config::{Config, OllamaConfig, SeedSource};

#[async_trait]
pub trait SeedProvider: Send + Sync {
    /// Ordered seed terms for one run.
    async fn provide_seeds(&self) -> Result<Vec<String>>;

    fn name(&self) -> &str;
}

/// Provider selected by `[seeds] source`.
pub fn from_config(cfg: &Config) -> Result<Box<dyn SeedProvider>> {
    Ok(match cfg.seeds.source {
        SeedSource::Static => Box::new(StaticSeeds::new(cfg.seeds.terms.clone())),
        SeedSource::Ollama => Box::new(OllamaSeeds::new(&cfg.seeds.ollama, cfg.pipeline.anchor)?),
    })
}

// ── 1. Static list ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct StaticSeeds {
    terms: Vec<String>,
}

impl StaticSeeds {
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { terms: terms.into_iter().map(Into::into).collect() }
    }
}

#[async_trait]
impl SeedProvider for StaticSeeds {
    async fn provide_seeds(&self) -> Result<Vec<String>> {
        Ok(self
            .terms
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect())
    }

    fn name(&self) -> &str { "static" }
}

// ── 2. Ollama (local LLM) ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

impl Message {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self { role: role.to_string(), content: content.into() }
    }
}

pub struct OllamaSeeds {
    base_url: String,
    model: String,
    count: usize,
    concept: ConceptKind,
    client: reqwest::Client,
}

impl OllamaSeeds {
    pub fn new(cfg: &OllamaConfig, concept: ConceptKind) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            count: cfg.count,
            concept,
            client,
        })
    }

    fn messages(&self) -> Vec<Message> {
        let noun = match self.concept {
            ConceptKind::Chemical => "approved drugs (generic names)",
            ConceptKind::Disease => "human diseases",
        };
        vec![
            Message::new("system", "Output JSON only."),
            Message::new(
                "user",
                format!(
                    "List exactly {} distinct {}. JSON: {{\"items\":[\"...\"]}}. No categories or symptoms.",
                    self.count, noun
                ),
            ),
        ]
    }
}

#[async_trait]
impl SeedProvider for OllamaSeeds {
    async fn provide_seeds(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/chat", self.base_url);
        let body = serde_json::json!({
            "model":    &self.model,
            "messages": self.messages(),
            "format":   "json",
            "stream":   false,
            "options":  { "temperature": 0 },
        });
        info!(model = %self.model, count = self.count, "Requesting seeds from Ollama");

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TreatmapError::Llm(format!("Ollama request failed: {e}")))?;
        let status = resp.status().as_u16();
        let json: Value = resp
            .json()
            .await
            .map_err(|e| TreatmapError::Llm(format!("Ollama reply unreadable: {e}")))?;
        if status >= 400 {
            let msg = json["error"].as_str().unwrap_or("unknown API error");
            return Err(TreatmapError::Llm(format!("Ollama error [{status}]: {msg}")));
        }

        let content = json["message"]["content"].as_str().unwrap_or("");
        let seeds = parse_seed_list(content, self.count)?;
        debug!(?seeds, "Ollama seeds");
        Ok(seeds)
    }

    fn name(&self) -> &str { "ollama" }
}

/// Parse `{"items": [...]}` from model output: trim, drop blanks, dedupe
/// case-insensitively (first spelling wins), keep at most `count`.
/// Bare arrays and any single array-valued key are accepted too.
pub fn parse_seed_list(content: &str, count: usize) -> Result<Vec<String>> {
    let v: Value = serde_json::from_str(content.trim())
        .map_err(|e| TreatmapError::Llm(format!("model did not return JSON: {e}")))?;

    let items = match &v {
        Value::Array(a) => a,
        Value::Object(map) => map
            .get("items")
            .and_then(Value::as_array)
            .or_else(|| map.values().find_map(Value::as_array))
            .ok_or_else(|| TreatmapError::Llm("no list in model output".to_string()))?,
        _ => return Err(TreatmapError::Llm("no list in model output".to_string())),
    };

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for item in items.iter().filter_map(Value::as_str) {
        let term = item.trim();
        if term.is_empty() || !seen.insert(term.to_lowercase()) {
            continue;
        }
        out.push(term.to_string());
        if out.len() == count {
            break;
        }
    }
    Ok(out)
}
