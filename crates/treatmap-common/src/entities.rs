/// Core entity types shared by the fetch client, the pipeline driver and the graph builder.
/// Identifiers follow the PubTator convention `@<CONCEPT>_<slug>`, e.g. `@CHEMICAL_metformin`.

use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static::lazy_static! {
    static ref NON_ALNUM: Regex = Regex::new(r"[^a-z0-9]+").unwrap();
}

// ---------------------------------------------------------------------------
// Concept kind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ConceptKind {
    Chemical,
    Disease,
}

impl ConceptKind {
    /// Concept filter value for the autocomplete endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConceptKind::Chemical => "CHEMICAL",
            ConceptKind::Disease  => "DISEASE",
        }
    }

    /// Lowercase form expected by the relations endpoint (`e2=chemical`).
    pub fn relation_param(&self) -> &'static str {
        match self {
            ConceptKind::Chemical => "chemical",
            ConceptKind::Disease  => "disease",
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            ConceptKind::Chemical => ConceptKind::Disease,
            ConceptKind::Disease  => ConceptKind::Chemical,
        }
    }

    /// Infer the concept from an `@CONCEPT_slug` identifier.
    pub fn from_entity_id(id: &str) -> Option<Self> {
        let tag = id.strip_prefix('@')?.split('_').next()?;
        match tag.to_ascii_uppercase().as_str() {
            "CHEMICAL" => Some(ConceptKind::Chemical),
            "DISEASE"  => Some(ConceptKind::Disease),
            _ => None,
        }
    }

    /// Parse a user-supplied concept name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chemical" | "drug" => Some(ConceptKind::Chemical),
            "disease"           => Some(ConceptKind::Disease),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConceptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Entity reference
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityRef {
    pub id: String,
    pub display_name: String,
    pub concept_kind: ConceptKind,
}

impl EntityRef {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, concept_kind: ConceptKind) -> Self {
        Self { id: id.into(), display_name: display_name.into(), concept_kind }
    }
}

// ---------------------------------------------------------------------------
// Relation edge
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelationEdge {
    pub source_id: String,
    pub target_id: String,
    pub publication_count: u64,
}

impl RelationEdge {
    /// The endpoint on the other side of `anchor_id`, if the edge touches it.
    pub fn counterpart(&self, anchor_id: &str) -> Option<&str> {
        if self.source_id == anchor_id {
            Some(&self.target_id)
        } else if self.target_id == anchor_id {
            Some(&self.source_id)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Evidence record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvidenceRecord {
    pub drug_id: String,
    pub disease_id: String,
    pub disease_name: String,
    pub pmids: Vec<String>,
    /// Server-reported total from the first page, not `pmids.len()`.
    pub total_articles: u64,
    pub pages_fetched: u32,
}

impl EvidenceRecord {
    pub fn new(drug_id: impl Into<String>, disease_id: impl Into<String>) -> Self {
        let disease_id = disease_id.into();
        Self {
            drug_id: drug_id.into(),
            disease_name: pretty_label(&disease_id),
            disease_id,
            pmids: Vec::new(),
            total_articles: 0,
            pages_fetched: 0,
        }
    }

    /// Append PMIDs in order, skipping blanks and duplicates, never exceeding `cap`.
    /// Returns how many were actually retained.
    pub fn extend_pmids<I, S>(&mut self, pmids: I, cap: usize) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let before = self.pmids.len();
        for pmid in pmids {
            if self.pmids.len() >= cap {
                break;
            }
            let pmid = pmid.as_ref().trim();
            if pmid.is_empty() || self.pmids.iter().any(|p| p == pmid) {
                continue;
            }
            self.pmids.push(pmid.to_string());
        }
        self.pmids.len() - before
    }
}

// ---------------------------------------------------------------------------
// Identifier helpers
// ---------------------------------------------------------------------------

/// `@DISEASE_type_2_diabetes` → `type 2 diabetes`. Anything not following the
/// convention is returned unchanged.
pub fn pretty_label(id: &str) -> String {
    if id.starts_with('@') {
        if let Some((_, slug)) = id.split_once('_') {
            return slug.replace('_', " ");
        }
    }
    id.to_string()
}

/// Lowercase and collapse every non-alphanumeric run into a single space.
pub fn normalize_name(s: &str) -> String {
    let lower = s.to_lowercase();
    NON_ALNUM.replace_all(&lower, " ").trim().to_string()
}

/// Canonical identifier PubTator would mint for a plain name, e.g.
/// `("Metformin", Chemical)` → `@CHEMICAL_metformin`.
pub fn canonical_id(name: &str, kind: ConceptKind) -> String {
    let lower = name.to_lowercase();
    let slug = NON_ALNUM.replace_all(&lower, "_");
    format!("@{}_{}", kind.as_str(), slug.trim_matches('_'))
}
