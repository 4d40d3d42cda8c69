//! Run artifact: the JSON document and its flat CSV summary.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use treatmap_common::{pretty_label, ConceptKind, EvidenceRecord, Result};

/// Column order of the `_summary.csv` file.
pub const SUMMARY_HEADER: [&str; 6] = [
    "drug_name",
    "drug_id",
    "disease_name",
    "disease_id",
    "pmid_count",
    "total_articles",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineArtifact {
    pub run_id: String,
    pub started_at: String,
    #[serde(default)]
    pub finished_at: Option<String>,
    pub anchor: ConceptKind,
    pub relation_type: String,
    pub seed_source: String,
    pub seeds: Vec<String>,
    /// Seeds that resolved to at least one id.
    pub resolutions: Vec<SeedResolution>,
    /// One record per resolved id that had relations.
    pub indications: Vec<IndicationRecord>,
    pub dropped: Vec<DropRecord>,
    pub limits: Limits,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedResolution {
    pub seed: String,
    /// Preference-ordered, capped.
    pub entity_ids: Vec<String>,
    /// Size of the unfiltered autocomplete list.
    pub total_entity_ids: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicationRecord {
    pub seed: String,
    pub anchor_id: String,
    /// Counterparts ranked by publication count, capped.
    pub counterpart_ids: Vec<String>,
    pub total_counterparts: usize,
    pub evidence: Vec<EvidenceRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Autocomplete returned nothing for the seed or its lowercase form.
    Unresolved,
    /// Relation lookup returned nothing for this id.
    NoRelations,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropRecord {
    pub seed: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    pub reason: DropReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    pub max_entity_ids: usize,
    pub max_counterparts: usize,
    pub max_pmids: usize,
}

/// One line of the CSV summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub drug_name: String,
    pub drug_id: String,
    pub disease_name: String,
    pub disease_id: String,
    pub pmid_count: usize,
    pub total_articles: u64,
}

impl PipelineArtifact {
    /// Display name of the drug side of an evidence record.
    pub fn drug_name(&self, indication: &IndicationRecord, evidence: &EvidenceRecord) -> String {
        match self.anchor {
            ConceptKind::Chemical => indication.seed.clone(),
            ConceptKind::Disease => pretty_label(&evidence.drug_id),
        }
    }

    pub fn summary_rows(&self) -> Vec<SummaryRow> {
        self.indications
            .iter()
            .flat_map(|ind| {
                ind.evidence.iter().map(move |ev| SummaryRow {
                    drug_name: self.drug_name(ind, ev),
                    drug_id: ev.drug_id.clone(),
                    disease_name: ev.disease_name.clone(),
                    disease_id: ev.disease_id.clone(),
                    pmid_count: ev.pmids.len(),
                    total_articles: ev.total_articles,
                })
            })
            .collect()
    }

    /// "X treats Y. PMIDs: …" for every pair with at least one PMID.
    pub fn chat_lines(&self) -> Vec<String> {
        self.indications
            .iter()
            .flat_map(|ind| {
                ind.evidence.iter().filter(|ev| !ev.pmids.is_empty()).map(move |ev| {
                    format!(
                        "{} treats {}. PMIDs: {}",
                        self.drug_name(ind, ev),
                        ev.disease_name,
                        ev.pmids.join(", ")
                    )
                })
            })
            .collect()
    }

    pub fn evidence_count(&self) -> usize {
        self.indications.iter().map(|i| i.evidence.len()).sum()
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let mut w = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut w, self)?;
        w.write_all(b"\n")?;
        w.flush()?;
        Ok(())
    }

    pub fn read_json(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }

    /// Header is written even when there are no rows.
    pub fn write_summary_csv(&self, path: &Path) -> Result<()> {
        let mut wtr = csv::WriterBuilder::new().has_headers(false).from_path(path)?;
        wtr.write_record(SUMMARY_HEADER)?;
        for row in self.summary_rows() {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn artifact(anchor: ConceptKind) -> PipelineArtifact {
        let mut ev = EvidenceRecord::new("@CHEMICAL_metformin", "@DISEASE_type_2_diabetes");
        ev.extend_pmids(["111", "222"], 10);
        ev.total_articles = 54;
        ev.pages_fetched = 1;
        let empty = EvidenceRecord::new("@CHEMICAL_metformin", "@DISEASE_obesity");

        PipelineArtifact {
            run_id: "20260101_120000".into(),
            started_at: "2026-01-01 12:00:00".into(),
            finished_at: None,
            anchor,
            relation_type: "treat".into(),
            seed_source: "static".into(),
            seeds: vec!["Metformin".into()],
            resolutions: vec![],
            indications: vec![IndicationRecord {
                seed: "Metformin".into(),
                anchor_id: "@CHEMICAL_metformin".into(),
                counterpart_ids: vec!["@DISEASE_type_2_diabetes".into(), "@DISEASE_obesity".into()],
                total_counterparts: 2,
                evidence: vec![ev, empty],
            }],
            dropped: vec![DropRecord { seed: "zzz".into(), entity_id: None, reason: DropReason::Unresolved }],
            limits: Limits { max_entity_ids: 200, max_counterparts: 200, max_pmids: 10 },
        }
    }

    #[test]
    fn test_chat_lines_skip_pairs_without_pmids() {
        assert_eq!(
            artifact(ConceptKind::Chemical).chat_lines(),
            vec!["Metformin treats type 2 diabetes. PMIDs: 111, 222"]
        );
    }

    #[test]
    fn test_drug_name_follows_anchor() {
        let a = artifact(ConceptKind::Disease);
        assert_eq!(a.summary_rows()[0].drug_name, "metformin");
        let a = artifact(ConceptKind::Chemical);
        assert_eq!(a.summary_rows()[0].drug_name, "Metformin");
    }

    #[test]
    fn test_summary_csv_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        artifact(ConceptKind::Chemical).write_summary_csv(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "drug_name,drug_id,disease_name,disease_id,pmid_count,total_articles");
        assert_eq!(lines[1], "Metformin,@CHEMICAL_metformin,type 2 diabetes,@DISEASE_type_2_diabetes,2,54");
        assert_eq!(lines[2], "Metformin,@CHEMICAL_metformin,obesity,@DISEASE_obesity,0,0");
    }

    #[test]
    fn test_json_reload_and_drop_reason_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        let a = artifact(ConceptKind::Chemical);
        a.write_json(&path).unwrap();

        let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["dropped"][0]["reason"], "unresolved");
        assert_eq!(raw["anchor"], "chemical");
        assert!(raw["dropped"][0].get("entity_id").is_none());

        assert_eq!(PipelineArtifact::read_json(&path).unwrap(), a);
    }
}
