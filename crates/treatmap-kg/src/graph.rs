//! Undirected drug–disease graph.
//!
//! Drug nodes are keyed by drug name, so several chemical ids resolved for one
//! seed collapse into one node. Disease nodes are keyed by disease id. One edge
//! per (drug, disease) carries the union of PMIDs, the summed server totals and
//! the chemical ids that contributed.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tracing::info;
use treatmap_common::{pretty_label, Result, TreatmapError};
use treatmap_pipeline::PipelineArtifact;

pub const NODES_CSV: &str = "nodes.csv";
pub const EDGES_CSV: &str = "edges.csv";
pub const GRAPHML: &str = "graph.graphml";

const GRAPHML_NS: &str = "http://graphml.graphdrawing.org/xmlns";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Drug,
    Disease,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Drug => "drug",
            NodeType::Disease => "disease",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphEdge {
    pub node_u: String,
    pub node_v: String,
    pub relation: String,
    pub pmids: BTreeSet<String>,
    pub total_articles: u64,
    pub chem_ids: BTreeSet<String>,
}

impl GraphEdge {
    pub fn pmid_count(&self) -> usize {
        self.pmids.len()
    }

    fn row(&self) -> EdgeRow {
        EdgeRow {
            node_u: self.node_u.clone(),
            node_v: self.node_v.clone(),
            relation: self.relation.clone(),
            pmid_count: self.pmid_count() as u64,
            total_articles: self.total_articles,
            pmids: join_pipe(&self.pmids),
            chem_ids: join_pipe(&self.chem_ids),
        }
    }
}

/// Flat `edges.csv` row; lists are `|`-joined and sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRow {
    pub node_u: String,
    pub node_v: String,
    pub relation: String,
    pub pmid_count: u64,
    pub total_articles: u64,
    #[serde(default)]
    pub pmids: String,
    #[serde(default)]
    pub chem_ids: String,
}

fn join_pipe(set: &BTreeSet<String>) -> String {
    set.iter().map(String::as_str).collect::<Vec<_>>().join("|")
}

#[derive(Debug, Clone)]
pub struct GraphExports {
    pub nodes_csv: PathBuf,
    pub edges_csv: PathBuf,
    pub graphml: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct DrugDiseaseGraph {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    node_index: HashMap<String, usize>,
    edge_index: HashMap<(String, String), usize>,
}

impl DrugDiseaseGraph {
    pub fn from_artifact(artifact: &PipelineArtifact) -> Self {
        let mut g = Self::default();

        for ind in &artifact.indications {
            for ev in &ind.evidence {
                let drug = artifact.drug_name(ind, ev);
                g.add_node(&drug, &drug, NodeType::Drug);
                g.add_node(&ev.disease_id, &pretty_label(&ev.disease_id), NodeType::Disease);

                let edge = g.edge_mut(&drug, &ev.disease_id, &artifact.relation_type);
                edge.pmids.extend(ev.pmids.iter().filter(|p| !p.is_empty()).cloned());
                edge.total_articles += ev.total_articles;
                edge.chem_ids.insert(ev.drug_id.clone());
            }
        }
        g
    }

    fn add_node(&mut self, id: &str, label: &str, node_type: NodeType) {
        if self.node_index.contains_key(id) {
            return;
        }
        self.node_index.insert(id.to_string(), self.nodes.len());
        self.nodes.push(GraphNode { id: id.to_string(), label: label.to_string(), node_type });
    }

    fn edge_mut(&mut self, u: &str, v: &str, relation: &str) -> &mut GraphEdge {
        let key = (u.to_string(), v.to_string());
        let idx = match self.edge_index.get(&key) {
            Some(&i) => i,
            None => {
                self.edges.push(GraphEdge {
                    node_u: u.to_string(),
                    node_v: v.to_string(),
                    relation: relation.to_string(),
                    pmids: BTreeSet::new(),
                    total_articles: 0,
                    chem_ids: BTreeSet::new(),
                });
                self.edge_index.insert(key, self.edges.len() - 1);
                self.edges.len() - 1
            }
        };
        &mut self.edges[idx]
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.node_index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn edge(&self, u: &str, v: &str) -> Option<&GraphEdge> {
        self.edge_index
            .get(&(u.to_string(), v.to_string()))
            .map(|&i| &self.edges[i])
    }

    // ── Export ───────────────────────────────────────────────────────────────

    /// Write nodes.csv, edges.csv and graph.graphml into `dir`.
    pub fn export(&self, dir: &Path) -> Result<GraphExports> {
        let out = GraphExports {
            nodes_csv: dir.join(NODES_CSV),
            edges_csv: dir.join(EDGES_CSV),
            graphml: dir.join(GRAPHML),
        };
        self.write_nodes_csv(&out.nodes_csv)?;
        self.write_edges_csv(&out.edges_csv)?;
        std::fs::write(&out.graphml, self.to_graphml()?)?;
        info!(
            nodes = self.nodes.len(),
            edges = self.edges.len(),
            dir = %dir.display(),
            "Graph exported"
        );
        Ok(out)
    }

    pub fn write_nodes_csv(&self, path: &Path) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path)?;
        for node in &self.nodes {
            wtr.serialize(node)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn write_edges_csv(&self, path: &Path) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path)?;
        for edge in &self.edges {
            wtr.serialize(edge.row())?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// GraphML document with string/int attribute keys for nodes and edges.
    pub fn to_graphml(&self) -> Result<Vec<u8>> {
        let mut w = Writer::new_with_indent(Vec::new(), b' ', 2);

        w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None))).map_err(xml_err)?;
        w.write_event(Event::Start(BytesStart::new("graphml").with_attributes([("xmlns", GRAPHML_NS)])))
            .map_err(xml_err)?;

        let keys = [
            ("d0", "node", "label", "string"),
            ("d1", "node", "type", "string"),
            ("d2", "edge", "relation", "string"),
            ("d3", "edge", "pmid_count", "long"),
            ("d4", "edge", "total_articles", "long"),
            ("d5", "edge", "pmids", "string"),
            ("d6", "edge", "chem_ids", "string"),
        ];
        for (id, domain, name, ty) in keys {
            let key = BytesStart::new("key").with_attributes([
                ("id", id),
                ("for", domain),
                ("attr.name", name),
                ("attr.type", ty),
            ]);
            w.write_event(Event::Empty(key)).map_err(xml_err)?;
        }

        w.write_event(Event::Start(BytesStart::new("graph").with_attributes([("edgedefault", "undirected")])))
            .map_err(xml_err)?;

        for node in &self.nodes {
            w.write_event(Event::Start(BytesStart::new("node").with_attributes([("id", node.id.as_str())])))
                .map_err(xml_err)?;
            write_data(&mut w, "d0", &node.label)?;
            write_data(&mut w, "d1", node.node_type.as_str())?;
            w.write_event(Event::End(BytesEnd::new("node"))).map_err(xml_err)?;
        }

        for edge in &self.edges {
            let row = edge.row();
            let start = BytesStart::new("edge")
                .with_attributes([("source", row.node_u.as_str()), ("target", row.node_v.as_str())]);
            w.write_event(Event::Start(start)).map_err(xml_err)?;
            write_data(&mut w, "d2", &row.relation)?;
            write_data(&mut w, "d3", &row.pmid_count.to_string())?;
            write_data(&mut w, "d4", &row.total_articles.to_string())?;
            write_data(&mut w, "d5", &row.pmids)?;
            write_data(&mut w, "d6", &row.chem_ids)?;
            w.write_event(Event::End(BytesEnd::new("edge"))).map_err(xml_err)?;
        }

        w.write_event(Event::End(BytesEnd::new("graph"))).map_err(xml_err)?;
        w.write_event(Event::End(BytesEnd::new("graphml"))).map_err(xml_err)?;
        Ok(w.into_inner())
    }
}

fn write_data(w: &mut Writer<Vec<u8>>, key: &str, value: &str) -> Result<()> {
    w.write_event(Event::Start(BytesStart::new("data").with_attributes([("key", key)])))
        .map_err(xml_err)?;
    w.write_event(Event::Text(BytesText::new(value))).map_err(xml_err)?;
    w.write_event(Event::End(BytesEnd::new("data"))).map_err(xml_err)?;
    Ok(())
}

fn xml_err<E: std::fmt::Display>(e: E) -> TreatmapError {
    TreatmapError::Xml(format!("GraphML: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use treatmap_common::{ConceptKind, EvidenceRecord};
    use treatmap_pipeline::{IndicationRecord, Limits};

    fn evidence(drug: &str, disease: &str, pmids: &[&str], total: u64) -> EvidenceRecord {
        let mut ev = EvidenceRecord::new(drug, disease);
        ev.extend_pmids(pmids.iter().copied(), 10);
        ev.total_articles = total;
        ev.pages_fetched = 1;
        ev
    }

    fn sample_artifact() -> PipelineArtifact {
        PipelineArtifact {
            run_id: "20260101_120000".into(),
            started_at: "2026-01-01 12:00:00".into(),
            finished_at: None,
            anchor: ConceptKind::Chemical,
            relation_type: "treat".into(),
            seed_source: "static".into(),
            seeds: vec!["metformin".into(), "warfarin".into()],
            resolutions: vec![],
            indications: vec![
                IndicationRecord {
                    seed: "metformin".into(),
                    anchor_id: "@CHEMICAL_metformin".into(),
                    counterpart_ids: vec![],
                    total_counterparts: 2,
                    evidence: vec![
                        evidence("@CHEMICAL_metformin", "@DISEASE_type_2_diabetes", &["3", "1"], 40),
                        evidence("@CHEMICAL_metformin", "@DISEASE_obesity", &["9"], 5),
                    ],
                },
                IndicationRecord {
                    seed: "metformin".into(),
                    anchor_id: "@CHEMICAL_metformin_hcl".into(),
                    counterpart_ids: vec![],
                    total_counterparts: 1,
                    evidence: vec![evidence("@CHEMICAL_metformin_hcl", "@DISEASE_type_2_diabetes", &["1", "2"], 10)],
                },
                IndicationRecord {
                    seed: "warfarin".into(),
                    anchor_id: "@CHEMICAL_warfarin".into(),
                    counterpart_ids: vec![],
                    total_counterparts: 1,
                    evidence: vec![evidence("@CHEMICAL_warfarin", "@DISEASE_atrial_fibrillation", &["7"], 70)],
                },
            ],
            dropped: vec![],
            limits: Limits { max_entity_ids: 200, max_counterparts: 200, max_pmids: 10 },
        }
    }

    #[test]
    fn test_chemical_ids_collapse_into_drug_node() {
        let g = DrugDiseaseGraph::from_artifact(&sample_artifact());
        let ids: Vec<&str> = g.nodes().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "metformin",
                "@DISEASE_type_2_diabetes",
                "@DISEASE_obesity",
                "warfarin",
                "@DISEASE_atrial_fibrillation",
            ]
        );
        assert_eq!(g.node("@DISEASE_obesity").unwrap().label, "obesity");
        assert_eq!(g.edges().len(), 3);

        let e = g.edge("metformin", "@DISEASE_type_2_diabetes").unwrap();
        assert_eq!(e.pmids.iter().cloned().collect::<Vec<_>>(), vec!["1", "2", "3"]);
        assert_eq!(e.pmid_count(), 3);
        assert_eq!(e.total_articles, 50);
        assert_eq!(e.chem_ids.len(), 2);
    }

    #[test]
    fn test_csv_exports() {
        let dir = tempfile::tempdir().unwrap();
        let out = DrugDiseaseGraph::from_artifact(&sample_artifact()).export(dir.path()).unwrap();

        let nodes = std::fs::read_to_string(&out.nodes_csv).unwrap();
        assert_eq!(nodes.lines().next(), Some("id,label,type"));
        assert!(nodes.lines().any(|l| l == "@DISEASE_type_2_diabetes,type 2 diabetes,disease"));
        assert!(nodes.lines().any(|l| l == "metformin,metformin,drug"));

        let edges = std::fs::read_to_string(&out.edges_csv).unwrap();
        let lines: Vec<&str> = edges.lines().collect();
        assert_eq!(lines[0], "node_u,node_v,relation,pmid_count,total_articles,pmids,chem_ids");
        assert_eq!(
            lines[1],
            "metformin,@DISEASE_type_2_diabetes,treat,3,50,1|2|3,@CHEMICAL_metformin|@CHEMICAL_metformin_hcl"
        );
        assert!(out.graphml.exists());
    }

    #[test]
    fn test_graphml_structure() {
        let g = DrugDiseaseGraph::from_artifact(&sample_artifact());
        let xml = String::from_utf8(g.to_graphml().unwrap()).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains(r#"<graph edgedefault="undirected">"#));
        assert!(xml.contains(r#"<key id="d4" for="edge" attr.name="total_articles" attr.type="long"/>"#));
        assert!(xml.contains(r#"<edge source="warfarin" target="@DISEASE_atrial_fibrillation">"#));
        assert_eq!(xml.matches("<node ").count(), 5);
        assert_eq!(xml.matches("<edge ").count(), 3);
    }

    #[test]
    fn test_graphml_escapes_text() {
        let mut a = sample_artifact();
        a.indications[0].seed = "A & B <x>".into();
        let xml = String::from_utf8(DrugDiseaseGraph::from_artifact(&a).to_graphml().unwrap()).unwrap();
        assert!(xml.contains("A &amp; B &lt;x&gt;"));
        assert!(!xml.contains("A & B <x>"));
    }
}
