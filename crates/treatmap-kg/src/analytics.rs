//! Publication-volume rankings over an exported graph.
//!
//! Reads `nodes.csv`/`edges.csv` from a run directory (rows for the same
//! node pair are summed) and writes CSV tables under `<run_dir>/analytics/`.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use treatmap_common::{pretty_label, Result};

use crate::graph::{EdgeRow, GraphNode, NodeType, EDGES_CSV, NODES_CSV};

pub const ANALYTICS_DIR: &str = "analytics";
pub const DEFAULT_TOP_N: usize = 15;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedNode {
    pub id: String,
    pub label: String,
    pub total_articles: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrugBreadth {
    pub drug_name: String,
    pub unique_diseases: usize,
    pub total_articles: u64,
}

#[derive(Debug, Clone)]
pub struct AnalyticsReport {
    pub top_diseases: PathBuf,
    pub top_drugs: PathBuf,
    pub drug_breadth: PathBuf,
}

/// Node and edge tables of one run.
#[derive(Debug, Clone, Default)]
pub struct GraphTables {
    pub nodes: Vec<GraphNode>,
    /// One row per node pair, in first-seen order.
    pub edges: Vec<EdgeRow>,
}

impl GraphTables {
    pub fn load(run_dir: &Path) -> Result<Self> {
        let nodes_path = run_dir.join(NODES_CSV);
        let edges_path = run_dir.join(EDGES_CSV);
        debug!(nodes = %nodes_path.display(), edges = %edges_path.display(), "Loading graph tables");

        let mut nodes = Vec::new();
        for row in csv::Reader::from_path(&nodes_path)?.deserialize() {
            nodes.push(row?);
        }
        let mut edges = Vec::new();
        for row in csv::Reader::from_path(&edges_path)?.deserialize() {
            edges.push(row?);
        }
        Ok(Self::new(nodes, edges))
    }

    /// Merge edge rows sharing `(node_u, node_v)`: counts are summed, the
    /// first row's relation and lists are kept.
    pub fn new(nodes: Vec<GraphNode>, rows: Vec<EdgeRow>) -> Self {
        let mut index: HashMap<(String, String), usize> = HashMap::new();
        let mut edges: Vec<EdgeRow> = Vec::new();
        for row in rows {
            let key = (row.node_u.clone(), row.node_v.clone());
            match index.get(&key) {
                Some(&i) => {
                    edges[i].pmid_count += row.pmid_count;
                    edges[i].total_articles += row.total_articles;
                }
                None => {
                    index.insert(key, edges.len());
                    edges.push(row);
                }
            }
        }
        Self { nodes, edges }
    }

    fn ids_of(&self, node_type: NodeType) -> HashSet<&str> {
        self.nodes
            .iter()
            .filter(|n| n.node_type == node_type)
            .map(|n| n.id.as_str())
            .collect()
    }

    fn label_of(&self, id: &str) -> String {
        self.nodes
            .iter()
            .find(|n| n.id == id)
            .map(|n| n.label.clone())
            .unwrap_or_else(|| pretty_label(id))
    }

    /// Per node of `node_type`: (edge count, summed total_articles).
    fn tally(&self, node_type: NodeType) -> BTreeMap<&str, (usize, u64)> {
        let ids = self.ids_of(node_type);
        let mut out: BTreeMap<&str, (usize, u64)> = BTreeMap::new();
        for e in &self.edges {
            for end in [e.node_u.as_str(), e.node_v.as_str()] {
                if ids.contains(end) {
                    let slot = out.entry(end).or_default();
                    slot.0 += 1;
                    slot.1 += e.total_articles;
                }
            }
        }
        out
    }

    fn ranked(&self, node_type: NodeType, n: usize) -> Vec<RankedNode> {
        let mut rows: Vec<RankedNode> = self
            .tally(node_type)
            .into_iter()
            .map(|(id, (_, total))| RankedNode {
                id: id.to_string(),
                label: self.label_of(id),
                total_articles: total,
            })
            .collect();
        rows.sort_by(|a, b| b.total_articles.cmp(&a.total_articles).then_with(|| a.label.cmp(&b.label)));
        rows.truncate(n);
        rows
    }

    pub fn top_diseases(&self, n: usize) -> Vec<RankedNode> {
        self.ranked(NodeType::Disease, n)
    }

    pub fn top_drugs(&self, n: usize) -> Vec<RankedNode> {
        self.ranked(NodeType::Drug, n)
    }

    /// Unique diseases vs total articles for every drug node, widest first.
    /// Drugs without edges are listed with zeros.
    pub fn drug_breadth(&self) -> Vec<DrugBreadth> {
        let tally = self.tally(NodeType::Drug);
        let mut rows: Vec<DrugBreadth> = self
            .ids_of(NodeType::Drug)
            .into_iter()
            .map(|id| {
                let (deg, total) = tally.get(id).copied().unwrap_or_default();
                DrugBreadth { drug_name: id.to_string(), unique_diseases: deg, total_articles: total }
            })
            .collect();
        rows.sort_by(|a, b| {
            b.unique_diseases
                .cmp(&a.unique_diseases)
                .then_with(|| b.total_articles.cmp(&a.total_articles))
                .then_with(|| a.drug_name.cmp(&b.drug_name))
        });
        rows
    }

    /// Write the three tables into `<run_dir>/analytics/`.
    pub fn write_report(&self, run_dir: &Path, top_n: usize) -> Result<AnalyticsReport> {
        let dir = run_dir.join(ANALYTICS_DIR);
        std::fs::create_dir_all(&dir)?;

        let report = AnalyticsReport {
            top_diseases: dir.join(format!("top{top_n}_diseases_by_total_pubs.csv")),
            top_drugs: dir.join(format!("top{top_n}_drugs_by_pubs.csv")),
            drug_breadth: dir.join("drug_breadth_vs_pubs.csv"),
        };
        write_rows(&report.top_diseases, &self.top_diseases(top_n))?;
        write_rows(&report.top_drugs, &self.top_drugs(top_n))?;
        write_rows(&report.drug_breadth, &self.drug_breadth())?;

        info!(dir = %dir.display(), top_n, "Analytics written");
        Ok(report)
    }
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}
