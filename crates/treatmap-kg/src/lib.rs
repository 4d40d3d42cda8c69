//! treatmap-kg: Drug–disease graph built from a pipeline artifact.
//! Exports nodes/edges CSV and GraphML next to the artifact, and ranks
//! drugs and diseases by publication volume.

pub mod analytics;
pub mod graph;

pub use analytics::{AnalyticsReport, DrugBreadth, GraphTables, RankedNode};
pub use graph::{DrugDiseaseGraph, EdgeRow, GraphEdge, GraphExports, GraphNode, NodeType};
