//! treatmap-pipeline: Batch drug–disease evidence pipeline.
//!
//! Stages per run:
//!   1. Seeds from a `SeedProvider` (static list or local LLM)
//!   2. Resolve each seed to PubTator entity ids
//!   3. Relation lookup for the opposite concept
//!   4. Paginated evidence search per surviving pair
//!
//! Finalization writes the JSON artifact and the CSV summary into the run directory.

pub mod artifact;
pub mod pipeline;
pub mod resolve;
pub mod seeds;

pub use artifact::{DropReason, DropRecord, IndicationRecord, Limits, PipelineArtifact, SeedResolution, SummaryRow};
pub use pipeline::{Pipeline, PipelineReport, RunContext};
pub use seeds::{OllamaSeeds, SeedProvider, StaticSeeds};
