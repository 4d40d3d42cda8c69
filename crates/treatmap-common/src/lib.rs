//! treatmap-common: Shared types, errors, and the HTTP transport seam used across all treatmap crates.

pub mod error;
pub mod entities;
pub mod transport;

// Re-export commonly used types
pub use entities::{canonical_id, normalize_name, pretty_label, ConceptKind, EntityRef, EvidenceRecord, RelationEdge};
pub use error::{Result, TreatmapError};
pub use transport::{HttpReply, HttpTransport, ReqwestTransport};
