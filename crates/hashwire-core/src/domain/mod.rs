//! Domain models for Hashwire.
//!
//! Canonical definitions for the core entities:
//! - `Metric`: a named numeric fact with unit and sanity bounds, or unknown
//! - `EvidenceSource`: provenance for values derived from documents
//! - `DataSnapshot`: one aggregation cycle's on-chain, sustainability and trend data

pub mod error;
pub mod evidence;
pub mod metric;
pub mod snapshot;

// Re-export main types and errors
pub use error::{ErrorKind, HashwireError, Result};
pub use evidence::{site_of, EvidenceDocument, EvidenceSource};
pub use metric::{Metric, MetricKind, SanityBounds};
pub use snapshot::{DataSnapshot, SustainabilitySnapshot, TrendSignal, TrendSnapshot};
