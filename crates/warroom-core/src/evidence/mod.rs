//! Evidence ingestion boundary.
//!
//! The evidence store is an external collaborator: an append-only collection
//! of immutable, timestamped receipts, each asserting a fact with a
//! confidence score and a verification gate. This module owns the read-side
//! contract only; receipts are never created or mutated here.
//!
//! Ingestion is permissive: receipts arrive with string timestamps, and a
//! receipt whose timestamp does not parse is skipped, never an error.

mod error;
mod receipt;
mod source;


pub use error::EvidenceError;
pub use receipt::{ConfidenceGate, EvidenceReceipt, RawReceipt};
pub use source::{EvidenceSource, MemoryEvidenceStore};
