//! The evidence source trait seam and the in-memory implementation.

use std::sync::Mutex;

use super::error::EvidenceError;
use super::receipt::RawReceipt;

/// Read-side contract of the external evidence store.
///
/// Implementations return receipts ordered newest-first. The store is
/// append-only from this subsystem's perspective; there is no write path.
pub trait EvidenceSource: Send + Sync {
    /// Lists the most recent receipts, newest first, up to `limit`.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read.
    fn list_recent(&self, limit: usize) -> Result<Vec<RawReceipt>, EvidenceError>;
}

/// In-memory evidence store for tests and seeded deployments.
#[derive(Default)]
pub struct MemoryEvidenceStore {
    receipts: Mutex<Vec<RawReceipt>>,
}

impl MemoryEvidenceStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with receipts.
    #[must_use]
    pub fn with_receipts(receipts: Vec<RawReceipt>) -> Self {
        Self {
            receipts: Mutex::new(receipts),
        }
    }

    /// Appends a receipt.
    pub fn push(&self, receipt: RawReceipt) {
        self.receipts.lock().unwrap().push(receipt);
    }
}

impl EvidenceSource for MemoryEvidenceStore {
    fn list_recent(&self, limit: usize) -> Result<Vec<RawReceipt>, EvidenceError> {
        if limit == 0 {
            return Err(EvidenceError::InvalidLimit { limit });
        }

        let receipts = self.receipts.lock().unwrap();
        let mut out: Vec<RawReceipt> = receipts.clone();
        // Newest first. RFC 3339 strings compare chronologically; garbage
        // timestamps are still surfaced for the synthesis pass to skip.
        out.sort_by(|a, b| b.captured_at.cmp(&a.captured_at));
        out.truncate(limit);
        Ok(out)
    }
}
