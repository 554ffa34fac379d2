//! Batching planner
//!
//! Groups documents into size-bounded batches. Documents are taken largest
//! first; anything over half the limit travels alone, the rest fill batches
//! of at most three without exceeding the limit.

use crate::constants::limits::MAX_DOCUMENTS_PER_BATCH;
use crate::types::SourceDocument;
use crate::types::document::{describe, total_size};

/// Documents sent together in one generation request
#[derive(Debug, Clone, Default)]
pub struct Batch {
    documents: Vec<SourceDocument>,
}

impl Batch {
    pub fn documents(&self) -> &[SourceDocument] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn total_size(&self) -> u64 {
        total_size(&self.documents)
    }

    /// Document names for logs and error messages
    pub fn describe(&self) -> String {
        describe(&self.documents)
    }
}

impl From<Vec<SourceDocument>> for Batch {
    fn from(documents: Vec<SourceDocument>) -> Self {
        Self { documents }
    }
}

/// Partition `documents` into batches bounded by `max_batch_bytes`.
///
/// Deterministic for a given input order; ties in size keep input order.
pub fn plan(documents: &[SourceDocument], max_batch_bytes: u64) -> Vec<Batch> {
    let mut sorted = documents.to_vec();
    sorted.sort_by(|a, b| b.size_bytes().cmp(&a.size_bytes()));

    let singleton_threshold = max_batch_bytes / 2;
    let mut batches = Vec::new();
    let mut current: Vec<SourceDocument> = Vec::new();
    let mut current_size = 0u64;

    for document in sorted {
        let size = document.size_bytes();
        if size > singleton_threshold {
            batches.push(Batch::from(vec![document]));
            continue;
        }

        let would_overflow = current_size.saturating_add(size) > max_batch_bytes;
        if !current.is_empty() && (would_overflow || current.len() >= MAX_DOCUMENTS_PER_BATCH) {
            batches.push(Batch::from(std::mem::take(&mut current)));
            current_size = 0;
        }

        current_size += size;
        current.push(document);
    }

    if !current.is_empty() {
        batches.push(Batch::from(current));
    }

    batches
}
