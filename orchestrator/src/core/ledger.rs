//! Failure ledger
//!
//! Append-only record of units whose analysis failed. Written concurrently by
//! executor workers, read once the batch has drained.

use std::collections::BTreeMap;

use tokio::sync::Mutex;

use shared::{Iteration, MissingRate, SubjectId};

#[derive(Debug, Default)]
pub struct FailureLedger {
    entries: Mutex<Vec<(SubjectId, MissingRate, Iteration)>>,
}

impl FailureLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, subject: SubjectId, rate: MissingRate, iteration: Iteration) {
        self.entries.lock().await.push((subject, rate, iteration));
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Failures grouped by subject; per-subject order is append order
    pub async fn summary(&self) -> BTreeMap<SubjectId, Vec<(MissingRate, Iteration)>> {
        let entries = self.entries.lock().await;
        let mut summary: BTreeMap<SubjectId, Vec<(MissingRate, Iteration)>> = BTreeMap::new();
        for (subject, rate, iteration) in entries.iter() {
            summary.entry(subject.clone()).or_default().push((*rate, *iteration));
        }
        summary
    }
}
