use crate::record::SpecificationRecord;
use log::debug;
use serde::{Deserialize, Serialize};

/// The finished output of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiSpecDocument {
    /// Records in traversal order, then declaration order within a file
    pub api_specs: Vec<SpecificationRecord>,
}

impl ApiSpecDocument {
    pub fn len(&self) -> usize {
        self.api_specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.api_specs.is_empty()
    }

    /// Counts over the records, for reporting.
    pub fn summary(&self, files_processed: usize) -> Summary {
        Summary {
            files_processed,
            routes: self.api_specs.len(),
            unresolved_handlers: self.api_specs.iter().filter(|r| !r.is_resolved()).count(),
            auth_protected: self.api_specs.iter().filter(|r| r.auth_required).count(),
        }
    }
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub files_processed: usize,
    pub routes: usize,
    /// Records whose `controller_code` is a diagnostic
    pub unresolved_handlers: usize,
    pub auth_protected: usize,
}

/// Collects records into an [`ApiSpecDocument`].
///
/// Records are appended, never modified: once pushed a record is final.
#[derive(Debug, Default)]
pub struct SpecificationAggregator {
    records: Vec<SpecificationRecord>,
}

impl SpecificationAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one batch of records, preserving their order.
    pub fn extend<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = SpecificationRecord>,
    {
        let before = self.records.len();
        self.records.extend(records);
        debug!("Aggregated {} records", self.records.len() - before);
    }

    pub fn build(self) -> ApiSpecDocument {
        ApiSpecDocument {
            api_specs: self.records,
        }
    }
}
