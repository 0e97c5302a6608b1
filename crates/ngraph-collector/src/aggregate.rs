//! Per-pass accumulation of classified connections.

use ngraph_common::types::{AggregateCounts, ConnectionRecord};

use crate::classify::Classifier;

/// Feeds socket records through a [`Classifier`] into [`AggregateCounts`].
#[derive(Debug)]
pub struct Aggregator<'a> {
    classifier: &'a Classifier,
    counts: AggregateCounts,
    excluded: usize,
}

impl<'a> Aggregator<'a> {
    /// Starts an empty aggregation.
    #[must_use]
    pub fn new(classifier: &'a Classifier) -> Self {
        Self {
            classifier,
            counts: AggregateCounts::new(),
            excluded: 0,
        }
    }

    /// Counts `record` once, unless it is excluded.
    pub fn add(&mut self, record: &ConnectionRecord) {
        match self.classifier.classify(record) {
            Some(tuple) => self.counts.increment(tuple),
            None => self.excluded += 1,
        }
    }

    /// Counts every record of `records`.
    pub fn add_all<'r>(&mut self, records: impl IntoIterator<Item = &'r ConnectionRecord>) {
        for record in records {
            self.add(record);
        }
    }

    /// Number of records dropped by exclusion rules so far.
    #[must_use]
    pub const fn excluded(&self) -> usize {
        self.excluded
    }

    /// Finishes the aggregation.
    #[must_use]
    pub fn finish(self) -> AggregateCounts {
        self.counts
    }
}
