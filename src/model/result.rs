// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};

use crate::errors::AggregatorError;
use crate::model::RecordBatch;

/// What to do when a category receives a second batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// A second batch for a category is an error.
    #[default]
    Reject,
    /// Records are appended in arrival order; metadata of the first batch wins.
    Concatenate,
}

/// Merged output of every category, in the order categories were inserted.
///
/// The aggregator inserts categories in their declared order, so iterating a
/// result never depends on which worker finished first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineResult {
    per_category: Vec<RecordBatch>,
}

impl PipelineResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a batch under its category according to `policy`.
    pub fn merge(&mut self, batch: RecordBatch, policy: MergePolicy) -> Result<(), AggregatorError> {
        match (self.position(&batch.category), policy) {
            (None, _) => {
                self.per_category.push(batch);
                Ok(())
            }
            (Some(_), MergePolicy::Reject) => Err(AggregatorError::DuplicateCategory(batch.category)),
            (Some(index), MergePolicy::Concatenate) => {
                let existing = &mut self.per_category[index];
                existing.records.extend(batch.records);
                existing.metadata.fill_from(&batch.metadata);
                Ok(())
            }
        }
    }

    /// Insert a batch for a category that has no entry yet.
    pub fn insert(&mut self, batch: RecordBatch) -> Result<(), AggregatorError> {
        self.merge(batch, MergePolicy::Reject)
    }

    pub fn get(&self, category: &str) -> Option<&RecordBatch> {
        self.position(category).map(|index| &self.per_category[index])
    }

    pub fn contains(&self, category: &str) -> bool {
        self.position(category).is_some()
    }

    /// Category names in insertion order.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.per_category.iter().map(|b| b.category.as_str())
    }

    /// `(category, batch)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RecordBatch)> {
        self.per_category.iter().map(|b| (b.category.as_str(), b))
    }

    pub fn len(&self) -> usize {
        self.per_category.len()
    }

    pub fn is_empty(&self) -> bool {
        self.per_category.is_empty()
    }

    pub fn total_records(&self) -> usize {
        self.per_category.iter().map(RecordBatch::len).sum()
    }

    fn position(&self, category: &str) -> Option<usize> {
        self.per_category.iter().position(|b| b.category == category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BatchMetadata, Record};

    fn batch(category: &str, observables: &[f64]) -> RecordBatch {
        RecordBatch::new(
            category,
            observables.iter().map(|o| Record::unweighted(*o)).collect(),
        )
    }

    #[test]
    fn test_iteration_follows_insertion_order() {
        let mut result = PipelineResult::new();
        for category in ["data", "signal", "background_zt", "background_zz"] {
            result.insert(batch(category, &[125.0])).unwrap();
        }

        let categories: Vec<&str> = result.categories().collect();
        assert_eq!(categories, vec!["data", "signal", "background_zt", "background_zz"]);
    }

    #[test]
    fn test_insert_rejects_duplicate_category() {
        let mut result = PipelineResult::new();
        result.insert(batch("signal", &[124.0])).unwrap();

        let err = result.insert(batch("signal", &[126.0])).unwrap_err();
        assert!(matches!(err, AggregatorError::DuplicateCategory(c) if c == "signal"));
        assert_eq!(result.get("signal").unwrap().len(), 1);
    }

    #[test]
    fn test_concatenate_appends_records_and_keeps_first_metadata() {
        let mut result = PipelineResult::new();
        let first = batch("background_zt", &[91.0]).with_metadata(BatchMetadata::new(
            Some("#6b59d3".to_string()),
            None,
        ));
        let second = batch("background_zt", &[92.0, 93.0]).with_metadata(BatchMetadata::new(
            Some("#000000".to_string()),
            Some("Background $Z,t\\bar{t}$".to_string()),
        ));

        result.merge(first, MergePolicy::Concatenate).unwrap();
        result.merge(second, MergePolicy::Concatenate).unwrap();

        let merged = result.get("background_zt").unwrap();
        let observables: Vec<f64> = merged.records.iter().map(|r| r.observable).collect();
        assert_eq!(observables, vec![91.0, 92.0, 93.0]);
        assert_eq!(merged.metadata.color.as_deref(), Some("#6b59d3"));
        assert_eq!(merged.metadata.label.as_deref(), Some("Background $Z,t\\bar{t}$"));
        assert_eq!(result.len(), 1);
    }
}
