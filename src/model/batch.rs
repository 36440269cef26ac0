// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};

/// One analysed event: the observable (e.g. a four-lepton invariant mass in GeV)
/// and the weight it contributes to a histogram.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub observable: f64,
    pub weight: f64,
}

impl Record {
    pub fn new(observable: f64, weight: f64) -> Self {
        Self { observable, weight }
    }

    /// An unweighted record, as produced for real data.
    pub fn unweighted(observable: f64) -> Self {
        Self::new(observable, 1.0)
    }
}

/// Presentation hints carried alongside a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl BatchMetadata {
    pub fn new(color: Option<String>, label: Option<String>) -> Self {
        Self { color, label }
    }

    /// Fill any unset field from `other`, keeping fields that are already set.
    pub fn fill_from(&mut self, other: &BatchMetadata) {
        if self.color.is_none() {
            self.color = other.color.clone();
        }
        if self.label.is_none() {
            self.label = other.label.clone();
        }
    }
}

/// The complete output of one worker for one category.
///
/// A batch is published as a single broker message and never mutated after
/// publish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordBatch {
    pub category: String,
    pub records: Vec<Record>,
    #[serde(default)]
    pub metadata: BatchMetadata,
}

impl RecordBatch {
    pub fn new(category: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            category: category.into(),
            records,
            metadata: BatchMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: BatchMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn total_weight(&self) -> f64 {
        self.records.iter().map(|r| r.weight).sum()
    }

    /// Label to show for this batch, falling back to the category name.
    pub fn display_label(&self) -> &str {
        self.metadata.label.as_deref().unwrap_or(&self.category)
    }
}
