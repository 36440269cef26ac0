// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Transform that reads pre-selected events from JSON files.
//!
//! Each partition source is a JSON array of events:
//!
//! ```json
//! [
//!   { "observable": 124.8, "weight": 0.0021 },
//!   { "observable": 91.3 }
//! ]
//! ```
//!
//! A missing `weight` means an unweighted event (weight 1.0), as for real
//! data. Sources are read in the order the partition lists them and their
//! events concatenated.

use async_trait::async_trait;
use serde::Deserialize;

use crate::errors::TransformError;
use crate::model::{Partition, Record, RecordBatch};
use crate::traits::Transform;

#[derive(Debug, Deserialize)]
struct SourceEvent {
    observable: f64,
    #[serde(default = "unit_weight")]
    weight: f64,
}

fn unit_weight() -> f64 {
    1.0
}

/// Reads a partition's JSON sources into one batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPartitionTransform;

impl JsonPartitionTransform {
    pub fn new() -> Self {
        Self
    }

    async fn read_source(&self, path: &str) -> Result<Vec<Record>, TransformError> {
        let content = tokio::fs::read(path)
            .await
            .map_err(|source| TransformError::Io {
                path: path.to_string(),
                source,
            })?;
        let events: Vec<SourceEvent> =
            serde_json::from_slice(&content).map_err(|err| TransformError::InvalidSource {
                path: path.to_string(),
                reason: err.to_string(),
            })?;

        events
            .into_iter()
            .enumerate()
            .map(|(index, event)| {
                if event.observable.is_finite() && event.weight.is_finite() {
                    Ok(Record::new(event.observable, event.weight))
                } else {
                    Err(TransformError::InvalidSource {
                        path: path.to_string(),
                        reason: format!("event {} is not finite", index),
                    })
                }
            })
            .collect()
    }
}

#[async_trait]
impl Transform for JsonPartitionTransform {
    async fn transform(
        &self,
        partition: &Partition,
        category: &str,
    ) -> Result<RecordBatch, TransformError> {
        if partition.sources.is_empty() {
            return Err(TransformError::EmptyPartition(partition.name.clone()));
        }

        let mut records = Vec::new();
        for source in &partition.sources {
            records.extend(self.read_source(source).await?);
        }

        Ok(RecordBatch::new(category, records).with_metadata(partition.metadata.clone()))
    }

    fn name(&self) -> &'static str {
        "json_partition"
    }
}
