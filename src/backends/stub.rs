// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::errors::{RenderError, TransformError};
use crate::model::{Partition, PipelineResult, Record, RecordBatch};
use crate::traits::{Renderer, Transform};

/// A transform that produces `records` synthetic events for any partition
pub struct StubTransform {
    pub records: usize,
    /// Category to stamp instead of the requested one
    pub category_override: Option<String>,
}

impl StubTransform {
    pub fn new(records: usize) -> Self {
        Self {
            records,
            category_override: None,
        }
    }

    /// Stamp every batch with `category`, whatever the worker asked for
    pub fn mislabelled(records: usize, category: impl Into<String>) -> Self {
        Self {
            records,
            category_override: Some(category.into()),
        }
    }
}

#[async_trait::async_trait]
impl Transform for StubTransform {
    async fn transform(
        &self,
        partition: &Partition,
        category: &str,
    ) -> Result<RecordBatch, TransformError> {
        let records = (0..self.records)
            .map(|i| Record::new(100.0 + i as f64, 1.0))
            .collect();
        let category = self.category_override.as_deref().unwrap_or(category);
        Ok(RecordBatch::new(category, records).with_metadata(partition.metadata.clone()))
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// A transform that always fails
pub struct FailingTransform;

#[async_trait::async_trait]
impl Transform for FailingTransform {
    async fn transform(
        &self,
        partition: &Partition,
        _category: &str,
    ) -> Result<RecordBatch, TransformError> {
        Err(TransformError::InvalidSource {
            path: partition.name.clone(),
            reason: "simulated transform failure".to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// A renderer that records every result it is handed
#[derive(Clone, Default)]
pub struct RecordingRenderer {
    calls: Arc<Mutex<Vec<PipelineResult>>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<PipelineResult> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Renderer for RecordingRenderer {
    async fn render(&self, result: &PipelineResult) -> Result<PathBuf, RenderError> {
        self.calls.lock().unwrap().push(result.clone());
        Ok(PathBuf::from("recorded.json"))
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// A renderer that always fails
pub struct FailingRenderer;

#[async_trait::async_trait]
impl Renderer for FailingRenderer {
    async fn render(&self, _result: &PipelineResult) -> Result<PathBuf, RenderError> {
        Err(RenderError::InvalidSettings(
            "simulated render failure".to_string(),
        ))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}
