// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::path::PathBuf;

use crate::errors::{RenderError, TransformError};
use crate::model::{Partition, PipelineResult, RecordBatch};

/// Turns one dataset partition into the batch a worker publishes.
#[async_trait]
pub trait Transform: Send + Sync {
    async fn transform(
        &self,
        partition: &Partition,
        category: &str,
    ) -> Result<RecordBatch, TransformError>;

    fn name(&self) -> &'static str;
}

/// Turns a merged result into an artifact on disk.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, result: &PipelineResult) -> Result<PathBuf, RenderError>;

    fn name(&self) -> &'static str;
}
