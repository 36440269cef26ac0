// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Renderer that bins every category into a shared histogram.
//!
//! Each category becomes one series over the same bin edges. Per bin the
//! series holds the sum of weights and the sum of squared weights, from which
//! the statistical uncertainty `sqrt(sum_w2)` follows. Events outside
//! `[min, max)` are counted as underflow or overflow instead of being binned.
//! Records with a NaN or infinite observable or weight are only counted as
//! invalid.
//!
//! The artifact is a JSON document written to `<output_dir>/<file_name>`.
//!
//! # Example
//! ```
//! use the_fan_in::backends::local::Histogram;
//! use the_fan_in::model::{Record, RecordBatch};
//!
//! let mut histogram = Histogram::new(80.0, 250.0, 5.0).unwrap();
//! assert_eq!(histogram.bin_edges.len(), 35);
//!
//! let batch = RecordBatch::new("data", vec![Record::unweighted(124.0), Record::unweighted(300.0)]);
//! histogram.add_series(&batch);
//! assert_eq!(histogram.series[0].sum_w[8], 1.0);
//! assert_eq!(histogram.series[0].overflow, 1.0);
//! ```

use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;

use crate::config::HistogramConfig;
use crate::errors::RenderError;
use crate::model::{PipelineResult, RecordBatch};
use crate::traits::Renderer;

/// One category's binned contents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramSeries {
    pub category: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub entries: usize,
    pub sum_w: Vec<f64>,
    pub sum_w2: Vec<f64>,
    pub underflow: f64,
    pub overflow: f64,
    /// Records with a non-finite observable or weight, left out of every bin
    pub invalid: usize,
}

impl HistogramSeries {
    /// Statistical uncertainty per bin.
    pub fn errors(&self) -> Vec<f64> {
        self.sum_w2.iter().map(|w2| w2.sqrt()).collect()
    }
}

/// Fixed-width binning shared by every series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    /// `bins + 1` edges from `min` to `max`
    pub bin_edges: Vec<f64>,
    pub series: Vec<HistogramSeries>,
    #[serde(skip)]
    min: f64,
    #[serde(skip)]
    bin_width: f64,
}

impl Histogram {
    pub fn new(min: f64, max: f64, bin_width: f64) -> Result<Self, RenderError> {
        if !(min.is_finite() && max.is_finite() && bin_width.is_finite()) {
            return Err(RenderError::InvalidSettings(
                "histogram range must be finite".to_string(),
            ));
        }
        if bin_width <= 0.0 || max <= min {
            return Err(RenderError::InvalidSettings(format!(
                "cannot bin [{}, {}) with width {}",
                min, max, bin_width
            )));
        }

        let bins = ((max - min) / bin_width).round().max(1.0) as usize;
        let bin_edges = (0..=bins).map(|i| min + i as f64 * bin_width).collect();
        Ok(Self {
            bin_edges,
            series: Vec::new(),
            min,
            bin_width,
        })
    }

    pub fn bins(&self) -> usize {
        self.bin_edges.len().saturating_sub(1)
    }

    /// Bin `batch` as a new series.
    pub fn add_series(&mut self, batch: &RecordBatch) {
        let bins = self.bins();
        let mut series = HistogramSeries {
            category: batch.category.clone(),
            label: batch.display_label().to_string(),
            color: batch.metadata.color.clone(),
            entries: batch.len(),
            sum_w: vec![0.0; bins],
            sum_w2: vec![0.0; bins],
            underflow: 0.0,
            overflow: 0.0,
            invalid: 0,
        };

        for record in &batch.records {
            if !(record.observable.is_finite() && record.weight.is_finite()) {
                series.invalid += 1;
                continue;
            }
            let position = (record.observable - self.min) / self.bin_width;
            if position < 0.0 {
                series.underflow += record.weight;
            } else if position >= bins as f64 {
                series.overflow += record.weight;
            } else {
                let bin = position as usize;
                series.sum_w[bin] += record.weight;
                series.sum_w2[bin] += record.weight * record.weight;
            }
        }
        self.series.push(series);
    }
}

/// Writes the result as a JSON histogram.
#[derive(Debug, Clone)]
pub struct HistogramRenderer {
    settings: HistogramConfig,
    output_dir: PathBuf,
}

impl HistogramRenderer {
    pub fn new(settings: HistogramConfig, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            settings,
            output_dir: output_dir.into(),
        }
    }

    pub fn histogram(&self, result: &PipelineResult) -> Result<Histogram, RenderError> {
        let mut histogram = Histogram::new(
            self.settings.min,
            self.settings.max,
            self.settings.bin_width,
        )?;
        for (_, batch) in result.iter() {
            histogram.add_series(batch);
        }
        Ok(histogram)
    }
}

#[async_trait]
impl Renderer for HistogramRenderer {
    async fn render(&self, result: &PipelineResult) -> Result<PathBuf, RenderError> {
        let histogram = self.histogram(result)?;
        let body = serde_json::to_vec_pretty(&histogram)?;

        let io_error = |path: &PathBuf| {
            let path = path.display().to_string();
            move |source| RenderError::Io { path, source }
        };
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(io_error(&self.output_dir))?;
        let artifact = self.output_dir.join(&self.settings.file_name);
        tokio::fs::write(&artifact, body)
            .await
            .map_err(io_error(&artifact))?;

        Ok(artifact)
    }

    fn name(&self) -> &'static str {
        "histogram"
    }
}
