// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! In-process transform and renderer for the four-lepton mass analysis.

pub mod histogram;
pub mod transform;

pub use histogram::{Histogram, HistogramRenderer, HistogramSeries};
pub use transform::JsonPartitionTransform;
