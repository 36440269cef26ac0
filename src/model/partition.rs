// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};

use crate::model::BatchMetadata;

/// The slice of the dataset a single worker is responsible for.
///
/// Partitions are disjoint: no source appears in two partitions of the same
/// deployment. The core never looks inside `sources`; only the transform does.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    pub name: String,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub metadata: BatchMetadata,
}

impl Partition {
    pub fn new(name: impl Into<String>, sources: Vec<String>) -> Self {
        Self {
            name: name.into(),
            sources,
            metadata: BatchMetadata::default(),
        }
    }
}
