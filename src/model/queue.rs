// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};

/// Declaration of a broker queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueSpec {
    pub name: String,
    pub durable: bool,
    pub persistent_delivery: bool,
}

impl QueueSpec {
    /// A durable queue whose messages are published persistently. Every queue
    /// in the pipeline is declared this way.
    pub fn durable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            durable: true,
            persistent_delivery: true,
        }
    }

    /// A non-durable queue with transient delivery.
    pub fn transient(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            durable: false,
            persistent_delivery: false,
        }
    }
}
