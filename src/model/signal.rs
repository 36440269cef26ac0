// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Published by a worker once its batch is durably enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionSignal {
    pub sender_id: String,
    pub timestamp: SystemTime,
}

impl CompletionSignal {
    /// A signal stamped with the current wall-clock time.
    pub fn now(sender_id: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            timestamp: SystemTime::now(),
        }
    }
}
