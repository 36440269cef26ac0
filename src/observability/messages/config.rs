// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for configuration findings.

use crate::errors::ValidationError;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// An advisory validation finding that does not stop the load.
///
/// # Log Level
/// `warn!` - Potential issue
pub struct ConfigurationWarning<'a> {
    pub warning: &'a ValidationError,
}

impl Display for ConfigurationWarning<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Configuration warning: {}", self.warning)
    }
}

impl StructuredLog for ConfigurationWarning<'_> {
    fn log(&self) {
        tracing::warn!(warning = %self.warning, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("configuration_warning", span_name = name)
    }
}
