// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Error types for gotestiful-events

use thiserror::Error;

/// Errors that can occur while decoding test events
#[derive(Debug, Error)]
pub enum EventsError {
    /// Error parsing JSON
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}
