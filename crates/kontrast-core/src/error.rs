// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Kontrast.

use thiserror::Error;

/// Top-level error type for all Kontrast operations.
#[derive(Debug, Error)]
pub enum KontrastError {
    // -- Upload errors --
    #[error("no image file part in request")]
    MissingFile,

    #[error("image part has an empty filename")]
    EmptySelection,

    #[error("invalid enhancement method: {0:?}")]
    InvalidMethod(String),

    // -- Image errors --
    #[error("image decoding failed: {0}")]
    Decode(String),

    #[error("image encoding failed: {0}")]
    Encode(String),

    // -- HTTP errors --
    #[error("malformed HTTP request: {0}")]
    MalformedRequest(String),

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("server error: {0}")]
    Server(String),

    // -- Configuration / persistence --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, KontrastError>;
