// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for Kontrast.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::KontrastError;

/// Unique identifier for one upload/enhancement request.
///
/// Every artifact written for a request is keyed by this id, so two uploads
/// that share a filename never overwrite each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Contrast-enhancement algorithm selected by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    /// Global histogram equalization.
    #[default]
    HistogramEqualization,
    /// Adaptive histogram equalization (tile-based, low clip factor).
    AdaptiveHe,
    /// Contrast-limited adaptive histogram equalization.
    Clahe,
}

impl Method {
    /// All methods, in the order they are offered on the upload form.
    pub const ALL: [Method; 3] = [Self::HistogramEqualization, Self::AdaptiveHe, Self::Clahe];

    /// Wire keyword used in the upload form (`"HE"`, `"AHE"`, `"CLAHE"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HistogramEqualization => "HE",
            Self::AdaptiveHe => "AHE",
            Self::Clahe => "CLAHE",
        }
    }

    /// Human-readable name for result pages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::HistogramEqualization => "Histogram Equalization",
            Self::AdaptiveHe => "Adaptive Histogram Equalization",
            Self::Clahe => "Contrast Limited Adaptive Histogram Equalization",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Method {
    type Err = KontrastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HE" => Ok(Self::HistogramEqualization),
            "AHE" => Ok(Self::AdaptiveHe),
            "CLAHE" => Ok(Self::Clahe),
            other => Err(KontrastError::InvalidMethod(other.to_string())),
        }
    }
}

/// Tunables for the tile-based equalizers.
///
/// AHE and CLAHE share the tile grid and differ only in clip factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhanceParams {
    /// Number of tile columns.
    pub tile_cols: u32,
    /// Number of tile rows.
    pub tile_rows: u32,
    /// Clip factor used for [`Method::AdaptiveHe`].
    pub ahe_clip_factor: f32,
    /// Clip factor used for [`Method::Clahe`].
    pub clahe_clip_factor: f32,
}

impl Default for EnhanceParams {
    fn default() -> Self {
        Self {
            tile_cols: 8,
            tile_rows: 8,
            ahe_clip_factor: 2.0,
            clahe_clip_factor: 3.0,
        }
    }
}

/// The three artifact directories exposed for retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactKind {
    /// Original uploads.
    Upload,
    /// Enhanced images.
    Processed,
    /// Rendered histograms.
    Histogram,
}

impl ArtifactKind {
    /// URL path prefix under which artifacts of this kind are served.
    pub fn url_prefix(&self) -> &'static str {
        match self {
            Self::Upload => "/static/uploads/",
            Self::Processed => "/static/processed/",
            Self::Histogram => "/static/histograms/",
        }
    }

    /// Match a request path against the artifact prefixes, returning the
    /// kind and the remaining filename.
    pub fn from_path(path: &str) -> Option<(Self, &str)> {
        [Self::Upload, Self::Processed, Self::Histogram]
            .into_iter()
            .find_map(|kind| path.strip_prefix(kind.url_prefix()).map(|name| (kind, name)))
    }
}

/// Names of every file written for one successful request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredArtifacts {
    pub request_id: RequestId,
    pub method: Method,
    /// Filename inside the upload directory.
    pub original: String,
    /// Filename inside the processed directory.
    pub processed: String,
    /// Filename of the original's histogram inside the histogram directory.
    pub hist_original: String,
    /// Filename of the processed histogram inside the histogram directory.
    pub hist_processed: String,
    pub created_at: DateTime<Utc>,
}

/// Status of the embedded HTTP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerStatus {
    Stopped,
    Starting,
    Running,
    Error,
}
