// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Flat-file artifact store.
//
// Three directories hold the original uploads, the enhanced images and the
// rendered histograms. Every file written for a request is named after its
// `RequestId`:
//
//   uploads/<id>.<ext>
//   processed/processed_<id>.<ext>
//   histograms/hist_original_<id>.png
//   histograms/hist_processed_<id>.png

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use kontrast_core::error::{KontrastError, Result};
use kontrast_core::{AppConfig, ArtifactKind, Method, RequestId, StoredArtifacts};

/// Longest filename accepted for retrieval.
const MAX_FILENAME_LENGTH: usize = 255;

/// Longest upload extension kept as-is.
const MAX_EXTENSION_LENGTH: usize = 5;

/// Extension used when the uploaded name has no usable one.
const FALLBACK_EXTENSION: &str = "img";

/// Everything produced for one request, ready to be written.
#[derive(Debug, Clone, Copy)]
pub struct NewArtifacts<'a> {
    pub request_id: RequestId,
    pub method: Method,
    /// Filename the client gave the upload (only its extension is used).
    pub upload_filename: &'a str,
    pub original: &'a [u8],
    /// Extension matching the encoding of `processed`.
    pub processed_extension: &'a str,
    pub processed: &'a [u8],
    pub hist_original: &'a [u8],
    pub hist_processed: &'a [u8],
}

/// The three artifact directories.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    upload_dir: PathBuf,
    processed_dir: PathBuf,
    histogram_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(
        upload_dir: impl Into<PathBuf>,
        processed_dir: impl Into<PathBuf>,
        histogram_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            processed_dir: processed_dir.into(),
            histogram_dir: histogram_dir.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            &config.upload_dir,
            &config.processed_dir,
            &config.histogram_dir,
        )
    }

    /// Create the directories if they do not exist yet.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.upload_dir, &self.processed_dir, &self.histogram_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Directory backing an artifact kind.
    pub fn dir(&self, kind: ArtifactKind) -> &Path {
        match kind {
            ArtifactKind::Upload => &self.upload_dir,
            ArtifactKind::Processed => &self.processed_dir,
            ArtifactKind::Histogram => &self.histogram_dir,
        }
    }

    /// Write all four files of a request.
    ///
    /// If any write fails, files already written for the request are removed
    /// so no partial result is left behind.
    #[instrument(skip_all, fields(request_id = %artifacts.request_id))]
    pub fn persist(&self, artifacts: &NewArtifacts<'_>) -> Result<StoredArtifacts> {
        let id = artifacts.request_id;
        let stored = StoredArtifacts {
            request_id: id,
            method: artifacts.method,
            original: format!("{id}.{}", upload_extension(artifacts.upload_filename)),
            processed: format!("processed_{id}.{}", artifacts.processed_extension),
            hist_original: format!("hist_original_{id}.png"),
            hist_processed: format!("hist_processed_{id}.png"),
            created_at: Utc::now(),
        };

        let writes = [
            (self.upload_dir.join(&stored.original), artifacts.original),
            (self.processed_dir.join(&stored.processed), artifacts.processed),
            (self.histogram_dir.join(&stored.hist_original), artifacts.hist_original),
            (self.histogram_dir.join(&stored.hist_processed), artifacts.hist_processed),
        ];

        for (index, (path, data)) in writes.iter().enumerate() {
            if let Err(e) = std::fs::write(path, data) {
                warn!(path = %path.display(), error = %e, "artifact write failed; rolling back");
                for (written, _) in &writes[..index] {
                    let _ = std::fs::remove_file(written);
                }
                return Err(KontrastError::Io(e));
            }
            debug!(path = %path.display(), bytes = data.len(), "artifact written");
        }

        info!(
            original = %stored.original,
            processed = %stored.processed,
            "artifacts stored"
        );
        Ok(stored)
    }

    /// Resolve a retrieval name to a path inside the kind's directory.
    pub fn resolve(&self, kind: ArtifactKind, name: &str) -> Result<PathBuf> {
        validate_filename(name)?;
        Ok(self.dir(kind).join(name))
    }

    /// Read a stored artifact.
    pub fn read(&self, kind: ArtifactKind, name: &str) -> Result<Vec<u8>> {
        let path = self.resolve(kind, name)?;
        match std::fs::read(&path) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(KontrastError::NotFound(format!("{kind:?}/{name}")))
            }
            Err(e) => Err(KontrastError::Io(e)),
        }
    }
}

/// Reject names that could leave the artifact directory.
///
/// Only a single path component is accepted: no separators, no `.`/`..`,
/// no hidden files, no NUL bytes.
pub fn validate_filename(name: &str) -> Result<()> {
    let rejected = name.is_empty()
        || name.len() > MAX_FILENAME_LENGTH
        || name.starts_with('.')
        || name.contains(['/', '\\', '\0'])
        || name.contains("..");
    if rejected {
        return Err(KontrastError::NotFound(format!("invalid artifact name {name:?}")));
    }
    Ok(())
}

/// Lower-cased extension of an uploaded filename, if it is short and
/// alphanumeric; otherwise a neutral fallback.
fn upload_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LENGTH
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}

/// Content type for serving a stored artifact, by extension.
pub fn content_type_for(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("bmp") => "image/bmp",
        Some("tif") | Some("tiff") => "image/tiff",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}
