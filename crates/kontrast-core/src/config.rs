// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{KontrastError, Result};
use crate::types::EnhanceParams;

/// Default upload body limit (32 MiB).
const DEFAULT_MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Persistent application settings.
///
/// Every field has a default, so a partial JSON file only overrides what it
/// names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Address the HTTP server binds to.
    pub bind_address: IpAddr,
    /// Port for the HTTP server (default 5000, 0 picks an ephemeral port).
    pub port: u16,
    /// Directory holding original uploads.
    pub upload_dir: PathBuf,
    /// Directory holding enhanced images.
    pub processed_dir: PathBuf,
    /// Directory holding rendered histograms.
    pub histogram_dir: PathBuf,
    /// Largest accepted request body, in bytes.
    pub max_upload_bytes: usize,
    /// Tile grid and clip factors for AHE/CLAHE.
    pub enhance: EnhanceParams,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 5000,
            upload_dir: PathBuf::from("static/uploads"),
            processed_dir: PathBuf::from("static/processed"),
            histogram_dir: PathBuf::from("static/histograms"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            enhance: EnhanceParams::default(),
        }
    }
}

impl AppConfig {
    /// Load settings from a JSON file.
    ///
    /// A missing file yields the defaults; a file that exists but does not
    /// parse is an error rather than a silent fallback.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(KontrastError::Io(e)),
        };
        let config: Self = serde_json::from_str(&data)
            .map_err(|e| KontrastError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Write settings as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Reject settings the enhancer or server cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.enhance.tile_cols == 0 || self.enhance.tile_rows == 0 {
            return Err(KontrastError::Config("tile grid must be at least 1x1".into()));
        }
        if !self.enhance.ahe_clip_factor.is_finite() || !self.enhance.clahe_clip_factor.is_finite() {
            return Err(KontrastError::Config("clip factors must be finite".into()));
        }
        if self.max_upload_bytes == 0 {
            return Err(KontrastError::Config("max_upload_bytes must be non-zero".into()));
        }
        Ok(())
    }

    /// Create the three artifact directories if they do not exist yet.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.upload_dir, &self.processed_dir, &self.histogram_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(dir.path().join("absent.json")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.port, 5000);
        assert_eq!(config.enhance.tile_cols, 8);
    }

    #[test]
    fn partial_file_overrides_named_fields_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kontrast.json");
        std::fs::write(&path, r#"{ "port": 8080, "enhance": { "clahe_clip_factor": 4.0 } }"#)
            .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.enhance.clahe_clip_factor, 4.0);
        assert_eq!(config.enhance.ahe_clip_factor, 2.0);
        assert_eq!(config.upload_dir, PathBuf::from("static/uploads"));
    }

    #[test]
    fn invalid_json_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kontrast.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(AppConfig::load(&path), Err(KontrastError::Config(_))));
    }

    #[test]
    fn zero_tile_grid_is_rejected() {
        let mut config = AppConfig::default();
        config.enhance.tile_rows = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kontrast.json");
        let config = AppConfig {
            port: 0,
            upload_dir: dir.path().join("up"),
            ..AppConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(AppConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn ensure_dirs_creates_all_three() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            upload_dir: dir.path().join("a/uploads"),
            processed_dir: dir.path().join("a/processed"),
            histogram_dir: dir.path().join("a/histograms"),
            ..AppConfig::default()
        };
        config.ensure_dirs().unwrap();
        assert!(config.upload_dir.is_dir());
        assert!(config.processed_dir.is_dir());
        assert!(config.histogram_dir.is_dir());
    }
}
