use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{EngineError, Result};
use crate::export::ExportSettings;
use crate::preview::FfmpegMediaBackend;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "SPLICE_CONFIG";
/// Environment variable overriding the `ffmpeg` path.
pub const FFMPEG_ENV: &str = "SPLICE_FFMPEG";
/// Environment variable overriding the `ffprobe` path.
pub const FFPROBE_ENV: &str = "SPLICE_FFPROBE";

const DEFAULT_PREVIEW_MAX_WIDTH: u32 = 960;

/// Editor configuration read from a JSON file.
///
/// Every field is optional in the file:
///
/// ```json
/// { "ffmpeg": "/opt/ffmpeg/bin/ffmpeg", "export": { "container": "mp4", "bitrate_mbps": 30 } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub ffmpeg: Option<PathBuf>,
    pub ffprobe: Option<PathBuf>,
    pub export: ExportSettings,
    pub preview_max_width: Option<u32>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            ffmpeg: None,
            ffprobe: None,
            export: ExportSettings::default(),
            preview_max_width: Some(DEFAULT_PREVIEW_MAX_WIDTH),
        }
    }
}

impl EditorConfig {
    /// Reads `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(source) if source.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(EngineError::ConfigIo {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let mut config: Self =
            serde_json::from_str(&text).map_err(|source| EngineError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        config.export = config.export.with_bitrate(config.export.bitrate_mbps);
        info!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Loads from `explicit`, else `SPLICE_CONFIG`, else defaults, then
    /// applies the tool path environment overrides.
    pub fn from_env(explicit: Option<&Path>) -> Result<Self> {
        let from_env = env::var_os(CONFIG_ENV).map(PathBuf::from);
        let mut config = match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::load(&path)?,
            None => Self::default(),
        };
        config.apply_overrides(
            env::var_os(FFMPEG_ENV).map(PathBuf::from),
            env::var_os(FFPROBE_ENV).map(PathBuf::from),
        );
        Ok(config)
    }

    fn apply_overrides(&mut self, ffmpeg: Option<PathBuf>, ffprobe: Option<PathBuf>) {
        if ffmpeg.is_some() {
            self.ffmpeg = ffmpeg;
        }
        if ffprobe.is_some() {
            self.ffprobe = ffprobe;
        }
    }

    /// Builds the production media backend from this configuration.
    pub fn media_backend(&self) -> FfmpegMediaBackend {
        FfmpegMediaBackend::new(
            self.ffmpeg.clone(),
            self.ffprobe.clone(),
            self.preview_max_width,
        )
    }
}
