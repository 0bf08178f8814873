use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Result type used by the engine crate.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors produced by engine commands and timeline operations.
#[derive(Debug)]
pub enum EngineError {
    ProjectNotLoaded,
    SegmentNotFound {
        at_tl: i64,
    },
    SplitPointAtBoundary {
        at_tl: i64,
    },
    SegmentIdNotFound {
        segment_id: u64,
    },
    ClipNotFound {
        clip_id: u64,
    },
    LastClip {
        clip_id: u64,
    },
    InvalidRange {
        start_tl: i64,
        end_tl: i64,
    },
    EmptyTimeline,
    ExportInProgress,
    MissingDuration(PathBuf),
    MissingVideoStream(PathBuf),
    MissingVideoDimensions(PathBuf),
    MissingAudioStream(PathBuf),
    MissingAudioMetadata(PathBuf),
    ExportFailed {
        path: PathBuf,
        source: Box<EngineError>,
    },
    ConfigIo {
        path: PathBuf,
        source: std::io::Error,
    },
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },
    Media(media_ffmpeg::MediaFfmpegError),
}

impl EngineError {
    /// Returns true when the error means ffmpeg or ffprobe could not be found.
    pub fn is_tool_not_found(&self) -> bool {
        match self {
            Self::Media(media_ffmpeg::MediaFfmpegError::ToolNotFound { .. }) => true,
            Self::ExportFailed { source, .. } => source.is_tool_not_found(),
            _ => false,
        }
    }
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ProjectNotLoaded => write!(f, "project is not loaded"),
            Self::SegmentNotFound { at_tl } => {
                write!(f, "segment not found at timeline timestamp {at_tl}")
            }
            Self::SplitPointAtBoundary { at_tl } => {
                write!(f, "cannot split at segment boundary: {at_tl}")
            }
            Self::SegmentIdNotFound { segment_id } => {
                write!(f, "segment not found: {segment_id}")
            }
            Self::ClipNotFound { clip_id } => write!(f, "clip not found: {clip_id}"),
            Self::LastClip { clip_id } => {
                write!(f, "clip {clip_id} is the last clip; close the project instead")
            }
            Self::InvalidRange { start_tl, end_tl } => {
                write!(f, "invalid timeline range: {start_tl}..{end_tl}")
            }
            Self::EmptyTimeline => write!(f, "timeline has no kept segments to export"),
            Self::ExportInProgress => write!(f, "an export is already running"),
            Self::MissingDuration(path) => {
                write!(f, "media duration is missing: {}", path.display())
            }
            Self::MissingVideoStream(path) => {
                write!(f, "no video stream in {}", path.display())
            }
            Self::MissingVideoDimensions(path) => {
                write!(f, "video dimensions are missing: {}", path.display())
            }
            Self::MissingAudioStream(path) => {
                write!(f, "no audio stream in {}", path.display())
            }
            Self::MissingAudioMetadata(path) => {
                write!(f, "audio metadata is missing: {}", path.display())
            }
            Self::ExportFailed { path, source } => {
                write!(f, "export to {} failed: {source}", path.display())
            }
            Self::ConfigIo { path, source } => {
                write!(f, "failed to read config {} ({source})", path.display())
            }
            Self::ConfigParse { path, source } => {
                write!(f, "invalid config {} ({source})", path.display())
            }
            Self::Media(err) => write!(f, "media backend error: {err}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ExportFailed { source, .. } => Some(source.as_ref()),
            Self::ConfigIo { source, .. } => Some(source),
            Self::ConfigParse { source, .. } => Some(source),
            Self::Media(err) => Some(err),
            _ => None,
        }
    }
}

impl From<media_ffmpeg::MediaFfmpegError> for EngineError {
    fn from(value: media_ffmpeg::MediaFfmpegError) -> Self {
        Self::Media(value)
    }
}
