use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::process::ExitStatus;

/// Result type used by this crate.
pub type Result<T> = std::result::Result<T, MediaFfmpegError>;

/// Failures of the `ffmpeg` / `ffprobe` wrappers.
#[derive(Debug)]
pub enum MediaFfmpegError {
    /// `tool` is neither on `PATH` nor at the searched location.
    ToolNotFound {
        tool: &'static str,
        searched: Option<PathBuf>,
    },
    InvalidRational {
        num: i32,
        den: i32,
    },
    /// Seek target that is negative or not finite.
    InvalidSeekSeconds(f64),
    MissingVideoStream(PathBuf),
    MissingVideoDimensions(PathBuf),
    InvalidExportRequest {
        reason: &'static str,
    },
    Io {
        context: &'static str,
        source: std::io::Error,
    },
    /// The tool ran and exited unsuccessfully.
    CommandFailed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },
    /// The export was stopped through its abort switch.
    ExportAborted,
    /// `ffprobe` printed something that is not the expected JSON.
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    Parse {
        context: &'static str,
        value: String,
    },
}

impl Display for MediaFfmpegError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ToolNotFound {
                tool,
                searched: Some(path),
            } => write!(f, "{tool} not found at {}", path.display()),
            Self::ToolNotFound {
                tool,
                searched: None,
            } => write!(f, "{tool} not found on PATH or next to the executable"),
            Self::InvalidRational { num, den } => write!(f, "invalid rational {num}/{den}"),
            Self::InvalidSeekSeconds(value) => write!(f, "cannot seek to {value} s"),
            Self::MissingVideoStream(path) => write!(f, "{} has no video stream", path.display()),
            Self::MissingVideoDimensions(path) => {
                write!(f, "{} has a video stream without dimensions", path.display())
            }
            Self::InvalidExportRequest { reason } => write!(f, "invalid export request: {reason}"),
            Self::Io { context, source } => write!(f, "{context}: {source}"),
            Self::CommandFailed {
                command,
                status,
                stderr,
            } => {
                let stderr = stderr.trim();
                if stderr.is_empty() {
                    write!(f, "`{command}` exited with {status}")
                } else {
                    write!(f, "`{command}` exited with {status}: {stderr}")
                }
            }
            Self::ExportAborted => write!(f, "export aborted"),
            Self::Json { path, source } => {
                write!(f, "unreadable ffprobe output for {}: {source}", path.display())
            }
            Self::Parse { context, value } => write!(f, "cannot parse {context} from `{value}`"),
        }
    }
}

impl std::error::Error for MediaFfmpegError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
            _ => None,
        }
    }
}
