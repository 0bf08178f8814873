use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::{MediaFfmpegError, Result};

const FFMPEG: &str = "ffmpeg";
const FFPROBE: &str = "ffprobe";

/// Locations of the two external executables every media operation runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfmpegTools {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl FfmpegTools {
    /// Uses explicit executable paths without checking them.
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Finds both tools in `PATH`, falling back to the working directory.
    ///
    /// # Example
    /// ```no_run
    /// use media_ffmpeg::FfmpegTools;
    ///
    /// let tools = FfmpegTools::locate().expect("ffmpeg should be installed");
    /// println!("{}", tools.ffmpeg.display());
    /// ```
    pub fn locate() -> Result<Self> {
        let cwd = env::current_dir().map_err(|source| MediaFfmpegError::Io {
            context: "read working directory",
            source,
        })?;
        Self::locate_in(&cwd)
    }

    /// Same as [`FfmpegTools::locate`] with an explicit fallback directory.
    pub fn locate_in(fallback_dir: &Path) -> Result<Self> {
        let ffmpeg = find_tool(FFMPEG, fallback_dir).ok_or(MediaFfmpegError::ToolNotFound {
            tool: FFMPEG,
            searched: None,
        })?;
        let ffprobe = sibling_tool(&ffmpeg, FFPROBE)
            .or_else(|| find_tool(FFPROBE, fallback_dir))
            .ok_or(MediaFfmpegError::ToolNotFound {
                tool: FFPROBE,
                searched: None,
            })?;

        debug!(ffmpeg = %ffmpeg.display(), ffprobe = %ffprobe.display(), "media tools located");
        Ok(Self { ffmpeg, ffprobe })
    }

    /// Uses a user-chosen `ffmpeg` and looks for `ffprobe` next to it first.
    pub fn with_ffmpeg(ffmpeg: impl Into<PathBuf>) -> Result<Self> {
        let ffmpeg = ffmpeg.into();
        if !ffmpeg.is_file() {
            return Err(MediaFfmpegError::ToolNotFound {
                tool: FFMPEG,
                searched: Some(ffmpeg),
            });
        }

        let ffprobe = sibling_tool(&ffmpeg, FFPROBE)
            .or_else(|| which::which(FFPROBE).ok())
            .ok_or(MediaFfmpegError::ToolNotFound {
                tool: FFPROBE,
                searched: ffmpeg.parent().map(|dir| dir.join(executable_name(FFPROBE))),
            })?;
        Ok(Self { ffmpeg, ffprobe })
    }
}

/// Builds a command for one of the tools without flashing a console window.
pub(crate) fn tool_command(program: &Path) -> Command {
    #[allow(unused_mut)]
    let mut command = Command::new(program);
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;

        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        command.creation_flags(CREATE_NO_WINDOW);
    }
    command
}

/// Maps a spawn failure, turning a missing executable into `ToolNotFound`.
pub(crate) fn spawn_error(
    tool: &'static str,
    program: &Path,
    context: &'static str,
    source: std::io::Error,
) -> MediaFfmpegError {
    if source.kind() == std::io::ErrorKind::NotFound {
        MediaFfmpegError::ToolNotFound {
            tool,
            searched: Some(program.to_path_buf()),
        }
    } else {
        MediaFfmpegError::Io { context, source }
    }
}

fn find_tool(name: &str, fallback_dir: &Path) -> Option<PathBuf> {
    which::which(name).ok().or_else(|| {
        let candidate = fallback_dir.join(executable_name(name));
        candidate.is_file().then_some(candidate)
    })
}

fn sibling_tool(ffmpeg: &Path, name: &str) -> Option<PathBuf> {
    let candidate = ffmpeg.parent()?.join(executable_name(name));
    candidate.is_file().then_some(candidate)
}

fn executable_name(name: &str) -> String {
    format!("{name}{}", env::consts::EXE_SUFFIX)
}
