use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{MediaFfmpegError, Result};
use crate::time::Rational;
use crate::tools::{FfmpegTools, spawn_error, tool_command};

/// Stream kind discovered by probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Video,
    Audio,
    Other,
}

/// Stream metadata read from `ffprobe`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub index: u32,
    pub kind: StreamKind,
    pub codec_name: Option<String>,
    pub time_base: Rational,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<Rational>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub channel_layout: Option<String>,
    pub start_pts: Option<i64>,
    pub duration_ts: Option<i64>,
}

/// Media probe result.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    pub path: PathBuf,
    pub format_name: Option<String>,
    pub streams: Vec<StreamInfo>,
    pub duration_seconds: Option<f64>,
}

impl MediaInfo {
    /// Returns the first video stream.
    pub fn first_video(&self) -> Option<&StreamInfo> {
        self.streams
            .iter()
            .find(|stream| stream.kind == StreamKind::Video)
    }

    /// Returns the first audio stream.
    pub fn first_audio(&self) -> Option<&StreamInfo> {
        self.streams
            .iter()
            .find(|stream| stream.kind == StreamKind::Audio)
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<RawStream>,
    format: Option<RawFormat>,
}

#[derive(Debug, Deserialize)]
struct RawStream {
    index: u32,
    codec_type: Option<String>,
    codec_name: Option<String>,
    time_base: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u16>,
    channel_layout: Option<String>,
    start_pts: Option<i64>,
    duration_ts: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    format_name: Option<String>,
    duration: Option<String>,
}

/// Probes a media file via `ffprobe` JSON output.
///
/// # Example
/// ```no_run
/// use media_ffmpeg::{FfmpegTools, probe_media};
///
/// let tools = FfmpegTools::locate().expect("tools");
/// let info = probe_media(&tools, "sample.mp4").expect("probe should succeed");
/// assert!(!info.streams.is_empty());
/// ```
pub fn probe_media(tools: &FfmpegTools, path: impl AsRef<Path>) -> Result<MediaInfo> {
    let path = path.as_ref();

    let output = tool_command(&tools.ffprobe)
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .map_err(|source| spawn_error("ffprobe", &tools.ffprobe, "run ffprobe", source))?;

    if !output.status.success() {
        return Err(MediaFfmpegError::CommandFailed {
            command: format!("ffprobe {}", path.display()),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    let info = parse_probe_output(path, &output.stdout)?;
    debug!(
        path = %path.display(),
        streams = info.streams.len(),
        duration_seconds = ?info.duration_seconds,
        "probe finished"
    );
    Ok(info)
}

fn parse_probe_output(path: &Path, stdout: &[u8]) -> Result<MediaInfo> {
    let raw: ProbeOutput =
        serde_json::from_slice(stdout).map_err(|source| MediaFfmpegError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    let mut streams = Vec::with_capacity(raw.streams.len());
    for stream in raw.streams {
        if let Some(stream) = convert_stream(stream)? {
            streams.push(stream);
        }
    }

    if streams.is_empty() {
        return Err(MediaFfmpegError::Parse {
            context: "streams",
            value: "no streams found".to_string(),
        });
    }

    let (format_name, duration_seconds) = match raw.format {
        Some(format) => (
            format.format_name,
            parse_optional_seconds(format.duration.as_deref())?,
        ),
        None => (None, None),
    };

    Ok(MediaInfo {
        path: path.to_path_buf(),
        format_name,
        streams,
        duration_seconds,
    })
}

fn convert_stream(raw: RawStream) -> Result<Option<StreamInfo>> {
    let kind = match raw.codec_type.as_deref() {
        Some("video") => StreamKind::Video,
        Some("audio") => StreamKind::Audio,
        _ => StreamKind::Other,
    };

    let time_base = match parse_optional_rational(raw.time_base.as_deref()) {
        Some(time_base) => time_base,
        // Data/attachment streams often report 0/0; nothing downstream needs them.
        None if kind == StreamKind::Other => return Ok(None),
        None => {
            return Err(MediaFfmpegError::Parse {
                context: "time_base",
                value: raw.time_base.unwrap_or_default(),
            });
        }
    };

    let frame_rate = parse_optional_rational(raw.avg_frame_rate.as_deref())
        .or_else(|| parse_optional_rational(raw.r_frame_rate.as_deref()));
    let sample_rate = match raw.sample_rate.as_deref() {
        Some(value) => Some(value.parse::<u32>().map_err(|_| MediaFfmpegError::Parse {
            context: "sample_rate",
            value: value.to_string(),
        })?),
        None => None,
    };

    Ok(Some(StreamInfo {
        index: raw.index,
        kind,
        codec_name: raw.codec_name,
        time_base,
        width: raw.width.filter(|width| *width > 0),
        height: raw.height.filter(|height| *height > 0),
        frame_rate: if kind == StreamKind::Video {
            frame_rate
        } else {
            None
        },
        sample_rate,
        channels: raw.channels,
        channel_layout: raw
            .channel_layout
            .filter(|value| !value.is_empty() && value != "N/A"),
        start_pts: raw.start_pts,
        duration_ts: raw.duration_ts,
    }))
}

fn parse_optional_rational(value: Option<&str>) -> Option<Rational> {
    let raw = value?;
    if raw.is_empty() || raw == "N/A" {
        return None;
    }
    Rational::parse(raw).ok()
}

fn parse_optional_seconds(value: Option<&str>) -> Result<Option<f64>> {
    let Some(raw) = value else {
        return Ok(None);
    };
    if raw.is_empty() || raw == "N/A" {
        return Ok(None);
    }

    let seconds = raw.parse::<f64>().map_err(|_| MediaFfmpegError::Parse {
        context: "format duration seconds",
        value: raw.to_string(),
    })?;
    Ok(Some(seconds))
}
