use std::path::{Path, PathBuf};
use std::sync::Arc;

use media_ffmpeg::{ExportAbort, FfmpegTools, MediaInfo};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::export::ExportPlan;
use crate::time::{Rational, TIMELINE_TIME_BASE, rescale, seconds_to_ticks};

/// Raw RGBA8 preview frame passed to the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewFrame {
    pub width: u32,
    pub height: u32,
    pub bytes: Arc<[u8]>,
}

/// Result of probing one media file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbedMedia {
    pub path: PathBuf,
    pub duration_tl: i64,
    pub frame_rate: Option<Rational>,
    pub video: Option<ProbedVideoStream>,
    pub audio: Option<ProbedAudioStream>,
}

/// Probed video stream information used by timeline mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbedVideoStream {
    pub time_base: Rational,
    pub start_pts: i64,
    pub width: u32,
    pub height: u32,
}

/// Probed audio stream information used by timeline mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbedAudioStream {
    pub time_base: Rational,
    pub start_pts: i64,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Media operations required by the engine.
pub trait MediaBackend {
    /// Probes media information for import.
    fn probe(&self, path: &Path) -> Result<ProbedMedia>;

    /// Decodes one preview frame around `at_seconds`.
    fn decode_preview_frame(&self, path: &Path, at_seconds: f64) -> Result<PreviewFrame>;

    /// Renders an export plan; `on_progress` receives encoded output ticks.
    fn export(&self, plan: &ExportPlan, on_progress: &mut dyn FnMut(i64)) -> Result<()>;

    /// Points the backend at a user-chosen `ffmpeg` executable.
    fn configure_ffmpeg(&mut self, path: &Path) -> Result<()> {
        let _ = path;
        Ok(())
    }

    /// Stops any running export for good; called once before the app exits.
    fn shutdown(&self) {}
}

/// FFmpeg CLI-backed backend used by production wiring.
///
/// Tool paths are resolved on every call so a binary installed while the
/// editor runs is picked up. Clones share one export abort switch.
#[derive(Debug, Default, Clone)]
pub struct FfmpegMediaBackend {
    ffmpeg: Option<PathBuf>,
    ffprobe: Option<PathBuf>,
    preview_max_width: Option<u32>,
    abort: ExportAbort,
}

impl FfmpegMediaBackend {
    /// Creates a backend with explicit tool paths; `None` means discovery.
    pub fn new(
        ffmpeg: Option<PathBuf>,
        ffprobe: Option<PathBuf>,
        preview_max_width: Option<u32>,
    ) -> Self {
        Self {
            ffmpeg,
            ffprobe,
            preview_max_width,
            abort: ExportAbort::default(),
        }
    }

    /// Resolves both executables; explicit paths win over discovery.
    pub fn tools(&self) -> Result<FfmpegTools> {
        let tools = match (&self.ffmpeg, &self.ffprobe) {
            (Some(ffmpeg), Some(ffprobe)) => FfmpegTools::new(ffmpeg, ffprobe),
            (Some(ffmpeg), None) => FfmpegTools::with_ffmpeg(ffmpeg)?,
            (None, Some(ffprobe)) => FfmpegTools {
                ffprobe: ffprobe.clone(),
                ..FfmpegTools::locate()?
            },
            (None, None) => FfmpegTools::locate()?,
        };
        Ok(tools)
    }
}

impl MediaBackend for FfmpegMediaBackend {
    fn probe(&self, path: &Path) -> Result<ProbedMedia> {
        let tools = self.tools()?;
        let info = media_ffmpeg::probe_media(&tools, path)?;
        probed_media_from_info(path, &info)
    }

    fn decode_preview_frame(&self, path: &Path, at_seconds: f64) -> Result<PreviewFrame> {
        let tools = self.tools()?;
        let decoded = media_ffmpeg::decode_video_frame_near_seconds(
            &tools,
            path,
            at_seconds,
            self.preview_max_width,
        )?;
        Ok(PreviewFrame {
            width: decoded.width,
            height: decoded.height,
            bytes: decoded.rgba.into(),
        })
    }

    fn export(&self, plan: &ExportPlan, on_progress: &mut dyn FnMut(i64)) -> Result<()> {
        let tools = self.tools()?;
        let request = plan.to_request();
        media_ffmpeg::export_video(&tools, &request, &self.abort, |out_time_us| {
            on_progress(rescale(out_time_us, Rational::MICROS, TIMELINE_TIME_BASE));
        })?;
        Ok(())
    }

    fn configure_ffmpeg(&mut self, path: &Path) -> Result<()> {
        let tools = FfmpegTools::with_ffmpeg(path)?;
        debug!(
            ffmpeg = %tools.ffmpeg.display(),
            ffprobe = %tools.ffprobe.display(),
            "ffmpeg configured"
        );
        self.ffmpeg = Some(tools.ffmpeg);
        self.ffprobe = Some(tools.ffprobe);
        Ok(())
    }

    fn shutdown(&self) {
        debug!("aborting ffmpeg exports");
        self.abort.raise();
    }
}

fn probed_media_from_info(path: &Path, info: &MediaInfo) -> Result<ProbedMedia> {
    let duration_tl = duration_tl_from_probe(info)
        .filter(|duration| *duration > 0)
        .ok_or_else(|| EngineError::MissingDuration(path.to_path_buf()))?;

    let video = info
        .first_video()
        .map(|stream| -> Result<ProbedVideoStream> {
            let (Some(width), Some(height)) = (stream.width, stream.height) else {
                return Err(EngineError::MissingVideoDimensions(path.to_path_buf()));
            };
            Ok(ProbedVideoStream {
                time_base: stream.time_base,
                start_pts: stream.start_pts.unwrap_or(0),
                width,
                height,
            })
        })
        .transpose()?;

    let audio = info
        .first_audio()
        .map(|stream| -> Result<ProbedAudioStream> {
            let (Some(sample_rate), Some(channels)) = (stream.sample_rate, stream.channels) else {
                return Err(EngineError::MissingAudioMetadata(path.to_path_buf()));
            };
            Ok(ProbedAudioStream {
                time_base: stream.time_base,
                start_pts: stream.start_pts.unwrap_or(0),
                sample_rate,
                channels,
            })
        })
        .transpose()?;

    Ok(ProbedMedia {
        path: info.path.clone(),
        duration_tl,
        frame_rate: info.first_video().and_then(|stream| stream.frame_rate),
        video,
        audio,
    })
}

fn duration_tl_from_probe(info: &MediaInfo) -> Option<i64> {
    if let Some(seconds) = info.duration_seconds {
        return Some(seconds_to_ticks(seconds));
    }

    let mut best = None;
    for stream in &info.streams {
        let Some(duration_ts) = stream.duration_ts else {
            continue;
        };

        let tl = rescale(duration_ts, stream.time_base, TIMELINE_TIME_BASE);
        best = Some(best.map_or(tl, |current: i64| current.max(tl)));
    }

    best
}
