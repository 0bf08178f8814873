use std::path::PathBuf;

use media_ffmpeg::{AudioExportSettings, ExportRequest, OutputContainer};
pub use media_ffmpeg::{ExportAudio, ExportSegment, FrameSize};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::project::Project;
use crate::time::{TIMELINE_TIME_BASE, rescale};

/// Container and rate settings chosen by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub container: OutputContainer,
    pub bitrate_mbps: u32,
}

impl ExportSettings {
    pub const MIN_BITRATE_MBPS: u32 = 5;
    pub const MAX_BITRATE_MBPS: u32 = 60;
    pub const BITRATE_STEP_MBPS: u32 = 5;
    pub const DEFAULT_BITRATE_MBPS: u32 = 25;

    /// Snaps a bitrate to the nearest step inside the supported range.
    ///
    /// # Example
    /// ```
    /// use engine::ExportSettings;
    ///
    /// assert_eq!(ExportSettings::snap_bitrate(27), 25);
    /// assert_eq!(ExportSettings::snap_bitrate(28), 30);
    /// assert_eq!(ExportSettings::snap_bitrate(0), 5);
    /// assert_eq!(ExportSettings::snap_bitrate(500), 60);
    /// ```
    pub fn snap_bitrate(mbps: u32) -> u32 {
        let step = Self::BITRATE_STEP_MBPS;
        let snapped = mbps.saturating_add(step / 2) / step * step;
        snapped.clamp(Self::MIN_BITRATE_MBPS, Self::MAX_BITRATE_MBPS)
    }

    pub fn with_bitrate(self, mbps: u32) -> Self {
        Self {
            bitrate_mbps: Self::snap_bitrate(mbps),
            ..self
        }
    }
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            container: OutputContainer::default(),
            bitrate_mbps: Self::DEFAULT_BITRATE_MBPS,
        }
    }
}

/// Fully resolved export: what the media backend renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPlan {
    pub inputs: Vec<PathBuf>,
    pub segments: Vec<ExportSegment>,
    pub audio: ExportAudio,
    pub frame_size: FrameSize,
    pub container: OutputContainer,
    pub bitrate_mbps: u32,
    pub output_path: PathBuf,
    pub total_tl: i64,
}

impl ExportPlan {
    pub fn to_request(&self) -> ExportRequest {
        ExportRequest {
            inputs: self.inputs.clone(),
            segments: self.segments.clone(),
            audio: self.audio.clone(),
            frame_size: self.frame_size,
            container: self.container,
            bitrate_mbps: self.bitrate_mbps,
            output_path: self.output_path.clone(),
        }
    }
}

/// Builds an export plan from the kept segments of the project timeline.
///
/// The container follows the output extension when it names one; otherwise
/// the settings decide and a missing extension is appended.
pub fn build_export_plan(
    project: &Project,
    output_path: PathBuf,
    settings: ExportSettings,
) -> Result<ExportPlan> {
    let total_tl = project.duration_tl();
    if total_tl <= 0 {
        return Err(EngineError::EmptyTimeline);
    }

    let (container, output_path) = resolve_output(output_path, settings.container);
    let mut inputs = Vec::<PathBuf>::new();
    let mut segments = Vec::<ExportSegment>::new();
    let mut frame_size = None;
    let mut all_have_audio = true;
    let mut first_audio = None;

    for (_, timeline_segment) in project.timeline.kept_segments() {
        let clip = project.clip(timeline_segment.clip_id)?;
        let video = clip.video;

        let src_in_video =
            video.start_pts + rescale(timeline_segment.src_start, TIMELINE_TIME_BASE, video.time_base);
        let src_out_video =
            video.start_pts + rescale(timeline_segment.src_end, TIMELINE_TIME_BASE, video.time_base);
        if src_out_video <= src_in_video {
            debug!(
                segment_id = timeline_segment.id,
                "skipping segment shorter than one video tick"
            );
            continue;
        }

        let input_index = match inputs.iter().position(|path| *path == clip.path) {
            Some(index) => index,
            None => {
                inputs.push(clip.path.clone());
                inputs.len() - 1
            }
        };

        let clip_frame_size = FrameSize {
            width: video.width,
            height: video.height,
        };
        frame_size.get_or_insert(clip_frame_size);

        let audio_range = clip.audio.map(|audio| {
            first_audio.get_or_insert(audio);
            let src_in =
                audio.start_pts + rescale(timeline_segment.src_start, TIMELINE_TIME_BASE, audio.time_base);
            let src_out =
                audio.start_pts + rescale(timeline_segment.src_end, TIMELINE_TIME_BASE, audio.time_base);
            (src_in, src_out.max(src_in + 1), audio.time_base)
        });
        all_have_audio &= audio_range.is_some();

        segments.push(ExportSegment {
            input_index,
            src_in_video,
            src_out_video,
            video_time_base: video.time_base,
            frame_size: clip_frame_size,
            src_in_audio: audio_range.map(|(src_in, _, _)| src_in),
            src_out_audio: audio_range.map(|(_, src_out, _)| src_out),
            audio_time_base: audio_range.map(|(_, _, time_base)| time_base),
        });
    }

    let Some(frame_size) = frame_size else {
        return Err(EngineError::EmptyTimeline);
    };

    let audio = if let Some(audio_override) = &project.audio_override {
        ExportAudio::External {
            path: audio_override.path.clone(),
        }
    } else {
        match first_audio {
            Some(first) if all_have_audio => ExportAudio::Segments(AudioExportSettings {
                sample_rate: first.sample_rate,
                channels: first.channels.clamp(1, 8),
            }),
            Some(_) => {
                warn!("some clips have no audio; exporting without an audio track");
                ExportAudio::None
            }
            None => ExportAudio::None,
        }
    };

    debug!(
        output = %output_path.display(),
        segments = segments.len(),
        inputs = inputs.len(),
        ?container,
        total_tl,
        "export plan built"
    );

    Ok(ExportPlan {
        inputs,
        segments,
        audio,
        frame_size,
        container,
        bitrate_mbps: ExportSettings::snap_bitrate(settings.bitrate_mbps),
        output_path,
        total_tl,
    })
}

fn resolve_output(path: PathBuf, fallback: OutputContainer) -> (OutputContainer, PathBuf) {
    if let Some(container) = OutputContainer::from_path(&path) {
        return (container, path);
    }
    if path.extension().is_none() {
        let with_extension = path.with_extension(fallback.extension());
        return (fallback, with_extension);
    }
    (fallback, path)
}
