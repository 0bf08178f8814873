use std::path::PathBuf;

use tracing::debug;

use crate::api::{AudioOverrideSummary, ClipSummary, ProjectSnapshot, SegmentSummary};
use crate::error::{EngineError, Result};
use crate::preview::{ProbedAudioStream, ProbedMedia, ProbedVideoStream};
use crate::time::{Rational, ticks_to_seconds};
use crate::timeline::{ClipId, SegmentId, Timeline};

/// Project state managed by the engine thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub clips: Vec<SourceClip>,
    pub timeline: Timeline,
    pub audio_override: Option<AudioOverride>,
}

/// One loaded source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceClip {
    pub id: ClipId,
    pub path: PathBuf,
    pub duration_tl: i64,
    pub frame_rate: Option<Rational>,
    pub video: VideoStreamInfo,
    pub audio: Option<AudioStreamInfo>,
}

/// Video metadata required by export mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoStreamInfo {
    pub time_base: Rational,
    pub start_pts: i64,
    pub width: u32,
    pub height: u32,
}

/// Audio metadata required by export mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioStreamInfo {
    pub time_base: Rational,
    pub start_pts: i64,
    pub sample_rate: u32,
    pub channels: u16,
}

/// External audio that replaces all source audio on export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioOverride {
    pub path: PathBuf,
    pub duration_tl: i64,
}

/// Preview request computed from timeline and source mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewRequest {
    pub path: PathBuf,
    pub source_seconds: f64,
}

impl SourceClip {
    fn from_probed(id: ClipId, probed: ProbedMedia) -> Result<Self> {
        let video = probed
            .video
            .ok_or_else(|| EngineError::MissingVideoStream(probed.path.clone()))?;
        Ok(Self {
            id,
            path: probed.path,
            duration_tl: probed.duration_tl,
            frame_rate: probed.frame_rate,
            video: VideoStreamInfo::from(video),
            audio: probed.audio.map(AudioStreamInfo::from),
        })
    }
}

impl Project {
    /// Builds a project from the first clip, one segment spanning all of it.
    pub fn open(clip_id: ClipId, segment_id: SegmentId, probed: ProbedMedia) -> Result<Self> {
        let clip = SourceClip::from_probed(clip_id, probed)?;
        let mut timeline = Timeline::default();
        timeline.append_clip(clip.id, clip.duration_tl, segment_id);

        Ok(Self {
            clips: vec![clip],
            timeline,
            audio_override: None,
        })
    }

    /// Appends a clip after everything already on the timeline.
    pub fn append(
        &mut self,
        clip_id: ClipId,
        segment_id: SegmentId,
        probed: ProbedMedia,
    ) -> Result<()> {
        let clip = SourceClip::from_probed(clip_id, probed)?;
        self.timeline
            .append_clip(clip.id, clip.duration_tl, segment_id);
        debug!(
            clip_id,
            path = %clip.path.display(),
            duration_tl = clip.duration_tl,
            "clip appended"
        );
        self.clips.push(clip);
        Ok(())
    }

    /// Drops a clip and all its segments.
    ///
    /// The last remaining clip cannot be removed; close the project instead.
    pub fn remove_clip(&mut self, clip_id: ClipId) -> Result<()> {
        let index = self
            .clips
            .iter()
            .position(|clip| clip.id == clip_id)
            .ok_or(EngineError::ClipNotFound { clip_id })?;
        if self.clips.len() == 1 {
            return Err(EngineError::LastClip { clip_id });
        }

        self.clips.remove(index);
        let removed_segments = self.timeline.remove_clip(clip_id);
        debug!(clip_id, removed_segments, "clip removed");
        Ok(())
    }

    /// Replaces all source audio with `probed` on export.
    pub fn set_audio_override(&mut self, probed: ProbedMedia) -> Result<()> {
        if probed.audio.is_none() {
            return Err(EngineError::MissingAudioStream(probed.path));
        }
        self.audio_override = Some(AudioOverride {
            path: probed.path,
            duration_tl: probed.duration_tl,
        });
        Ok(())
    }

    pub fn clear_audio_override(&mut self) -> Option<AudioOverride> {
        self.audio_override.take()
    }

    /// Returns project duration in timeline ticks.
    pub fn duration_tl(&self) -> i64 {
        self.timeline.duration_tl()
    }

    pub fn clip(&self, clip_id: ClipId) -> Result<&SourceClip> {
        self.clips
            .iter()
            .find(|clip| clip.id == clip_id)
            .ok_or(EngineError::ClipNotFound { clip_id })
    }

    /// Creates an immutable snapshot for the UI.
    pub fn snapshot(&self) -> ProjectSnapshot {
        let mut output_start = 0_i64;
        let segments = self
            .timeline
            .segments
            .iter()
            .map(|segment| {
                let timeline_start = segment.kept.then_some(output_start);
                if segment.kept {
                    output_start += segment.duration_tl();
                }
                SegmentSummary {
                    id: segment.id,
                    clip_id: segment.clip_id,
                    src_start: segment.src_start,
                    src_end: segment.src_end,
                    kept: segment.kept,
                    timeline_start,
                }
            })
            .collect();

        ProjectSnapshot {
            clips: self
                .clips
                .iter()
                .map(|clip| ClipSummary {
                    id: clip.id,
                    path: clip.path.clone(),
                    duration_tl: clip.duration_tl,
                    width: clip.video.width,
                    height: clip.video.height,
                    has_audio: clip.audio.is_some(),
                })
                .collect(),
            segments,
            duration_tl: self.duration_tl(),
            audio_override: self
                .audio_override
                .as_ref()
                .map(|audio| AudioOverrideSummary {
                    path: audio.path.clone(),
                    duration_tl: audio.duration_tl,
                }),
        }
    }

    /// Computes the preview request for a timeline timestamp.
    pub fn preview_request_at(&self, t_tl: i64) -> Result<PreviewRequest> {
        let (index, source_tl) = self
            .timeline
            .locate(t_tl)
            .ok_or(EngineError::SegmentNotFound { at_tl: t_tl })?;
        let clip = self.clip(self.timeline.segments[index].clip_id)?;

        Ok(PreviewRequest {
            path: clip.path.clone(),
            source_seconds: ticks_to_seconds(source_tl.max(0)),
        })
    }
}

impl From<ProbedVideoStream> for VideoStreamInfo {
    fn from(value: ProbedVideoStream) -> Self {
        Self {
            time_base: value.time_base,
            start_pts: value.start_pts,
            width: value.width,
            height: value.height,
        }
    }
}

impl From<ProbedAudioStream> for AudioStreamInfo {
    fn from(value: ProbedAudioStream) -> Self {
        Self {
            time_base: value.time_base,
            start_pts: value.start_pts,
            sample_rate: value.sample_rate,
            channels: value.channels,
        }
    }
}

pub(crate) fn normalize_playhead(t_tl: i64, duration_tl: i64) -> i64 {
    if duration_tl <= 0 {
        return 0;
    }

    let max_tick = duration_tl - 1;
    t_tl.clamp(0, max_tick)
}
