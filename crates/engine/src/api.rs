use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};
use crate::export::{ExportPlan, ExportSettings, build_export_plan};
use crate::preview::{FfmpegMediaBackend, MediaBackend, PreviewFrame};
use crate::project::{Project, normalize_playhead};
use crate::timeline::{ClipId, SegmentId};

/// Commands accepted by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Starts a new project from one video file, replacing any open one.
    Open {
        path: PathBuf,
    },
    /// Appends a video file to the end of the timeline.
    Append {
        path: PathBuf,
    },
    Close,
    SetPlayhead {
        t_tl: i64,
    },
    /// Splits the kept segment at `at_tl` in timeline ticks.
    ///
    /// # Example
    /// ```no_run
    /// use std::path::PathBuf;
    /// use engine::{Command, Engine, FfmpegMediaBackend};
    ///
    /// let mut engine = Engine::new(FfmpegMediaBackend::default());
    /// let _ = engine.handle_command(Command::Open {
    ///     path: PathBuf::from("demo.mp4"),
    /// });
    /// let _ = engine.handle_command(Command::Split { at_tl: 500_000 });
    /// ```
    Split {
        at_tl: i64,
    },
    /// Removes the output range `[start_tl, end_tl)`.
    ///
    /// # Example
    /// ```no_run
    /// use std::path::PathBuf;
    /// use engine::{Command, Engine, FfmpegMediaBackend};
    ///
    /// let mut engine = Engine::new(FfmpegMediaBackend::default());
    /// let _ = engine.handle_command(Command::Open {
    ///     path: PathBuf::from("demo.mp4"),
    /// });
    /// let _ = engine.handle_command(Command::RemoveRange {
    ///     start_tl: 10_000_000,
    ///     end_tl: 20_000_000,
    /// });
    /// ```
    RemoveRange {
        start_tl: i64,
        end_tl: i64,
    },
    RemoveSegment {
        segment_id: SegmentId,
    },
    RestoreSegment {
        segment_id: SegmentId,
    },
    RemoveClip {
        clip_id: ClipId,
    },
    /// Replaces all source audio with an external file on export.
    SetAudioOverride {
        path: PathBuf,
    },
    ClearAudioOverride,
    /// Uses a user-chosen `ffmpeg`; `ffprobe` is looked up next to it.
    ConfigureFfmpeg {
        path: PathBuf,
    },
    /// Plans an export; the render itself is taken with
    /// [`Engine::take_export_job`] and run off the engine thread.
    Export {
        path: PathBuf,
        settings: ExportSettings,
    },
    /// Kills a running export before the front-end exits.
    Shutdown,
}

/// Events emitted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    ProjectChanged(ProjectSnapshot),
    ProjectClosed,
    PlayheadChanged { t_tl: i64 },
    PreviewFrameReady { t_tl: i64, frame: PreviewFrame },
    /// Last event for a `SetPlayhead`; sent by the worker after its reply.
    PlayheadSettled { requested_tl: i64 },
    ToolsConfigured { ffmpeg: PathBuf },
    ExportStarted { path: PathBuf, total_tl: i64 },
    ExportProgress { done_tl: i64, total_tl: i64 },
    ExportFinished { path: PathBuf },
    Error(EngineErrorEvent),
}

/// Error category shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    ToolNotFound,
    ExportFailed,
    InvalidTimeline,
    SplitPointAtBoundary,
    SegmentNotFound,
    Other,
}

impl From<&EngineError> for EngineErrorKind {
    fn from(value: &EngineError) -> Self {
        if value.is_tool_not_found() {
            return Self::ToolNotFound;
        }
        match value {
            EngineError::ExportFailed { .. } => Self::ExportFailed,
            EngineError::EmptyTimeline
            | EngineError::InvalidRange { .. }
            | EngineError::LastClip { .. } => Self::InvalidTimeline,
            EngineError::SplitPointAtBoundary { .. } => Self::SplitPointAtBoundary,
            EngineError::SegmentNotFound { .. } | EngineError::SegmentIdNotFound { .. } => {
                Self::SegmentNotFound
            }
            _ => Self::Other,
        }
    }
}

/// User-facing error payload emitted as an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineErrorEvent {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineErrorEvent {
    pub fn from_error(error: &EngineError) -> Self {
        Self {
            kind: EngineErrorKind::from(error),
            message: error.to_string(),
        }
    }
}

/// Immutable project snapshot consumed by the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectSnapshot {
    pub clips: Vec<ClipSummary>,
    pub segments: Vec<SegmentSummary>,
    pub duration_tl: i64,
    pub audio_override: Option<AudioOverrideSummary>,
}

/// Snapshot representation of one source clip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClipSummary {
    pub id: ClipId,
    pub path: PathBuf,
    pub duration_tl: i64,
    pub width: u32,
    pub height: u32,
    pub has_audio: bool,
}

/// Snapshot representation of one timeline segment.
///
/// `timeline_start` is `None` for removed segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentSummary {
    pub id: SegmentId,
    pub clip_id: ClipId,
    pub src_start: i64,
    pub src_end: i64,
    pub kept: bool,
    pub timeline_start: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioOverrideSummary {
    pub path: PathBuf,
    pub duration_tl: i64,
}

/// A planned export waiting to run on its own thread.
///
/// Holding the job keeps the engine's export slot busy; the slot is released
/// when the job is dropped, whether it ran or not.
#[derive(Debug)]
pub struct ExportJob<M> {
    media: M,
    plan: ExportPlan,
    in_flight: Arc<AtomicBool>,
}

impl<M> ExportJob<M>
where
    M: MediaBackend,
{
    pub fn plan(&self) -> &ExportPlan {
        &self.plan
    }

    /// Runs the external export; `on_progress` receives `(done_tl, total_tl)`.
    pub fn run(self, mut on_progress: impl FnMut(i64, i64)) -> Result<PathBuf> {
        let total_tl = self.plan.total_tl;
        let output_path = self.plan.output_path.clone();
        info!(output = %output_path.display(), total_tl, "export started");

        let result = self.media.export(&self.plan, &mut |done_tl| {
            on_progress(done_tl.clamp(0, total_tl), total_tl);
        });

        match result {
            Ok(()) => {
                info!(output = %output_path.display(), "export finished");
                Ok(output_path)
            }
            Err(source) => {
                warn!(output = %output_path.display(), error = %source, "export failed");
                Err(EngineError::ExportFailed {
                    path: output_path,
                    source: Box::new(source),
                })
            }
        }
    }
}

impl<M> Drop for ExportJob<M> {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::Release);
    }
}

/// Engine implementation for the editing commands.
#[derive(Debug)]
pub struct Engine<M> {
    media: M,
    project: Option<Project>,
    playhead_tl: i64,
    next_clip_id: ClipId,
    next_segment_id: SegmentId,
    export_in_flight: Arc<AtomicBool>,
    pending_export: Option<ExportJob<M>>,
}

impl<M> Engine<M>
where
    M: MediaBackend + Clone,
{
    /// Creates a new engine with the provided media backend.
    ///
    /// # Example
    /// ```no_run
    /// use engine::{Engine, FfmpegMediaBackend};
    ///
    /// let _engine = Engine::new(FfmpegMediaBackend::default());
    /// ```
    pub fn new(media: M) -> Self {
        Self {
            media,
            project: None,
            playhead_tl: 0,
            next_clip_id: 1,
            next_segment_id: 1,
            export_in_flight: Arc::new(AtomicBool::new(false)),
            pending_export: None,
        }
    }

    /// Applies one command and returns emitted events.
    pub fn handle_command(&mut self, command: Command) -> Result<Vec<Event>> {
        match command {
            Command::Open { path } => self.open(path),
            Command::Append { path } => self.append(path),
            Command::Close => self.close(),
            Command::SetPlayhead { t_tl } => self.set_playhead(t_tl),
            Command::Split { at_tl } => self.split(at_tl),
            Command::RemoveRange { start_tl, end_tl } => self.remove_range(start_tl, end_tl),
            Command::RemoveSegment { segment_id } => self.set_segment_kept(segment_id, false),
            Command::RestoreSegment { segment_id } => self.set_segment_kept(segment_id, true),
            Command::RemoveClip { clip_id } => self.remove_clip(clip_id),
            Command::SetAudioOverride { path } => self.set_audio_override(path),
            Command::ClearAudioOverride => self.clear_audio_override(),
            Command::ConfigureFfmpeg { path } => self.configure_ffmpeg(path),
            Command::Export { path, settings } => self.export(path, settings),
            Command::Shutdown => {
                info!("engine shutting down");
                self.media.shutdown();
                Ok(Vec::new())
            }
        }
    }

    /// Takes the export planned by the last `Export` command.
    pub fn take_export_job(&mut self) -> Option<ExportJob<M>> {
        self.pending_export.take()
    }

    pub fn project(&self) -> Option<&Project> {
        self.project.as_ref()
    }

    pub fn playhead_tl(&self) -> i64 {
        self.playhead_tl
    }

    fn open(&mut self, path: PathBuf) -> Result<Vec<Event>> {
        let probed = self.media.probe(&path)?;
        let clip_id = self.allocate_clip_id();
        let segment_id = self.allocate_segment_id();

        let project = Project::open(clip_id, segment_id, probed)?;
        let snapshot = project.snapshot();
        info!(
            path = %path.display(),
            duration_tl = project.duration_tl(),
            "project opened"
        );
        self.project = Some(project);
        self.playhead_tl = 0;

        let mut events = vec![
            Event::ProjectChanged(snapshot),
            Event::PlayheadChanged { t_tl: 0 },
        ];
        match self.preview_event(0) {
            Ok(Some(event)) => events.push(event),
            Ok(None) => {}
            Err(error) => warn!(%error, "first preview frame failed"),
        }
        Ok(events)
    }

    fn append(&mut self, path: PathBuf) -> Result<Vec<Event>> {
        if self.project.is_none() {
            return Err(EngineError::ProjectNotLoaded);
        }
        let probed = self.media.probe(&path)?;
        let clip_id = self.allocate_clip_id();
        let segment_id = self.allocate_segment_id();

        let project = self.project.as_mut().ok_or(EngineError::ProjectNotLoaded)?;
        project.append(clip_id, segment_id, probed)?;
        info!(
            path = %path.display(),
            clip_id,
            duration_tl = project.duration_tl(),
            "clip appended"
        );
        Ok(vec![Event::ProjectChanged(project.snapshot())])
    }

    fn close(&mut self) -> Result<Vec<Event>> {
        if self.project.take().is_some() {
            info!("project closed");
        }
        self.playhead_tl = 0;
        Ok(vec![Event::ProjectClosed])
    }

    fn set_playhead(&mut self, t_tl: i64) -> Result<Vec<Event>> {
        let project = self.project.as_ref().ok_or(EngineError::ProjectNotLoaded)?;
        let clamped = normalize_playhead(t_tl, project.duration_tl());
        self.playhead_tl = clamped;

        let mut events = vec![Event::PlayheadChanged { t_tl: clamped }];
        if let Some(event) = self.preview_event(clamped)? {
            events.push(event);
        }
        Ok(events)
    }

    fn split(&mut self, at_tl: i64) -> Result<Vec<Event>> {
        let next_segment_id = self.next_segment_id;
        let project = self.project.as_mut().ok_or(EngineError::ProjectNotLoaded)?;
        project.timeline.split_at(at_tl, next_segment_id)?;
        self.next_segment_id += 1;

        info!(
            at_tl,
            next_segment_id,
            segment_count = project.timeline.segments.len(),
            "split applied"
        );
        Ok(vec![Event::ProjectChanged(project.snapshot())])
    }

    fn remove_range(&mut self, start_tl: i64, end_tl: i64) -> Result<Vec<Event>> {
        let next_segment_id = &mut self.next_segment_id;
        let project = self.project.as_mut().ok_or(EngineError::ProjectNotLoaded)?;
        let removed_tl = project.timeline.remove_range(start_tl, end_tl, &mut || {
            let id = *next_segment_id;
            *next_segment_id += 1;
            id
        })?;

        info!(
            start_tl,
            end_tl,
            removed_tl,
            duration_tl = project.duration_tl(),
            "range removed"
        );
        let snapshot = project.snapshot();
        let duration_tl = project.duration_tl();
        Ok(self.changed_with_playhead(snapshot, duration_tl))
    }

    fn set_segment_kept(&mut self, segment_id: SegmentId, kept: bool) -> Result<Vec<Event>> {
        let project = self.project.as_mut().ok_or(EngineError::ProjectNotLoaded)?;
        project.timeline.set_kept(segment_id, kept)?;

        info!(segment_id, kept, "segment status applied");
        let snapshot = project.snapshot();
        let duration_tl = project.duration_tl();
        Ok(self.changed_with_playhead(snapshot, duration_tl))
    }

    fn remove_clip(&mut self, clip_id: ClipId) -> Result<Vec<Event>> {
        let project = self.project.as_mut().ok_or(EngineError::ProjectNotLoaded)?;
        project.remove_clip(clip_id)?;

        info!(clip_id, clip_count = project.clips.len(), "clip removed");
        let snapshot = project.snapshot();
        let duration_tl = project.duration_tl();
        Ok(self.changed_with_playhead(snapshot, duration_tl))
    }

    fn set_audio_override(&mut self, path: PathBuf) -> Result<Vec<Event>> {
        if self.project.is_none() {
            return Err(EngineError::ProjectNotLoaded);
        }
        let probed = self.media.probe(&path)?;
        let project = self.project.as_mut().ok_or(EngineError::ProjectNotLoaded)?;
        project.set_audio_override(probed)?;

        info!(path = %path.display(), "audio override set");
        Ok(vec![Event::ProjectChanged(project.snapshot())])
    }

    fn clear_audio_override(&mut self) -> Result<Vec<Event>> {
        let project = self.project.as_mut().ok_or(EngineError::ProjectNotLoaded)?;
        if let Some(cleared) = project.clear_audio_override() {
            info!(path = %cleared.path.display(), "audio override cleared");
        }
        Ok(vec![Event::ProjectChanged(project.snapshot())])
    }

    fn configure_ffmpeg(&mut self, path: PathBuf) -> Result<Vec<Event>> {
        self.media.configure_ffmpeg(&path)?;
        info!(ffmpeg = %path.display(), "media tools configured");
        Ok(vec![Event::ToolsConfigured { ffmpeg: path }])
    }

    fn export(&mut self, path: PathBuf, settings: ExportSettings) -> Result<Vec<Event>> {
        let project = self.project.as_ref().ok_or(EngineError::ProjectNotLoaded)?;
        let plan = build_export_plan(project, path, settings)?;

        if self
            .export_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("export rejected: another export is running");
            return Err(EngineError::ExportInProgress);
        }

        let event = Event::ExportStarted {
            path: plan.output_path.clone(),
            total_tl: plan.total_tl,
        };
        debug!(
            output = %plan.output_path.display(),
            segments = plan.segments.len(),
            "export planned"
        );
        self.pending_export = Some(ExportJob {
            media: self.media.clone(),
            plan,
            in_flight: Arc::clone(&self.export_in_flight),
        });
        Ok(vec![event])
    }

    fn preview_event(&self, t_tl: i64) -> Result<Option<Event>> {
        let Some(project) = self.project.as_ref() else {
            return Ok(None);
        };
        let request = match project.preview_request_at(t_tl) {
            Ok(request) => request,
            Err(EngineError::SegmentNotFound { .. }) => return Ok(None),
            Err(error) => return Err(error),
        };

        debug!(t_tl, source_seconds = request.source_seconds, path = ?request.path, "decoding preview");
        let frame = self
            .media
            .decode_preview_frame(&request.path, request.source_seconds)?;
        Ok(Some(Event::PreviewFrameReady { t_tl, frame }))
    }

    fn changed_with_playhead(&mut self, snapshot: ProjectSnapshot, duration_tl: i64) -> Vec<Event> {
        let mut events = vec![Event::ProjectChanged(snapshot)];
        let clamped = normalize_playhead(self.playhead_tl, duration_tl);
        if clamped != self.playhead_tl {
            self.playhead_tl = clamped;
            events.push(Event::PlayheadChanged { t_tl: clamped });
        }
        events
    }

    fn allocate_clip_id(&mut self) -> ClipId {
        let id = self.next_clip_id;
        self.next_clip_id += 1;
        id
    }

    fn allocate_segment_id(&mut self) -> SegmentId {
        let id = self.next_segment_id;
        self.next_segment_id += 1;
        id
    }
}

impl Engine<FfmpegMediaBackend> {
    /// Creates an engine wired to the FFmpeg backend with tool discovery.
    pub fn with_ffmpeg() -> Self {
        Self::new(FfmpegMediaBackend::default())
    }
}
