use std::path::{Path, PathBuf};
use std::{cmp, sync::mpsc::TrySendError};

use engine::api::AudioOverrideSummary;
use engine::timeline::{ClipId, SegmentId};
use engine::{
    Command, EngineCommandSender, EngineErrorKind, Event, ExportSettings, OutputContainer,
    ProjectSnapshot, format_timecode,
};
use iced::widget::{
    Column, button, canvas, column, container, pick_list, progress_bar, row, scrollable, slider,
    text,
};
use iced::time::{self, Duration, Instant};
use iced::{Element, Length, Subscription, Task, window};
use tracing::{debug, info, warn};

use crate::bridge::{BridgeEvent, engine_subscription, load_editor_config};
use crate::widgets::preview::{self, PreviewImage};
use crate::widgets::timeline;

const VIDEO_EXTENSIONS: [&str; 3] = ["mp4", "webm", "mkv"];
const AUDIO_EXTENSIONS: [&str; 5] = ["mp3", "wav", "aac", "m4a", "opus"];

/// Playback refresh period, about 25 previews per second.
const PLAYBACK_TICK: Duration = Duration::from_millis(40);

const HELP_TEXT: &str = "\
Splice needs ffmpeg and ffprobe. They are looked up on PATH; if they are \
missing you will be asked for the ffmpeg binary and ffprobe is taken from the \
same folder.

Trimming: open a video, move the playhead on the timeline and use Set Start / \
Set End to select a range, then Apply Cut to remove it. Right-click the \
timeline or press Split to cut a segment in two. Removed segments can be \
restored from the segment list. Play runs the preview through the kept \
segments; Preview Cut plays from the selection start.

Appending: Append Video adds another file to the end of the timeline. It can \
be trimmed like the first one.

Audio: by default every clip keeps its own audio. Load Audio replaces it with \
one external track on export; the output stops at the shorter of the two.

Export: pick a container and a bitrate (25-40 Mbps suits 4K), then Export. \
The file extension you choose decides the container.";

/// UI messages handled by the iced app update loop.
#[derive(Debug, Clone)]
pub enum Message {
    OpenPressed,
    OpenPicked(Option<PathBuf>),
    AppendPressed,
    AppendPicked(Option<PathBuf>),
    ClosePressed,
    SplitPressed,
    TimelineScrubbed(i64),
    TimelineSplit(i64),
    SetStartPressed,
    SetEndPressed,
    ResetSelectionPressed,
    PreviewCutPressed,
    ApplyCutPressed,
    PlayPressed,
    PausePressed,
    StopPressed,
    PlaybackTick(Instant),
    SegmentKeptToggled(SegmentId, bool),
    RemoveClipPressed(ClipId),
    LoadAudioPressed,
    AudioPicked(Option<PathBuf>),
    ClearAudioPressed,
    ContainerSelected(OutputContainer),
    BitrateChanged(u32),
    ExportPressed,
    ExportPathPicked(Option<PathBuf>),
    FfmpegPicked(Option<PathBuf>),
    HelpToggled,
    CloseRequested(window::Id),
    QuitConfirmed(window::Id, bool),
    Bridge(BridgeEvent),
}

impl Message {
    /// Messages that change the project or start engine work; refused while
    /// an export renders the current timeline.
    fn edits_project(&self) -> bool {
        matches!(
            self,
            Self::OpenPressed
                | Self::OpenPicked(_)
                | Self::AppendPressed
                | Self::AppendPicked(_)
                | Self::ClosePressed
                | Self::SplitPressed
                | Self::TimelineSplit(_)
                | Self::SetStartPressed
                | Self::SetEndPressed
                | Self::ResetSelectionPressed
                | Self::ApplyCutPressed
                | Self::SegmentKeptToggled(..)
                | Self::RemoveClipPressed(_)
                | Self::LoadAudioPressed
                | Self::AudioPicked(_)
                | Self::ClearAudioPressed
                | Self::ExportPressed
                | Self::ExportPathPicked(_)
        )
    }
}

/// Wall-clock playback through the kept output timeline.
///
/// `started` is set by the first tick so the clock begins when frames do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Playback {
    from_tl: i64,
    started: Option<Instant>,
}

impl Playback {
    fn from(from_tl: i64) -> Self {
        Self {
            from_tl,
            started: None,
        }
    }

    fn position_at(&mut self, now: Instant) -> i64 {
        let started = *self.started.get_or_insert(now);
        let elapsed_tl =
            i64::try_from(now.saturating_duration_since(started).as_micros()).unwrap_or(i64::MAX);
        self.from_tl.saturating_add(elapsed_tl)
    }
}

/// Progress of the running export, in timeline ticks.
#[derive(Debug, Clone, PartialEq)]
struct ExportProgress {
    path: PathBuf,
    done_tl: i64,
    total_tl: i64,
}

impl ExportProgress {
    fn fraction(&self) -> f32 {
        if self.total_tl <= 0 {
            return 0.0;
        }
        (self.done_tl as f64 / self.total_tl as f64).clamp(0.0, 1.0) as f32
    }
}

/// Root UI state.
pub struct AppState {
    engine_tx: Option<EngineCommandSender>,
    project: Option<ProjectSnapshot>,
    playhead_tl: i64,
    pending_playhead_tl: Option<i64>,
    playhead_request_in_flight: bool,
    selection_start_tl: i64,
    selection_end_tl: i64,
    reset_selection_on_load: bool,
    playback: Option<Playback>,
    closing: Option<window::Id>,
    preview: Option<PreviewImage>,
    timeline_cache: canvas::Cache,
    export_settings: ExportSettings,
    export: Option<ExportProgress>,
    show_help: bool,
    status: String,
}

impl AppState {
    /// Boots the app; the engine worker is started by the subscription.
    pub fn boot() -> (Self, Task<Message>) {
        let config = load_editor_config();
        let mut state = Self::with_settings(None, config.export);
        state.status = String::from("starting engine");
        (state, Task::none())
    }

    fn with_settings(engine_tx: Option<EngineCommandSender>, settings: ExportSettings) -> Self {
        Self {
            engine_tx,
            project: None,
            playhead_tl: 0,
            pending_playhead_tl: None,
            playhead_request_in_flight: false,
            selection_start_tl: 0,
            selection_end_tl: 0,
            reset_selection_on_load: false,
            playback: None,
            closing: None,
            preview: None,
            timeline_cache: canvas::Cache::new(),
            export_settings: settings,
            export: None,
            show_help: false,
            status: String::new(),
        }
    }

    /// Handles one UI message.
    pub fn update(&mut self, message: Message) -> Task<Message> {
        if self.is_exporting() && message.edits_project() {
            debug!(?message, "edit ignored during export");
            self.status = String::from("export in progress; edits are disabled until it ends");
            return Task::none();
        }

        match message {
            Message::OpenPressed => {
                return pick_file("Open Video", "Video Files", &VIDEO_EXTENSIONS, Message::OpenPicked);
            }
            Message::OpenPicked(Some(path)) => {
                if self.send_command(Command::Open { path: path.clone() }) {
                    self.reset_selection_on_load = true;
                    self.status = format!("opening {}", path.display());
                }
            }
            Message::AppendPressed => {
                return pick_file(
                    "Select Video to Append",
                    "Video Files",
                    &VIDEO_EXTENSIONS,
                    Message::AppendPicked,
                );
            }
            Message::AppendPicked(Some(path)) => {
                if self.send_command(Command::Append { path: path.clone() }) {
                    self.status = format!("appending {}", path.display());
                }
            }
            Message::ClosePressed => {
                self.send_command(Command::Close);
            }
            Message::SplitPressed => {
                self.request_split(self.playhead_tl);
            }
            Message::TimelineSplit(at_tl) => {
                self.request_split(at_tl);
            }
            Message::TimelineScrubbed(t_tl) => {
                let clamped = self.clamp_playhead(t_tl);
                if self.playback.is_some() {
                    self.playback = Some(Playback::from(clamped));
                }
                self.playhead_tl = clamped;
                self.queue_playhead(clamped);
            }
            Message::SetStartPressed => {
                self.selection_start_tl = self.playhead_tl;
                if self.selection_start_tl > self.selection_end_tl {
                    self.selection_end_tl = self.duration_tl();
                }
            }
            Message::SetEndPressed => {
                self.selection_end_tl = self.playhead_tl;
                if self.selection_end_tl < self.selection_start_tl {
                    self.selection_start_tl = 0;
                }
            }
            Message::ResetSelectionPressed => {
                self.selection_start_tl = 0;
                self.selection_end_tl = self.duration_tl();
            }
            Message::PreviewCutPressed => {
                self.start_playback(self.selection_start_tl);
            }
            Message::PlayPressed => {
                let from_tl = if self.playhead_tl >= self.duration_tl() - 1 {
                    0
                } else {
                    self.playhead_tl
                };
                self.start_playback(from_tl);
            }
            Message::PausePressed => {
                if self.playback.take().is_some() {
                    self.status = format!("paused at {}", format_timecode(self.playhead_tl));
                    self.queue_playhead(self.playhead_tl);
                }
            }
            Message::StopPressed => {
                self.playback = None;
                self.playhead_tl = 0;
                if self.project.is_some() {
                    self.queue_playhead(0);
                }
                self.status = String::from("stopped");
            }
            Message::PlaybackTick(now) => {
                self.advance_playback(now);
            }
            Message::ApplyCutPressed => {
                self.apply_cut();
            }
            Message::SegmentKeptToggled(segment_id, kept) => {
                let command = if kept {
                    Command::RestoreSegment { segment_id }
                } else {
                    Command::RemoveSegment { segment_id }
                };
                self.send_command(command);
            }
            Message::RemoveClipPressed(clip_id) => {
                self.send_command(Command::RemoveClip { clip_id });
            }
            Message::LoadAudioPressed => {
                return pick_file("Open Audio", "Audio Files", &AUDIO_EXTENSIONS, Message::AudioPicked);
            }
            Message::AudioPicked(Some(path)) => {
                if self.send_command(Command::SetAudioOverride { path: path.clone() }) {
                    self.status = format!("loading audio {}", path.display());
                }
            }
            Message::ClearAudioPressed => {
                self.send_command(Command::ClearAudioOverride);
            }
            Message::ContainerSelected(container) => {
                self.export_settings.container = container;
            }
            Message::BitrateChanged(mbps) => {
                self.export_settings = self.export_settings.with_bitrate(mbps);
            }
            Message::ExportPressed => {
                if self.project.is_none() {
                    self.status = String::from("no video loaded");
                    return Task::none();
                }
                return save_export_file(self.export_settings.container);
            }
            Message::ExportPathPicked(Some(path)) => {
                self.send_command(Command::Export {
                    path,
                    settings: self.export_settings,
                });
            }
            Message::FfmpegPicked(Some(path)) => {
                self.send_command(Command::ConfigureFfmpeg { path });
            }
            Message::OpenPicked(None)
            | Message::AppendPicked(None)
            | Message::AudioPicked(None)
            | Message::ExportPathPicked(None) => {}
            Message::FfmpegPicked(None) => {
                self.status = String::from("ffmpeg is required to read and export video");
            }
            Message::HelpToggled => {
                self.show_help = !self.show_help;
            }
            Message::CloseRequested(id) => {
                if !self.is_exporting() {
                    return window::close(id);
                }
                return confirm_quit(id);
            }
            Message::QuitConfirmed(id, true) => {
                if !self.is_exporting() {
                    return window::close(id);
                }
                info!("stopping export before exit");
                self.closing = Some(id);
                self.status = String::from("stopping export before exit");
                if !self.send_command(Command::Shutdown) {
                    return window::close(id);
                }
            }
            Message::QuitConfirmed(_, false) => {}
            Message::Bridge(BridgeEvent::Ready(sender)) => {
                self.engine_tx = Some(sender);
                self.status = String::from("ready");
                self.flush_playhead_request();
            }
            Message::Bridge(BridgeEvent::Event(event)) => {
                return self.apply_engine_event(event);
            }
            Message::Bridge(BridgeEvent::Disconnected) => {
                warn!("engine worker disconnected");
                self.status = String::from("engine stopped");
                self.engine_tx = None;
                self.pending_playhead_tl = None;
                self.playhead_request_in_flight = false;
                self.playback = None;
                self.export = None;
                return self.close_if_quitting();
            }
        }

        Task::none()
    }

    fn start_playback(&mut self, from_tl: i64) {
        if self.duration_tl() <= 0 {
            self.status = String::from("nothing to play");
            return;
        }
        let from_tl = self.clamp_playhead(from_tl);
        self.playback = Some(Playback::from(from_tl));
        self.playhead_tl = from_tl;
        self.queue_playhead(from_tl);
        self.status = format!("playing from {}", format_timecode(from_tl));
    }

    fn advance_playback(&mut self, now: Instant) {
        let last_tl = self.duration_tl() - 1;
        let Some(playback) = self.playback.as_mut() else {
            return;
        };
        let position_tl = playback.position_at(now);
        if last_tl < 0 || position_tl >= last_tl {
            self.playback = None;
            self.playhead_tl = last_tl.max(0);
            self.status = String::from("playback reached the end");
        } else {
            self.playhead_tl = position_tl;
        }
        if self.project.is_some() {
            self.queue_playhead(self.playhead_tl);
        }
    }

    fn close_if_quitting(&self) -> Task<Message> {
        match self.closing {
            Some(id) => window::close(id),
            None => Task::none(),
        }
    }

    fn request_split(&mut self, at_tl: i64) {
        if self.send_command(Command::Split { at_tl }) {
            self.status = format!("split at {}", format_timecode(at_tl));
        }
    }

    fn apply_cut(&mut self) {
        let (start_tl, end_tl) = (self.selection_start_tl, self.selection_end_tl);
        if start_tl >= end_tl {
            self.status = String::from("select a range with Set Start and Set End first");
            return;
        }
        if self.send_command(Command::RemoveRange { start_tl, end_tl }) {
            self.selection_start_tl = 0;
            self.selection_end_tl = 0;
        }
    }

    fn send_command(&mut self, command: Command) -> bool {
        if let Some(sender) = &self.engine_tx {
            match sender.try_send(command) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    self.status = String::from("engine command queue is full");
                    false
                }
                Err(TrySendError::Disconnected(_)) => {
                    self.status = String::from("engine command channel closed");
                    self.engine_tx = None;
                    self.playhead_request_in_flight = false;
                    false
                }
            }
        } else {
            self.status = String::from("engine is not ready");
            false
        }
    }

    fn queue_playhead(&mut self, t_tl: i64) {
        self.pending_playhead_tl = Some(t_tl);
        self.flush_playhead_request();
    }

    /// Sends at most one `SetPlayhead` at a time; later scrubs overwrite the
    /// pending value until the worker reports the previous one settled.
    fn flush_playhead_request(&mut self) {
        if self.playhead_request_in_flight {
            return;
        }

        let Some(t_tl) = self.pending_playhead_tl.take() else {
            return;
        };

        if let Some(sender) = &self.engine_tx {
            match sender.try_send(Command::SetPlayhead { t_tl }) {
                Ok(()) => {
                    self.playhead_request_in_flight = true;
                }
                Err(TrySendError::Full(_)) => {
                    self.pending_playhead_tl = Some(t_tl);
                    self.status = String::from("engine command queue is full");
                }
                Err(TrySendError::Disconnected(_)) => {
                    self.status = String::from("engine command channel closed");
                    self.engine_tx = None;
                    self.playhead_request_in_flight = false;
                }
            }
        } else {
            self.pending_playhead_tl = Some(t_tl);
            self.status = String::from("engine is not ready");
        }
    }

    fn apply_engine_event(&mut self, event: Event) -> Task<Message> {
        match event {
            Event::ProjectChanged(snapshot) => {
                let duration_tl = snapshot.duration_tl;
                self.project = Some(snapshot);
                self.timeline_cache.clear();
                if self.reset_selection_on_load {
                    self.reset_selection_on_load = false;
                    self.selection_start_tl = 0;
                    self.selection_end_tl = duration_tl;
                } else {
                    self.selection_start_tl = self.selection_start_tl.clamp(0, duration_tl);
                    self.selection_end_tl = self.selection_end_tl.clamp(0, duration_tl);
                }
                self.playhead_tl = self.clamp_playhead(self.playhead_tl);
                self.status = format!("total duration {}", format_timecode(duration_tl));
            }
            Event::ProjectClosed => {
                self.project = None;
                self.preview = None;
                self.timeline_cache.clear();
                self.playhead_tl = 0;
                self.playback = None;
                self.selection_start_tl = 0;
                self.selection_end_tl = 0;
                self.status = String::from("project closed");
            }
            Event::PlayheadChanged { t_tl } => {
                // The playback clock owns the playhead while it runs.
                if self.playback.is_none() {
                    self.playhead_tl = self.clamp_playhead(t_tl);
                }
                if self.duration_tl() == 0 {
                    self.preview = None;
                }
            }
            Event::PreviewFrameReady { t_tl, frame } => {
                if self.playback.is_none() {
                    self.playhead_tl = self.clamp_playhead(t_tl);
                }
                self.preview = PreviewImage::from_frame(&frame);
                if self.preview.is_none() {
                    debug!(width = frame.width, height = frame.height, "preview frame rejected");
                }
            }
            Event::PlayheadSettled { requested_tl } => {
                debug!(requested_tl, "playhead request settled");
                self.playhead_request_in_flight = false;
                self.flush_playhead_request();
            }
            Event::ToolsConfigured { ffmpeg } => {
                self.status = format!("using ffmpeg at {}; retry the last action", ffmpeg.display());
            }
            Event::ExportStarted { path, total_tl } => {
                info!(path = %path.display(), "export started");
                self.status = format!("exporting to {}", path.display());
                self.export = Some(ExportProgress {
                    path,
                    done_tl: 0,
                    total_tl,
                });
            }
            Event::ExportProgress { done_tl, total_tl } => {
                if let Some(export) = self.export.as_mut() {
                    export.done_tl = done_tl;
                    export.total_tl = total_tl;
                }
            }
            Event::ExportFinished { path } => {
                self.export = None;
                self.status = format!("export completed: {}", path.display());
                return self.close_if_quitting();
            }
            Event::Error(error) => {
                self.status = format!("error: {}", error.message);
                self.reset_selection_on_load = false;
                match error.kind {
                    EngineErrorKind::ExportFailed => {
                        self.export = None;
                        return self.close_if_quitting();
                    }
                    EngineErrorKind::ToolNotFound => {
                        self.export = None;
                        if self.closing.is_some() {
                            return self.close_if_quitting();
                        }
                        return pick_ffmpeg();
                    }
                    _ => {}
                }
            }
        }

        Task::none()
    }

    fn duration_tl(&self) -> i64 {
        self.project
            .as_ref()
            .map(|snapshot| snapshot.duration_tl)
            .unwrap_or(0)
    }

    fn clamp_playhead(&self, t_tl: i64) -> i64 {
        let duration_tl = self.duration_tl();
        if duration_tl <= 0 {
            return 0;
        }
        cmp::max(0, cmp::min(t_tl, duration_tl - 1))
    }

    fn is_exporting(&self) -> bool {
        self.export.is_some()
    }

    /// Renders the UI tree.
    pub fn view(&self) -> Element<'_, Message> {
        let idle = !self.is_exporting();
        let has_project = self.project.is_some();
        let loaded = idle && has_project;
        let playing = self.playback.is_some();
        let when = |enabled: bool, message: Message| enabled.then_some(message);

        let file_row = row![
            button("Open Video").on_press_maybe(when(idle, Message::OpenPressed)),
            button("Append Video").on_press_maybe(when(loaded, Message::AppendPressed)),
            button("Close").on_press_maybe(when(loaded, Message::ClosePressed)),
            button(if self.show_help { "Hide Help" } else { "?" }).on_press(Message::HelpToggled),
            text(self.project_label()).width(Length::Fill),
        ]
        .spacing(8);

        let preview_area: Element<'_, Message> = if self.show_help {
            scrollable(text(HELP_TEXT)).height(Length::Fill).into()
        } else {
            let placeholder = if self.project.is_some() {
                "No preview frame"
            } else {
                "Open a video to start"
            };
            preview::view(self.preview.as_ref(), placeholder)
        };

        let timeline = timeline::view(
            self.project.as_ref(),
            self.playhead_tl,
            Some((self.selection_start_tl, self.selection_end_tl)),
            &self.timeline_cache,
            Message::TimelineScrubbed,
            idle.then_some(Message::TimelineSplit as fn(i64) -> Message),
        );

        let playback_row = row![
            button("Play").on_press_maybe(when(
                has_project && !playing && self.duration_tl() > 0,
                Message::PlayPressed
            )),
            button("Pause").on_press_maybe(when(playing, Message::PausePressed)),
            button("Stop").on_press_maybe(when(has_project, Message::StopPressed)),
            button("Preview Cut").on_press_maybe(when(
                has_project && self.duration_tl() > 0,
                Message::PreviewCutPressed
            )),
        ]
        .spacing(8);

        let trim_row = row![
            text(format!("Playhead: {}", format_timecode(self.playhead_tl))),
            button("Split").on_press_maybe(when(loaded, Message::SplitPressed)),
            text(format!("Start: {}", format_timecode(self.selection_start_tl))),
            button("[ Set Start ]").on_press_maybe(when(loaded, Message::SetStartPressed)),
            button("[ Set End ]").on_press_maybe(when(loaded, Message::SetEndPressed)),
            text(format!("End: {}", format_timecode(self.selection_end_tl))),
            button("Reset").on_press_maybe(when(loaded, Message::ResetSelectionPressed)),
            button("Apply Cut (Remove Selection)")
                .on_press_maybe(when(loaded, Message::ApplyCutPressed)),
        ]
        .spacing(8);

        let audio_row = row![
            button("Load Audio").on_press_maybe(when(loaded, Message::LoadAudioPressed)),
            button("Clear Audio").on_press_maybe(when(
                loaded && self.audio_override().is_some(),
                Message::ClearAudioPressed
            )),
            text(self.audio_label()),
        ]
        .spacing(8);

        let export_row = row![
            pick_list(
                OutputContainer::ALL,
                Some(self.export_settings.container),
                Message::ContainerSelected
            ),
            column![
                text(format!("Bitrate: {} Mbps", self.export_settings.bitrate_mbps)),
                slider(
                    ExportSettings::MIN_BITRATE_MBPS..=ExportSettings::MAX_BITRATE_MBPS,
                    self.export_settings.bitrate_mbps,
                    Message::BitrateChanged
                )
                .step(ExportSettings::BITRATE_STEP_MBPS),
            ]
            .spacing(4)
            .width(Length::Fixed(220.0)),
            text(format!("Total Duration: {}", format_timecode(self.duration_tl()))).size(18),
            button("Export Video").on_press_maybe(when(loaded, Message::ExportPressed)),
        ]
        .spacing(12);

        let mut layout = column![
            file_row,
            container(preview_area).height(Length::Fill),
            timeline,
            playback_row,
            trim_row,
            row![self.clip_list(loaded), self.segment_list(loaded)].spacing(16),
            audio_row,
            export_row,
        ]
        .spacing(10)
        .padding(16);

        if let Some(export) = &self.export {
            layout = layout.push(
                row![
                    progress_bar(0.0..=1.0, export.fraction()).height(Length::Fixed(16.0)),
                    text(format!(
                        "{} / {}",
                        format_timecode(export.done_tl),
                        format_timecode(export.total_tl)
                    )),
                ]
                .spacing(8),
            );
        }

        layout.push(text(self.status.as_str())).into()
    }

    fn clip_list(&self, enabled: bool) -> Element<'_, Message> {
        let Some(project) = &self.project else {
            return column![].width(Length::FillPortion(1)).into();
        };
        let removable = enabled && project.clips.len() > 1;
        let rows = project.clips.iter().map(|clip| {
            row![
                text(format!(
                    "{} ({})",
                    file_name(&clip.path),
                    format_timecode(clip.duration_tl)
                ))
                .width(Length::Fill),
                button("Remove").on_press_maybe(removable.then_some(Message::RemoveClipPressed(clip.id))),
            ]
            .spacing(8)
            .into()
        });

        scrollable(Column::with_children(rows).spacing(4))
            .height(Length::Fixed(96.0))
            .width(Length::FillPortion(1))
            .into()
    }

    fn segment_list(&self, enabled: bool) -> Element<'_, Message> {
        let Some(project) = &self.project else {
            return column![].width(Length::FillPortion(1)).into();
        };
        let rows = project.segments.iter().map(|segment| {
            let source = project
                .clips
                .iter()
                .find(|clip| clip.id == segment.clip_id)
                .map(|clip| file_name(&clip.path))
                .unwrap_or_default();
            let label = format!(
                "#{} {} {} - {}{}",
                segment.id,
                source,
                format_timecode(segment.src_start),
                format_timecode(segment.src_end),
                if segment.kept { "" } else { " (removed)" }
            );
            let toggle = if segment.kept {
                button("Remove")
            } else {
                button("Restore")
            };
            row![
                text(label).width(Length::Fill),
                toggle.on_press_maybe(
                    enabled.then_some(Message::SegmentKeptToggled(segment.id, !segment.kept))
                ),
            ]
            .spacing(8)
            .into()
        });

        scrollable(Column::with_children(rows).spacing(4))
            .height(Length::Fixed(96.0))
            .width(Length::FillPortion(1))
            .into()
    }

    fn project_label(&self) -> String {
        if let Some(export) = &self.export {
            return format!("Exporting to {}... please wait", export.path.display());
        }
        match &self.project {
            Some(project) => project
                .clips
                .iter()
                .map(|clip| clip.path.display().to_string())
                .collect::<Vec<_>>()
                .join(" + "),
            None => String::from("No file selected"),
        }
    }

    fn audio_override(&self) -> Option<&AudioOverrideSummary> {
        self.project.as_ref()?.audio_override.as_ref()
    }

    fn audio_label(&self) -> String {
        match self.audio_override() {
            Some(audio) => format!("Audio: {} (applied on export)", file_name(&audio.path)),
            None => String::from("Audio: Original"),
        }
    }

    /// Engine events, window close requests and, while playing, the
    /// playback clock.
    pub fn subscription(&self) -> Subscription<Message> {
        let mut subscriptions = vec![
            engine_subscription().map(Message::Bridge),
            window::close_requests().map(Message::CloseRequested),
        ];
        if self.playback.is_some() {
            subscriptions.push(time::every(PLAYBACK_TICK).map(Message::PlaybackTick));
        }
        Subscription::batch(subscriptions)
    }

    #[cfg(test)]
    fn from_sender_for_test(engine_tx: EngineCommandSender) -> Self {
        let mut state = Self::with_settings(Some(engine_tx), ExportSettings::default());
        state.status = String::from("idle");
        state
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn pick_file(
    title: &'static str,
    filter_name: &'static str,
    extensions: &'static [&'static str],
    on_picked: fn(Option<PathBuf>) -> Message,
) -> Task<Message> {
    Task::perform(
        async move {
            rfd::AsyncFileDialog::new()
                .set_title(title)
                .add_filter(filter_name, extensions)
                .add_filter("All Files", &["*"])
                .pick_file()
                .await
                .map(|file| file.path().to_path_buf())
        },
        on_picked,
    )
}

fn pick_ffmpeg() -> Task<Message> {
    Task::perform(
        async {
            rfd::AsyncFileDialog::new()
                .set_title("Select FFmpeg Executable")
                .pick_file()
                .await
                .map(|file| file.path().to_path_buf())
        },
        Message::FfmpegPicked,
    )
}

fn confirm_quit(id: window::Id) -> Task<Message> {
    Task::perform(
        async {
            rfd::AsyncMessageDialog::new()
                .set_level(rfd::MessageLevel::Warning)
                .set_title("Export in progress")
                .set_description("An export is still running. Stop it and quit?")
                .set_buttons(rfd::MessageButtons::YesNo)
                .show()
                .await
        },
        move |answer| {
            Message::QuitConfirmed(id, matches!(answer, rfd::MessageDialogResult::Yes))
        },
    )
}

/// Opens a save dialog with the chosen container's filter listed first.
fn save_export_file(preferred: OutputContainer) -> Task<Message> {
    let mut containers = vec![preferred];
    containers.extend(
        OutputContainer::ALL
            .into_iter()
            .filter(|container| *container != preferred),
    );

    Task::perform(
        async move {
            let mut dialog = rfd::AsyncFileDialog::new()
                .set_title("Export Video")
                .set_file_name(format!("output.{}", preferred.extension()));
            for container in containers {
                dialog = dialog.add_filter(container.to_string(), &[container.extension()]);
            }
            dialog
                .save_file()
                .await
                .map(|file| file.path().to_path_buf())
        },
        Message::ExportPathPicked,
    )
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::sync::mpsc;
    use std::sync::mpsc::TryRecvError;

    use engine::api::{ClipSummary, SegmentSummary};
    use engine::{
        Command, EngineErrorEvent, EngineErrorKind, Event, ExportSettings, OutputContainer,
        PreviewFrame, ProjectSnapshot,
    };
    use iced::time::{Duration, Instant};
    use iced::window;

    use crate::bridge::BridgeEvent;

    use super::{AppState, Message};

    const SECOND: i64 = 1_000_000;

    fn app() -> (AppState, mpsc::Receiver<Command>) {
        let (command_tx, command_rx) = mpsc::sync_channel(8);
        (AppState::from_sender_for_test(command_tx), command_rx)
    }

    fn event(app: &mut AppState, event: Event) {
        let _ = app.update(Message::Bridge(BridgeEvent::Event(event)));
    }

    fn snapshot(duration_tl: i64) -> ProjectSnapshot {
        ProjectSnapshot {
            clips: vec![ClipSummary {
                id: 1,
                path: PathBuf::from("demo.mp4"),
                duration_tl,
                width: 160,
                height: 90,
                has_audio: true,
            }],
            segments: vec![SegmentSummary {
                id: 1,
                clip_id: 1,
                src_start: 0,
                src_end: duration_tl,
                kept: true,
                timeline_start: Some(0),
            }],
            duration_tl,
            audio_override: None,
        }
    }

    fn frame() -> PreviewFrame {
        PreviewFrame {
            width: 1,
            height: 1,
            bytes: Arc::from(vec![0_u8; 4]),
        }
    }

    /// App with a 60 s project loaded and the playhead at `playhead_tl`.
    fn loaded_at(playhead_tl: i64) -> (AppState, mpsc::Receiver<Command>) {
        let (mut app, command_rx) = app();
        event(&mut app, Event::ProjectChanged(snapshot(60 * SECOND)));
        event(&mut app, Event::PlayheadChanged { t_tl: playhead_tl });
        (app, command_rx)
    }

    #[test]
    fn picked_file_dispatches_open_command() {
        let (mut app, command_rx) = app();

        let _ = app.update(Message::OpenPicked(Some(PathBuf::from("demo.mp4"))));

        let command = command_rx.recv().expect("open command");
        assert_eq!(
            command,
            Command::Open {
                path: PathBuf::from("demo.mp4")
            }
        );
    }

    #[test]
    fn cancelled_dialog_sends_nothing() {
        let (mut app, command_rx) = app();

        let _ = app.update(Message::OpenPicked(None));
        let _ = app.update(Message::ExportPathPicked(None));

        assert!(matches!(command_rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn opening_resets_selection_to_whole_timeline() {
        let (mut app, _command_rx) = app();
        let _ = app.update(Message::OpenPicked(Some(PathBuf::from("demo.mp4"))));

        event(&mut app, Event::ProjectChanged(snapshot(30 * SECOND)));

        assert_eq!(app.selection_start_tl, 0);
        assert_eq!(app.selection_end_tl, 30 * SECOND);
    }

    #[test]
    fn timeline_scrub_dispatches_set_playhead_command() {
        let (mut app, command_rx) = loaded_at(0);

        let _ = app.update(Message::TimelineScrubbed(42));

        let command = command_rx.recv().expect("set playhead command");
        assert_eq!(command, Command::SetPlayhead { t_tl: 42 });
    }

    #[test]
    fn split_button_dispatches_split_at_current_playhead() {
        let (mut app, command_rx) = loaded_at(250_000);

        let _ = app.update(Message::SplitPressed);

        let command = command_rx.recv().expect("split command");
        assert_eq!(command, Command::Split { at_tl: 250_000 });
    }

    #[test]
    fn right_click_on_timeline_splits_at_that_point() {
        let (mut app, command_rx) = loaded_at(0);

        let _ = app.update(Message::TimelineSplit(5 * SECOND));

        assert_eq!(
            command_rx.recv().expect("split command"),
            Command::Split { at_tl: 5 * SECOND }
        );
    }

    #[test]
    fn timeline_scrub_coalesces_pending_playhead_updates() {
        let (mut app, command_rx) = loaded_at(0);

        let _ = app.update(Message::TimelineScrubbed(10));
        let _ = app.update(Message::TimelineScrubbed(20));
        let _ = app.update(Message::TimelineScrubbed(30));

        let first = command_rx.recv().expect("first set playhead command");
        assert_eq!(first, Command::SetPlayhead { t_tl: 10 });
        assert!(matches!(command_rx.try_recv(), Err(TryRecvError::Empty)));

        event(
            &mut app,
            Event::PreviewFrameReady {
                t_tl: 10,
                frame: frame(),
            },
        );
        assert!(app.preview.is_some());
        assert!(matches!(command_rx.try_recv(), Err(TryRecvError::Empty)));

        event(&mut app, Event::PlayheadSettled { requested_tl: 10 });

        let second = command_rx.recv().expect("second set playhead command");
        assert_eq!(second, Command::SetPlayhead { t_tl: 30 });
    }

    #[test]
    fn unrelated_error_mid_scrub_keeps_request_in_flight() {
        let (mut app, command_rx) = loaded_at(0);
        let _ = app.update(Message::TimelineScrubbed(10));
        let _ = app.update(Message::TimelineScrubbed(20));
        assert_eq!(
            command_rx.recv().expect("first set playhead"),
            Command::SetPlayhead { t_tl: 10 }
        );

        event(
            &mut app,
            Event::Error(EngineErrorEvent {
                kind: EngineErrorKind::SplitPointAtBoundary,
                message: String::from("cannot split at segment boundary: 0"),
            }),
        );
        assert!(matches!(command_rx.try_recv(), Err(TryRecvError::Empty)));

        event(&mut app, Event::PlayheadSettled { requested_tl: 10 });
        assert_eq!(
            command_rx.recv().expect("queued set playhead"),
            Command::SetPlayhead { t_tl: 20 }
        );
    }

    #[test]
    fn preview_from_open_does_not_release_scrub_request() {
        let (mut app, command_rx) = loaded_at(0);
        let _ = app.update(Message::TimelineScrubbed(10));
        let _ = app.update(Message::TimelineScrubbed(20));
        let _ = command_rx.recv().expect("first set playhead");

        event(&mut app, Event::PlayheadChanged { t_tl: 0 });
        event(
            &mut app,
            Event::PreviewFrameReady {
                t_tl: 0,
                frame: frame(),
            },
        );

        assert!(matches!(command_rx.try_recv(), Err(TryRecvError::Empty)));
        assert!(app.playhead_request_in_flight);
    }

    #[test]
    fn edits_are_ignored_while_exporting() {
        let (mut app, command_rx) = loaded_at(SECOND);
        event(
            &mut app,
            Event::ExportStarted {
                path: PathBuf::from("out.mp4"),
                total_tl: 60 * SECOND,
            },
        );

        let _ = app.update(Message::TimelineSplit(5 * SECOND));
        let _ = app.update(Message::SplitPressed);
        let _ = app.update(Message::SegmentKeptToggled(1, false));
        let _ = app.update(Message::RemoveClipPressed(1));
        let _ = app.update(Message::OpenPicked(Some(PathBuf::from("other.mp4"))));
        let _ = app.update(Message::ExportPathPicked(Some(PathBuf::from("again.mp4"))));

        assert!(matches!(command_rx.try_recv(), Err(TryRecvError::Empty)));
        assert!(app.status.contains("export in progress"));

        let _ = app.update(Message::TimelineScrubbed(42));
        assert_eq!(
            command_rx.recv().expect("scrubbing stays available"),
            Command::SetPlayhead { t_tl: 42 }
        );
    }

    #[test]
    fn playback_advances_with_the_clock_and_stop_rewinds() {
        let (mut app, command_rx) = loaded_at(2 * SECOND);
        let t0 = Instant::now();

        let _ = app.update(Message::PlayPressed);
        assert_eq!(
            command_rx.recv().expect("play seeks first"),
            Command::SetPlayhead { t_tl: 2 * SECOND }
        );
        let _ = app.update(Message::PlaybackTick(t0));
        let _ = app.update(Message::PlaybackTick(t0 + Duration::from_millis(500)));
        assert_eq!(app.playhead_tl, 2 * SECOND + SECOND / 2);
        assert!(matches!(command_rx.try_recv(), Err(TryRecvError::Empty)));

        // Late replies must not drag the playhead back while playing.
        event(
            &mut app,
            Event::PreviewFrameReady {
                t_tl: 2 * SECOND,
                frame: frame(),
            },
        );
        assert_eq!(app.playhead_tl, 2 * SECOND + SECOND / 2);
        event(
            &mut app,
            Event::PlayheadSettled {
                requested_tl: 2 * SECOND,
            },
        );
        assert_eq!(
            command_rx.recv().expect("latest playback position"),
            Command::SetPlayhead {
                t_tl: 2 * SECOND + SECOND / 2
            }
        );

        let _ = app.update(Message::StopPressed);
        assert!(app.playback.is_none());
        assert_eq!(app.playhead_tl, 0);
        event(
            &mut app,
            Event::PlayheadSettled {
                requested_tl: 2 * SECOND + SECOND / 2,
            },
        );
        assert_eq!(
            command_rx.recv().expect("stop rewinds"),
            Command::SetPlayhead { t_tl: 0 }
        );
    }

    #[test]
    fn playback_stops_at_the_end_of_the_timeline() {
        let (mut app, _command_rx) = loaded_at(59 * SECOND);
        let t0 = Instant::now();

        let _ = app.update(Message::PlayPressed);
        let _ = app.update(Message::PlaybackTick(t0));
        let _ = app.update(Message::PlaybackTick(t0 + Duration::from_secs(2)));

        assert!(app.playback.is_none());
        assert_eq!(app.playhead_tl, 60 * SECOND - 1);
        assert!(app.status.contains("end"));
    }

    #[test]
    fn play_at_the_end_restarts_from_zero() {
        let (mut app, command_rx) = loaded_at(60 * SECOND - 1);

        let _ = app.update(Message::PlayPressed);

        assert_eq!(
            command_rx.recv().expect("restart"),
            Command::SetPlayhead { t_tl: 0 }
        );
        assert_eq!(app.playback.map(|playback| playback.from_tl), Some(0));
    }

    #[test]
    fn pause_keeps_position_and_scrub_restarts_the_clock() {
        let (mut app, _command_rx) = loaded_at(0);
        let t0 = Instant::now();
        let _ = app.update(Message::PlayPressed);
        let _ = app.update(Message::PlaybackTick(t0));
        let _ = app.update(Message::PlaybackTick(t0 + Duration::from_secs(1)));

        let _ = app.update(Message::TimelineScrubbed(30 * SECOND));
        let _ = app.update(Message::PlaybackTick(t0 + Duration::from_secs(3)));
        let _ = app.update(Message::PlaybackTick(t0 + Duration::from_secs(4)));
        assert_eq!(app.playhead_tl, 31 * SECOND);

        let _ = app.update(Message::PausePressed);
        let _ = app.update(Message::PlaybackTick(t0 + Duration::from_secs(9)));
        assert!(app.playback.is_none());
        assert_eq!(app.playhead_tl, 31 * SECOND);
    }

    #[test]
    fn preview_cut_plays_from_selection_start() {
        let (mut app, command_rx) = loaded_at(10 * SECOND);
        let _ = app.update(Message::SetStartPressed);
        event(&mut app, Event::PlayheadChanged { t_tl: 40 * SECOND });

        let _ = app.update(Message::PreviewCutPressed);

        assert_eq!(
            command_rx.recv().expect("seek to selection start"),
            Command::SetPlayhead { t_tl: 10 * SECOND }
        );
        assert_eq!(app.playhead_tl, 10 * SECOND);
        assert_eq!(app.playback.map(|playback| playback.from_tl), Some(10 * SECOND));
    }

    #[test]
    fn set_start_after_end_moves_end_to_timeline_end() {
        let (mut app, _command_rx) = loaded_at(10 * SECOND);
        let _ = app.update(Message::SetEndPressed);
        event(&mut app, Event::PlayheadChanged { t_tl: 20 * SECOND });

        let _ = app.update(Message::SetStartPressed);

        assert_eq!(app.selection_start_tl, 20 * SECOND);
        assert_eq!(app.selection_end_tl, 60 * SECOND);
    }

    #[test]
    fn set_end_before_start_moves_start_to_zero() {
        let (mut app, _command_rx) = loaded_at(30 * SECOND);
        let _ = app.update(Message::SetStartPressed);
        event(&mut app, Event::PlayheadChanged { t_tl: 10 * SECOND });

        let _ = app.update(Message::SetEndPressed);

        assert_eq!(app.selection_start_tl, 0);
        assert_eq!(app.selection_end_tl, 10 * SECOND);
    }

    #[test]
    fn apply_cut_removes_selection_and_clears_it() {
        let (mut app, command_rx) = loaded_at(10 * SECOND);
        let _ = app.update(Message::SetStartPressed);
        event(&mut app, Event::PlayheadChanged { t_tl: 20 * SECOND });
        let _ = app.update(Message::SetEndPressed);

        let _ = app.update(Message::ApplyCutPressed);

        assert_eq!(
            command_rx.recv().expect("remove range command"),
            Command::RemoveRange {
                start_tl: 10 * SECOND,
                end_tl: 20 * SECOND,
            }
        );
        assert_eq!((app.selection_start_tl, app.selection_end_tl), (0, 0));
    }

    #[test]
    fn apply_cut_with_empty_selection_sends_nothing() {
        let (mut app, command_rx) = loaded_at(0);

        let _ = app.update(Message::ApplyCutPressed);

        assert!(matches!(command_rx.try_recv(), Err(TryRecvError::Empty)));
        assert!(app.status.contains("select a range"));
    }

    #[test]
    fn segment_toggle_maps_to_remove_and_restore() {
        let (mut app, command_rx) = loaded_at(0);

        let _ = app.update(Message::SegmentKeptToggled(3, false));
        let _ = app.update(Message::SegmentKeptToggled(3, true));

        assert_eq!(
            command_rx.recv().expect("remove"),
            Command::RemoveSegment { segment_id: 3 }
        );
        assert_eq!(
            command_rx.recv().expect("restore"),
            Command::RestoreSegment { segment_id: 3 }
        );
    }

    #[test]
    fn bitrate_changes_snap_to_five_mbps_steps() {
        let (mut app, _command_rx) = app();

        let _ = app.update(Message::BitrateChanged(33));
        assert_eq!(app.export_settings.bitrate_mbps, 35);
        let _ = app.update(Message::BitrateChanged(90));
        assert_eq!(app.export_settings.bitrate_mbps, 60);
    }

    #[test]
    fn export_uses_chosen_container_and_bitrate() {
        let (mut app, command_rx) = loaded_at(0);
        let _ = app.update(Message::ContainerSelected(OutputContainer::Mp4));
        let _ = app.update(Message::BitrateChanged(40));

        let _ = app.update(Message::ExportPathPicked(Some(PathBuf::from("out.mp4"))));

        assert_eq!(
            command_rx.recv().expect("export command"),
            Command::Export {
                path: PathBuf::from("out.mp4"),
                settings: ExportSettings {
                    container: OutputContainer::Mp4,
                    bitrate_mbps: 40,
                },
            }
        );
    }

    #[test]
    fn export_events_drive_progress_until_finished() {
        let (mut app, _command_rx) = loaded_at(0);

        event(
            &mut app,
            Event::ExportStarted {
                path: PathBuf::from("out.webm"),
                total_tl: 4 * SECOND,
            },
        );
        assert!(app.is_exporting());
        event(
            &mut app,
            Event::ExportProgress {
                done_tl: SECOND,
                total_tl: 4 * SECOND,
            },
        );
        let fraction = app.export.as_ref().map(|export| export.fraction());
        assert_eq!(fraction, Some(0.25));

        event(
            &mut app,
            Event::ExportFinished {
                path: PathBuf::from("out.webm"),
            },
        );
        assert!(!app.is_exporting());
        assert!(app.status.contains("out.webm"));
    }

    #[test]
    fn failed_export_re_enables_controls() {
        let (mut app, _command_rx) = loaded_at(0);
        event(
            &mut app,
            Event::ExportStarted {
                path: PathBuf::from("out.webm"),
                total_tl: SECOND,
            },
        );

        event(
            &mut app,
            Event::Error(EngineErrorEvent {
                kind: EngineErrorKind::ExportFailed,
                message: String::from("export to out.webm failed"),
            }),
        );

        assert!(!app.is_exporting());
        assert!(app.status.contains("failed"));
    }

    #[test]
    fn picked_ffmpeg_configures_the_engine() {
        let (mut app, command_rx) = app();

        let _ = app.update(Message::FfmpegPicked(Some(PathBuf::from("/opt/ffmpeg/ffmpeg"))));

        assert_eq!(
            command_rx.recv().expect("configure command"),
            Command::ConfigureFfmpeg {
                path: PathBuf::from("/opt/ffmpeg/ffmpeg")
            }
        );
    }

    #[test]
    fn playhead_on_empty_timeline_clears_preview_and_settles() {
        let (mut app, command_rx) = loaded_at(0);
        let _ = app.update(Message::TimelineScrubbed(5));
        let _ = command_rx.recv().expect("first set playhead");
        event(&mut app, Event::ProjectChanged(snapshot(0)));
        let _ = app.update(Message::TimelineScrubbed(7));

        event(&mut app, Event::PlayheadChanged { t_tl: 0 });
        assert!(app.preview.is_none());
        event(&mut app, Event::PlayheadSettled { requested_tl: 5 });

        assert_eq!(
            command_rx.recv().expect("queued set playhead"),
            Command::SetPlayhead { t_tl: 0 }
        );
    }

    #[test]
    fn failed_open_keeps_the_current_selection() {
        let (mut app, command_rx) = loaded_at(10 * SECOND);
        let _ = app.update(Message::SetStartPressed);
        let _ = app.update(Message::OpenPicked(Some(PathBuf::from("broken.mp4"))));
        let _ = command_rx.recv().expect("open command");

        event(
            &mut app,
            Event::Error(EngineErrorEvent {
                kind: EngineErrorKind::Other,
                message: String::from("media duration is missing: broken.mp4"),
            }),
        );
        event(&mut app, Event::ProjectChanged(snapshot(60 * SECOND)));

        assert_eq!(
            (app.selection_start_tl, app.selection_end_tl),
            (10 * SECOND, 60 * SECOND)
        );
    }

    #[test]
    fn closing_while_idle_sends_no_shutdown() {
        let (mut app, command_rx) = loaded_at(0);

        let _ = app.update(Message::CloseRequested(window::Id::unique()));

        assert!(matches!(command_rx.try_recv(), Err(TryRecvError::Empty)));
        assert!(app.closing.is_none());
    }

    #[test]
    fn confirmed_quit_during_export_shuts_the_engine_down() {
        let (mut app, command_rx) = loaded_at(0);
        event(
            &mut app,
            Event::ExportStarted {
                path: PathBuf::from("out.mp4"),
                total_tl: 60 * SECOND,
            },
        );
        let id = window::Id::unique();

        let _ = app.update(Message::QuitConfirmed(id, true));

        assert_eq!(command_rx.recv().expect("shutdown"), Command::Shutdown);
        assert_eq!(app.closing, Some(id));

        event(
            &mut app,
            Event::Error(EngineErrorEvent {
                kind: EngineErrorKind::ExportFailed,
                message: String::from("export to out.mp4 failed: export aborted"),
            }),
        );
        assert!(!app.is_exporting());
    }

    #[test]
    fn declined_quit_keeps_the_export_running() {
        let (mut app, command_rx) = loaded_at(0);
        event(
            &mut app,
            Event::ExportStarted {
                path: PathBuf::from("out.mp4"),
                total_tl: 60 * SECOND,
            },
        );

        let _ = app.update(Message::QuitConfirmed(window::Id::unique(), false));

        assert!(matches!(command_rx.try_recv(), Err(TryRecvError::Empty)));
        assert!(app.is_exporting());
        assert!(app.closing.is_none());
    }

    #[test]
    fn project_closed_clears_preview_and_selection() {
        let (mut app, _command_rx) = loaded_at(0);
        event(
            &mut app,
            Event::PreviewFrameReady {
                t_tl: 0,
                frame: frame(),
            },
        );

        event(&mut app, Event::ProjectClosed);

        assert!(app.project.is_none());
        assert!(app.preview.is_none());
        assert_eq!(app.selection_end_tl, 0);
    }

    #[test]
    fn disconnected_bridge_drops_sender() {
        let (mut app, _command_rx) = app();

        let _ = app.update(Message::Bridge(BridgeEvent::Disconnected));
        let _ = app.update(Message::SplitPressed);

        assert_eq!(app.status, "engine is not ready");
    }
}
