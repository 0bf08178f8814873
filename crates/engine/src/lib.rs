//! UI-agnostic editing engine for the Splice video editor.

pub mod api;
pub mod config;
pub mod error;
pub mod export;
pub mod preview;
pub mod project;
pub mod time;
pub mod timeline;
pub mod worker;

pub use api::{
    ClipSummary, Command, Engine, EngineErrorEvent, EngineErrorKind, Event, ExportJob,
    ProjectSnapshot, SegmentSummary,
};
pub use config::EditorConfig;
pub use error::{EngineError, Result};
pub use export::{ExportPlan, ExportSettings, build_export_plan};
pub use media_ffmpeg::OutputContainer;
pub use preview::{
    FfmpegMediaBackend, MediaBackend, PreviewFrame, ProbedAudioStream, ProbedMedia,
    ProbedVideoStream,
};
pub use time::{Rational, TIMELINE_TIME_BASE, format_timecode, rescale};
pub use worker::{EngineCommandSender, EngineEventReceiver, spawn_engine_worker};
