//! Thin wrappers over the `ffmpeg` and `ffprobe` command-line tools.

mod decode;
mod error;
mod mux;
mod probe;
mod time;
mod tools;

pub use decode::{DecodedVideoFrame, decode_video_frame_near_seconds};
pub use error::{MediaFfmpegError, Result};
pub use mux::{
    AudioExportSettings, ExportAbort, ExportAudio, ExportRequest, ExportSegment, FrameSize, OutputContainer,
    export_video,
};
pub use probe::{MediaInfo, StreamInfo, StreamKind, probe_media};
pub use time::{Rational, rescale};
pub use tools::FfmpegTools;
