use std::ffi::OsString;
use std::fmt::{Display, Formatter};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MediaFfmpegError, Result};
use crate::time::Rational;
use crate::tools::{FfmpegTools, spawn_error, tool_command};

/// Output container; decides the codec pair and encoder flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputContainer {
    #[default]
    Webm,
    Mkv,
    Mp4,
}

impl OutputContainer {
    pub const ALL: [Self; 3] = [Self::Webm, Self::Mkv, Self::Mp4];

    /// Infers the container from a file extension, ignoring case.
    ///
    /// # Example
    /// ```
    /// use media_ffmpeg::OutputContainer;
    ///
    /// assert_eq!(OutputContainer::from_path("out.MP4"), Some(OutputContainer::Mp4));
    /// assert_eq!(OutputContainer::from_path("out.avi"), None);
    /// ```
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let extension = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "webm" => Some(Self::Webm),
            "mkv" => Some(Self::Mkv),
            "mp4" => Some(Self::Mp4),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Webm => "webm",
            Self::Mkv => "mkv",
            Self::Mp4 => "mp4",
        }
    }

    pub fn video_codec(self) -> &'static str {
        match self {
            Self::Webm | Self::Mkv => "libvpx-vp9",
            Self::Mp4 => "libx264",
        }
    }

    pub fn audio_codec(self) -> &'static str {
        match self {
            Self::Webm | Self::Mkv => "libopus",
            Self::Mp4 => "aac",
        }
    }

    /// Opus only encodes at 48 kHz; AAC keeps the source rate.
    pub fn audio_sample_rate(self, preferred: u32) -> u32 {
        match self {
            Self::Webm | Self::Mkv => 48_000,
            Self::Mp4 => preferred,
        }
    }

    fn video_args(self, bitrate_mbps: u32) -> Vec<String> {
        let mut args = vec![
            "-c:v".to_string(),
            self.video_codec().to_string(),
            "-b:v".to_string(),
            format!("{bitrate_mbps}M"),
            "-maxrate".to_string(),
            format!("{}M", bitrate_mbps + 5),
            "-bufsize".to_string(),
            format!("{}M", bitrate_mbps * 2),
        ];
        let tuning: &[&str] = match self {
            Self::Webm | Self::Mkv => &["-crf", "30", "-deadline", "realtime", "-cpu-used", "4"],
            Self::Mp4 => &["-preset", "medium", "-pix_fmt", "yuv420p"],
        };
        args.extend(tuning.iter().map(|arg| arg.to_string()));
        args
    }
}

impl Display for OutputContainer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Webm => write!(f, "WebM (VP9/Opus)"),
            Self::Mkv => write!(f, "MKV (VP9/Opus)"),
            Self::Mp4 => write!(f, "MP4 (H.264/AAC)"),
        }
    }
}

/// Pixel dimensions of a video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

/// Audio output settings used when source audio is concatenated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioExportSettings {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Where the exported audio track comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportAudio {
    /// Video-only output.
    None,
    /// Trim each segment's own audio alongside its video.
    Segments(AudioExportSettings),
    /// Replace all source audio with one external file, cut to the video length.
    External { path: PathBuf },
}

/// One segment to trim and concatenate into the output stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSegment {
    pub input_index: usize,
    pub src_in_video: i64,
    pub src_out_video: i64,
    pub video_time_base: Rational,
    pub frame_size: FrameSize,
    pub src_in_audio: Option<i64>,
    pub src_out_audio: Option<i64>,
    pub audio_time_base: Option<Rational>,
}

/// Request payload for an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    pub inputs: Vec<PathBuf>,
    pub segments: Vec<ExportSegment>,
    pub audio: ExportAudio,
    pub frame_size: FrameSize,
    pub container: OutputContainer,
    pub bitrate_mbps: u32,
    pub output_path: PathBuf,
}

/// Stop switch shared with a running [`export_video`].
///
/// Once raised it stays raised: the running `ffmpeg` is killed at its next
/// progress report and later exports fail before spawning anything.
#[derive(Debug, Clone, Default)]
pub struct ExportAbort(Arc<AtomicBool>);

impl ExportAbort {
    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Exports segments into one file by decode -> trim -> concat -> re-encode.
///
/// `on_progress` receives the encoded output position in microseconds as
/// reported by `ffmpeg -progress`. Raising `abort` kills the child process
/// and yields [`MediaFfmpegError::ExportAborted`].
pub fn export_video(
    tools: &FfmpegTools,
    request: &ExportRequest,
    abort: &ExportAbort,
    mut on_progress: impl FnMut(i64),
) -> Result<()> {
    validate_request(request)?;
    if abort.is_raised() {
        return Err(MediaFfmpegError::ExportAborted);
    }
    let args = build_args(request);
    debug!(
        output = %request.output_path.display(),
        segments = request.segments.len(),
        inputs = request.inputs.len(),
        "starting ffmpeg export"
    );

    let mut child = tool_command(&tools.ffmpeg)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| spawn_error("ffmpeg", &tools.ffmpeg, "run ffmpeg export", source))?;

    let stderr = child.stderr.take();
    let stderr_reader = thread::spawn(move || {
        let mut buffer = String::new();
        if let Some(mut stderr) = stderr {
            let _ = stderr.read_to_string(&mut buffer);
        }
        buffer
    });

    if let Some(stdout) = child.stdout.take() {
        for line in BufReader::new(stdout).lines() {
            let Ok(line) = line else {
                break;
            };
            if abort.is_raised() {
                break;
            }
            if let Some(out_time_us) = parse_progress_line(&line) {
                on_progress(out_time_us);
            }
        }
    }

    if abort.is_raised() {
        let _ = child.kill();
        let _ = child.wait();
        let _ = stderr_reader.join();
        debug!(output = %request.output_path.display(), "ffmpeg export killed");
        return Err(MediaFfmpegError::ExportAborted);
    }

    let status = child.wait().map_err(|source| MediaFfmpegError::Io {
        context: "wait for ffmpeg export",
        source,
    })?;
    let stderr = stderr_reader.join().unwrap_or_default();

    if !status.success() {
        return Err(MediaFfmpegError::CommandFailed {
            command: command_for_display(request),
            status,
            stderr,
        });
    }
    Ok(())
}

fn build_args(request: &ExportRequest) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-hide_banner",
        "-v",
        "error",
        "-nostats",
        "-progress",
        "pipe:1",
        "-y",
        "-copyts",
    ]
    .into_iter()
    .map(OsString::from)
    .collect();

    for input in &request.inputs {
        args.push("-i".into());
        args.push(input.clone().into_os_string());
    }
    if let ExportAudio::External { path } = &request.audio {
        args.push("-i".into());
        args.push(path.clone().into_os_string());
    }

    let single = request.segments.len() == 1;
    args.push("-filter_complex".into());
    args.push(build_filter_complex(request).into());
    args.push("-map".into());
    args.push(if single { "[v0]" } else { "[vout]" }.into());

    match &request.audio {
        ExportAudio::None => args.push("-an".into()),
        ExportAudio::Segments(_) => {
            args.push("-map".into());
            args.push(if single { "[a0]" } else { "[aout]" }.into());
        }
        ExportAudio::External { .. } => {
            args.push("-map".into());
            args.push(format!("{}:a:0", request.inputs.len()).into());
        }
    }

    args.extend(
        request
            .container
            .video_args(request.bitrate_mbps)
            .into_iter()
            .map(OsString::from),
    );
    if request.audio != ExportAudio::None {
        args.push("-c:a".into());
        args.push(request.container.audio_codec().into());
    }
    if matches!(request.audio, ExportAudio::External { .. }) {
        args.push("-shortest".into());
    }

    args.push(request.output_path.clone().into_os_string());
    args
}

fn build_filter_complex(request: &ExportRequest) -> String {
    let segment_audio = match request.audio {
        ExportAudio::Segments(settings) => Some(settings),
        _ => None,
    };
    let output = request.frame_size;

    let mut chains = Vec::<String>::with_capacity(request.segments.len() * 2 + 1);
    for (index, segment) in request.segments.iter().enumerate() {
        let mut video_chain = format!(
            "[{}:v:0]settb={},trim=start_pts={}:end_pts={},setpts=PTS-STARTPTS",
            segment.input_index, segment.video_time_base, segment.src_in_video, segment.src_out_video,
        );
        if segment.frame_size != output {
            video_chain.push_str(&format!(
                ",scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1",
                w = output.width,
                h = output.height
            ));
        }
        video_chain.push_str(&format!("[v{index}]"));
        chains.push(video_chain);

        if let (Some(settings), Some(audio_tb), Some(src_in), Some(src_out)) = (
            segment_audio,
            segment.audio_time_base,
            segment.src_in_audio,
            segment.src_out_audio,
        ) {
            let sample_rate = request.container.audio_sample_rate(settings.sample_rate);
            let layout = channel_layout_for_channels(settings.channels).unwrap_or("stereo");
            chains.push(format!(
                "[{}:a:0]asettb={audio_tb},atrim=start_pts={src_in}:end_pts={src_out},asetpts=PTS-STARTPTS,aresample={sample_rate}:async=1:first_pts=0,aformat=sample_rates={sample_rate}:channel_layouts={layout}[a{index}]",
                segment.input_index,
            ));
        }
    }

    if request.segments.len() > 1 {
        let mut concat_inputs = String::new();
        for index in 0..request.segments.len() {
            if segment_audio.is_some() {
                concat_inputs.push_str(&format!("[v{index}][a{index}]"));
            } else {
                concat_inputs.push_str(&format!("[v{index}]"));
            }
        }
        if segment_audio.is_some() {
            chains.push(format!(
                "{concat_inputs}concat=n={}:v=1:a=1[vout][aout]",
                request.segments.len()
            ));
        } else {
            chains.push(format!(
                "{concat_inputs}concat=n={}:v=1:a=0[vout]",
                request.segments.len()
            ));
        }
    }

    chains.join(";")
}

/// Extracts the output position from one `-progress` line.
fn parse_progress_line(line: &str) -> Option<i64> {
    let (key, value) = line.trim().split_once('=')?;
    // `out_time_ms` is also microseconds, a long-standing ffmpeg quirk.
    if key != "out_time_us" && key != "out_time_ms" {
        return None;
    }
    value.parse::<i64>().ok().map(|value| value.max(0))
}

fn validate_request(request: &ExportRequest) -> Result<()> {
    if request.inputs.is_empty() {
        return Err(MediaFfmpegError::InvalidExportRequest {
            reason: "export inputs are empty",
        });
    }
    if request.segments.is_empty() {
        return Err(MediaFfmpegError::InvalidExportRequest {
            reason: "export segments are empty",
        });
    }
    if request.frame_size.width == 0 || request.frame_size.height == 0 {
        return Err(MediaFfmpegError::InvalidExportRequest {
            reason: "output frame size must be positive",
        });
    }
    if request.bitrate_mbps == 0 {
        return Err(MediaFfmpegError::InvalidExportRequest {
            reason: "bitrate must be positive",
        });
    }

    match &request.audio {
        ExportAudio::None => {}
        ExportAudio::External { path } => {
            if path.as_os_str().is_empty() {
                return Err(MediaFfmpegError::InvalidExportRequest {
                    reason: "external audio path is empty",
                });
            }
        }
        ExportAudio::Segments(audio) => {
            if audio.sample_rate == 0 {
                return Err(MediaFfmpegError::InvalidExportRequest {
                    reason: "audio sample rate must be positive",
                });
            }
            if channel_layout_for_channels(audio.channels).is_none() {
                return Err(MediaFfmpegError::InvalidExportRequest {
                    reason: "audio channel layout is unsupported",
                });
            }
        }
    }

    for segment in &request.segments {
        if segment.input_index >= request.inputs.len() {
            return Err(MediaFfmpegError::InvalidExportRequest {
                reason: "segment input index is out of range",
            });
        }
        if segment.src_out_video <= segment.src_in_video {
            return Err(MediaFfmpegError::InvalidExportRequest {
                reason: "segment source range is not positive",
            });
        }
        if matches!(request.audio, ExportAudio::Segments(_)) {
            let (Some(src_in_audio), Some(src_out_audio)) =
                (segment.src_in_audio, segment.src_out_audio)
            else {
                return Err(MediaFfmpegError::InvalidExportRequest {
                    reason: "audio range is missing",
                });
            };
            if segment.audio_time_base.is_none() {
                return Err(MediaFfmpegError::InvalidExportRequest {
                    reason: "audio time base is missing",
                });
            }
            if src_out_audio <= src_in_audio {
                return Err(MediaFfmpegError::InvalidExportRequest {
                    reason: "audio source range is not positive",
                });
            }
        }
    }

    Ok(())
}

fn command_for_display(request: &ExportRequest) -> String {
    format!("ffmpeg export {}", request.output_path.display())
}

fn channel_layout_for_channels(channels: u16) -> Option<&'static str> {
    match channels {
        1 => Some("mono"),
        2 => Some("stereo"),
        3 => Some("2.1"),
        4 => Some("quad"),
        5 => Some("5.0"),
        6 => Some("5.1"),
        7 => Some("6.1"),
        8 => Some("7.1"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{
        AudioExportSettings, ExportAbort, ExportAudio, ExportRequest, ExportSegment, FrameSize,
        OutputContainer, build_args, build_filter_complex, export_video, parse_progress_line,
        validate_request,
    };
    use crate::{FfmpegTools, MediaFfmpegError, Rational};

    const UHD: FrameSize = FrameSize {
        width: 3840,
        height: 2160,
    };

    fn video_segment(input_index: usize, src_in: i64, src_out: i64) -> ExportSegment {
        ExportSegment {
            input_index,
            src_in_video: src_in,
            src_out_video: src_out,
            video_time_base: Rational::new(1, 90_000).expect("valid"),
            frame_size: UHD,
            src_in_audio: None,
            src_out_audio: None,
            audio_time_base: None,
        }
    }

    fn with_audio(mut segment: ExportSegment, src_in: i64, src_out: i64) -> ExportSegment {
        segment.src_in_audio = Some(src_in);
        segment.src_out_audio = Some(src_out);
        segment.audio_time_base = Some(Rational::new(1, 48_000).expect("valid"));
        segment
    }

    fn request(segments: Vec<ExportSegment>, audio: ExportAudio) -> ExportRequest {
        ExportRequest {
            inputs: vec![PathBuf::from("a.mp4"), PathBuf::from("b.mp4")],
            segments,
            audio,
            frame_size: UHD,
            container: OutputContainer::Mp4,
            bitrate_mbps: 25,
            output_path: PathBuf::from("out.mp4"),
        }
    }

    fn args_as_strings(request: &ExportRequest) -> Vec<String> {
        build_args(request)
            .into_iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn filter_complex_trims_and_concats_video_only_segments() {
        let request = request(
            vec![video_segment(0, 90_000, 120_000), video_segment(1, 0, 45_000)],
            ExportAudio::None,
        );

        assert_eq!(
            build_filter_complex(&request),
            "[0:v:0]settb=1/90000,trim=start_pts=90000:end_pts=120000,setpts=PTS-STARTPTS[v0];\
[1:v:0]settb=1/90000,trim=start_pts=0:end_pts=45000,setpts=PTS-STARTPTS[v1];\
[v0][v1]concat=n=2:v=1:a=0[vout]"
        );
    }

    #[test]
    fn filter_complex_scales_segments_with_a_different_frame_size() {
        let mut small = video_segment(1, 0, 45_000);
        small.frame_size = FrameSize {
            width: 1920,
            height: 1080,
        };
        let request = request(vec![video_segment(0, 0, 90_000), small], ExportAudio::None);

        let filter = build_filter_complex(&request);
        assert!(filter.contains(
            "setpts=PTS-STARTPTS,scale=3840:2160:force_original_aspect_ratio=decrease,pad=3840:2160:(ow-iw)/2:(oh-ih)/2,setsar=1[v1]"
        ));
        assert!(filter.starts_with(
            "[0:v:0]settb=1/90000,trim=start_pts=0:end_pts=90000,setpts=PTS-STARTPTS[v0]"
        ));
    }

    #[test]
    fn filter_complex_with_segment_audio_uses_av_concat() {
        let request = request(
            vec![
                with_audio(video_segment(0, 90_000, 120_000), 48_000, 64_000),
                with_audio(video_segment(0, 120_000, 198_000), 64_000, 105_600),
            ],
            ExportAudio::Segments(AudioExportSettings {
                sample_rate: 44_100,
                channels: 2,
            }),
        );

        assert_eq!(
            build_filter_complex(&request),
            "[0:v:0]settb=1/90000,trim=start_pts=90000:end_pts=120000,setpts=PTS-STARTPTS[v0];\
[0:a:0]asettb=1/48000,atrim=start_pts=48000:end_pts=64000,asetpts=PTS-STARTPTS,aresample=44100:async=1:first_pts=0,aformat=sample_rates=44100:channel_layouts=stereo[a0];\
[0:v:0]settb=1/90000,trim=start_pts=120000:end_pts=198000,setpts=PTS-STARTPTS[v1];\
[0:a:0]asettb=1/48000,atrim=start_pts=64000:end_pts=105600,asetpts=PTS-STARTPTS,aresample=44100:async=1:first_pts=0,aformat=sample_rates=44100:channel_layouts=stereo[a1];\
[v0][a0][v1][a1]concat=n=2:v=1:a=1[vout][aout]"
        );
    }

    #[test]
    fn opus_containers_force_48k_audio() {
        let mut request = request(
            vec![with_audio(video_segment(0, 0, 90_000), 0, 44_100)],
            ExportAudio::Segments(AudioExportSettings {
                sample_rate: 44_100,
                channels: 1,
            }),
        );
        request.container = OutputContainer::Webm;

        let filter = build_filter_complex(&request);
        assert!(filter.contains("aresample=48000:async=1:first_pts=0"));
        assert!(filter.contains("channel_layouts=mono[a0]"));
    }

    #[test]
    fn external_audio_is_mapped_from_the_last_input_with_shortest() {
        let request = request(
            vec![video_segment(0, 0, 90_000), video_segment(1, 0, 90_000)],
            ExportAudio::External {
                path: PathBuf::from("music.mp3"),
            },
        );

        let args = args_as_strings(&request);
        let inputs: Vec<&str> = args
            .windows(2)
            .filter(|pair| pair[0] == "-i")
            .map(|pair| pair[1].as_str())
            .collect();
        assert_eq!(inputs, vec!["a.mp4", "b.mp4", "music.mp3"]);

        let maps: Vec<&str> = args
            .windows(2)
            .filter(|pair| pair[0] == "-map")
            .map(|pair| pair[1].as_str())
            .collect();
        assert_eq!(maps, vec!["[vout]", "2:a:0"]);
        assert!(args.contains(&"-shortest".to_string()));
        assert!(!build_filter_complex(&request).contains("atrim"));
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
    }

    #[test]
    fn mp4_uses_h264_with_rate_control_from_bitrate() {
        let request = request(vec![video_segment(0, 0, 90_000)], ExportAudio::None);

        let args = args_as_strings(&request).join(" ");
        assert!(args.contains(
            "-c:v libx264 -b:v 25M -maxrate 30M -bufsize 50M -preset medium -pix_fmt yuv420p"
        ));
        assert!(args.contains("-map [v0] -an"));
        assert!(!args.contains("-c:a"));
    }

    #[test]
    fn vp9_containers_use_constrained_quality_flags() {
        let mut request = request(
            vec![with_audio(video_segment(0, 0, 90_000), 0, 48_000)],
            ExportAudio::Segments(AudioExportSettings {
                sample_rate: 48_000,
                channels: 2,
            }),
        );
        request.container = OutputContainer::Mkv;
        request.bitrate_mbps = 40;

        let args = args_as_strings(&request).join(" ");
        assert!(args.contains(
            "-c:v libvpx-vp9 -b:v 40M -maxrate 45M -bufsize 80M -crf 30 -deadline realtime -cpu-used 4"
        ));
        assert!(args.contains("-c:a libopus"));
    }

    #[test]
    fn progress_lines_report_out_time_in_microseconds() {
        assert_eq!(parse_progress_line("out_time_us=1500000"), Some(1_500_000));
        assert_eq!(parse_progress_line("out_time_ms=250"), Some(250));
        assert_eq!(parse_progress_line("out_time_us=N/A"), None);
        assert_eq!(parse_progress_line("frame=12"), None);
        assert_eq!(parse_progress_line("progress=end"), None);
    }

    #[test]
    fn container_is_inferred_from_extension() {
        assert_eq!(
            OutputContainer::from_path("clip.WebM"),
            Some(OutputContainer::Webm)
        );
        assert_eq!(OutputContainer::from_path("clip"), None);
    }

    #[test]
    fn validate_request_rejects_unsupported_audio_channel_layout() {
        let request = request(
            vec![with_audio(video_segment(0, 0, 90_000), 0, 48_000)],
            ExportAudio::Segments(AudioExportSettings {
                sample_rate: 48_000,
                channels: 9,
            }),
        );

        assert!(matches!(
            validate_request(&request),
            Err(MediaFfmpegError::InvalidExportRequest {
                reason: "audio channel layout is unsupported"
            })
        ));
    }

    #[test]
    fn validate_request_rejects_segment_audio_without_ranges() {
        let request = request(
            vec![video_segment(0, 0, 90_000)],
            ExportAudio::Segments(AudioExportSettings {
                sample_rate: 48_000,
                channels: 2,
            }),
        );

        assert!(matches!(
            validate_request(&request),
            Err(MediaFfmpegError::InvalidExportRequest {
                reason: "audio range is missing"
            })
        ));
    }

    #[test]
    fn raised_abort_fails_before_spawning_ffmpeg() {
        let tools = FfmpegTools::new("splice-missing-ffmpeg", "splice-missing-ffprobe");
        let abort = ExportAbort::default();
        let shared = abort.clone();
        shared.raise();
        let mut progress_calls = 0;

        let result = export_video(
            &tools,
            &request(vec![video_segment(0, 0, 90_000)], ExportAudio::None),
            &abort,
            |_| progress_calls += 1,
        );

        assert!(abort.is_raised());
        assert!(matches!(result, Err(MediaFfmpegError::ExportAborted)));
        assert_eq!(progress_calls, 0);
    }
}
