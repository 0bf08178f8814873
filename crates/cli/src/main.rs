mod edit;

use std::error::Error;
use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use engine::export::ExportAudio;
use engine::{
    Command, EditorConfig, Engine, ExportPlan, ExportSettings, OutputContainer, format_timecode,
};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::edit::{RemoveRange, build_timeline, parse_range};

/// Command-line front end for the Splice editing engine.
#[derive(Parser, Debug)]
#[command(name = "splice-cli")]
#[command(version)]
#[command(about = "Cut and join videos through ffmpeg", long_about = None)]
struct Args {
    /// JSON config file; defaults to $SPLICE_CONFIG
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Prints the timeline built from the inputs as JSON
    Inspect {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Joins the inputs in order, drops ranges and renders the result
    Export {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[arg(short, long)]
        output: PathBuf,

        /// Range of the joined inputs to drop, e.g. 00:01:00-00:01:30; repeatable
        #[arg(long = "remove", value_name = "START-END", value_parser = parse_range)]
        remove: Vec<RemoveRange>,

        /// Audio file that replaces the clips' own audio
        #[arg(long)]
        audio: Option<PathBuf>,

        /// Used when the output path has no known extension
        #[arg(long, value_enum)]
        container: Option<ContainerArg>,

        /// Video bitrate in Mbps, snapped to 5..=60 in steps of 5
        #[arg(long)]
        bitrate: Option<u32>,

        /// Print the export plan without running ffmpeg
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ContainerArg {
    Webm,
    Mkv,
    Mp4,
}

impl From<ContainerArg> for OutputContainer {
    fn from(value: ContainerArg) -> Self {
        match value {
            ContainerArg::Webm => Self::Webm,
            ContainerArg::Mkv => Self::Mkv,
            ContainerArg::Mp4 => Self::Mp4,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let args = Args::parse();
    let config = EditorConfig::from_env(args.config.as_deref())?;
    let mut engine = Engine::new(config.media_backend());

    match args.command {
        CliCommand::Inspect { inputs } => {
            let snapshot = build_timeline(&mut engine, &inputs, &[], None)?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        CliCommand::Export {
            inputs,
            output,
            remove,
            audio,
            container,
            bitrate,
            dry_run,
        } => {
            let snapshot = build_timeline(&mut engine, &inputs, &remove, audio.as_deref())?;
            info!(
                clips = snapshot.clips.len(),
                duration = %format_timecode(snapshot.duration_tl),
                "timeline ready"
            );

            let mut settings = config.export;
            if let Some(container) = container {
                settings.container = container.into();
            }
            if let Some(mbps) = bitrate {
                settings = settings.with_bitrate(mbps);
            }

            engine.handle_command(Command::Export {
                path: output,
                settings,
            })?;
            let job = engine
                .take_export_job()
                .ok_or("export was not planned")?;

            if dry_run {
                println!("{}", serde_json::to_string_pretty(&plan_summary(job.plan(), settings))?);
                return Ok(());
            }

            let path = job.run(|done_tl, total_tl| {
                let percent = if total_tl > 0 { done_tl * 100 / total_tl } else { 0 };
                eprint!(
                    "\rexporting {} / {} ({percent}%)",
                    format_timecode(done_tl),
                    format_timecode(total_tl)
                );
                let _ = std::io::stderr().flush();
            })?;
            eprintln!();
            println!("{}", path.display());
        }
    }

    Ok(())
}

fn plan_summary(plan: &ExportPlan, settings: ExportSettings) -> serde_json::Value {
    let audio = match &plan.audio {
        ExportAudio::None => json!("none"),
        ExportAudio::Segments(audio) => json!({
            "source": "segments",
            "sample_rate": audio.sample_rate,
            "channels": audio.channels,
        }),
        ExportAudio::External { path } => json!({
            "source": "external",
            "path": path,
        }),
    };
    json!({
        "output": plan.output_path,
        "container": plan.container,
        "bitrate_mbps": settings.bitrate_mbps,
        "duration": format_timecode(plan.total_tl),
        "duration_tl": plan.total_tl,
        "frame_size": plan.frame_size,
        "inputs": plan.inputs,
        "segments": plan.segments.len(),
        "audio": audio,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use engine::OutputContainer;

    use super::{Args, CliCommand, ContainerArg};

    #[test]
    fn export_arguments_parse_with_repeated_ranges() {
        let args = Args::try_parse_from([
            "splice-cli",
            "export",
            "a.mp4",
            "b.mp4",
            "-o",
            "out.mkv",
            "--remove",
            "10-20",
            "--remove",
            "00:01:00-00:01:05",
            "--container",
            "mp4",
            "--bitrate",
            "40",
            "--dry-run",
        ])
        .expect("arguments parse");

        let CliCommand::Export {
            inputs,
            remove,
            container,
            bitrate,
            dry_run,
            ..
        } = args.command
        else {
            panic!("expected export subcommand");
        };
        assert_eq!(inputs.len(), 2);
        assert_eq!(remove.len(), 2);
        assert_eq!(remove[1].start_tl, 60_000_000);
        assert_eq!(container.map(OutputContainer::from), Some(OutputContainer::Mp4));
        assert_eq!(bitrate, Some(40));
        assert!(dry_run);
    }

    #[test]
    fn invalid_range_is_rejected_by_the_parser() {
        let result = Args::try_parse_from([
            "splice-cli",
            "export",
            "a.mp4",
            "-o",
            "out.webm",
            "--remove",
            "20-10",
        ]);

        assert!(result.is_err());
    }

    #[test]
    fn export_requires_an_output() {
        assert!(Args::try_parse_from(["splice-cli", "export", "a.mp4"]).is_err());
    }

    #[test]
    fn container_argument_maps_to_output_container() {
        assert_eq!(OutputContainer::from(ContainerArg::Webm), OutputContainer::Webm);
        assert_eq!(OutputContainer::from(ContainerArg::Mkv), OutputContainer::Mkv);
    }
}
