use std::path::{Path, PathBuf};

use engine::time::parse_timecode;
use engine::{Command, Engine, EngineError, MediaBackend, ProjectSnapshot};
use tracing::debug;

/// Output range to drop, in ticks of the joined inputs before any cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveRange {
    pub start_tl: i64,
    pub end_tl: i64,
}

/// Parses `START-END`, each side a timecode accepted by [`parse_timecode`].
pub fn parse_range(input: &str) -> Result<RemoveRange, String> {
    let (start, end) = input
        .split_once('-')
        .ok_or_else(|| format!("expected START-END, got `{input}`"))?;
    let start_tl =
        parse_timecode(start).ok_or_else(|| format!("invalid start timecode `{start}`"))?;
    let end_tl = parse_timecode(end).ok_or_else(|| format!("invalid end timecode `{end}`"))?;
    if end_tl <= start_tl {
        return Err(format!("range `{input}` ends before it starts"));
    }
    Ok(RemoveRange { start_tl, end_tl })
}

/// Sorts ranges and joins the ones that overlap or touch.
pub fn merge_ranges(mut ranges: Vec<RemoveRange>) -> Vec<RemoveRange> {
    ranges.sort_by_key(|range| (range.start_tl, range.end_tl));
    let mut merged: Vec<RemoveRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if range.start_tl <= last.end_tl => {
                last.end_tl = last.end_tl.max(range.end_tl);
            }
            _ => merged.push(range),
        }
    }
    merged
}

/// Loads `inputs` in order, applies the cuts and the audio override.
///
/// Ranges are applied from the last to the first so every range keeps the
/// coordinates it was written in.
pub fn build_timeline<M>(
    engine: &mut Engine<M>,
    inputs: &[PathBuf],
    ranges: &[RemoveRange],
    audio: Option<&Path>,
) -> engine::Result<ProjectSnapshot>
where
    M: MediaBackend + Clone,
{
    let Some((first, rest)) = inputs.split_first() else {
        return Err(EngineError::ProjectNotLoaded);
    };
    engine.handle_command(Command::Open {
        path: first.clone(),
    })?;
    for path in rest {
        engine.handle_command(Command::Append { path: path.clone() })?;
    }

    for range in merge_ranges(ranges.to_vec()).into_iter().rev() {
        debug!(start_tl = range.start_tl, end_tl = range.end_tl, "applying cut");
        engine.handle_command(Command::RemoveRange {
            start_tl: range.start_tl,
            end_tl: range.end_tl,
        })?;
    }

    if let Some(path) = audio {
        engine.handle_command(Command::SetAudioOverride {
            path: path.to_path_buf(),
        })?;
    }

    engine
        .project()
        .map(|project| project.snapshot())
        .ok_or(EngineError::ProjectNotLoaded)
}
