use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Opaque identifier for timeline segments.
pub type SegmentId = u64;
/// Opaque identifier for source clips.
pub type ClipId = u64;

/// Single-track virtual timeline.
///
/// Segments keep their order forever; a removed segment stays in the list
/// with `kept == false` and occupies no output time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    pub segments: Vec<Segment>,
}

/// A half-open interval `[src_start, src_end)` of one source clip, in
/// timeline ticks relative to the clip start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub id: SegmentId,
    pub clip_id: ClipId,
    pub src_start: i64,
    pub src_end: i64,
    pub kept: bool,
}

impl Segment {
    pub fn duration_tl(&self) -> i64 {
        self.src_end - self.src_start
    }
}

impl Timeline {
    /// Returns output duration: the sum of kept segment durations.
    pub fn duration_tl(&self) -> i64 {
        self.segments
            .iter()
            .filter(|segment| segment.kept)
            .map(Segment::duration_tl)
            .sum()
    }

    /// Iterates kept segments with their output start position.
    ///
    /// # Example
    /// ```
    /// use engine::timeline::Timeline;
    ///
    /// let mut timeline = Timeline::default();
    /// timeline.append_clip(1, 3_000_000, 1);
    /// timeline.append_clip(2, 2_000_000, 2);
    ///
    /// let starts: Vec<i64> = timeline.kept_segments().map(|(start, _)| start).collect();
    /// assert_eq!(starts, vec![0, 3_000_000]);
    /// ```
    pub fn kept_segments(&self) -> impl Iterator<Item = (i64, &Segment)> + '_ {
        self.segments
            .iter()
            .filter(|segment| segment.kept)
            .scan(0_i64, |offset, segment| {
                let start = *offset;
                *offset += segment.duration_tl();
                Some((start, segment))
            })
    }

    /// Finds the kept segment covering `t_tl`.
    ///
    /// Returns the segment index and the source offset (clip-relative ticks)
    /// that `t_tl` maps to.
    pub fn locate(&self, t_tl: i64) -> Option<(usize, i64)> {
        if t_tl < 0 {
            return None;
        }

        let mut offset = 0_i64;
        for (index, segment) in self.segments.iter().enumerate() {
            if !segment.kept {
                continue;
            }
            let end = offset + segment.duration_tl();
            if offset <= t_tl && t_tl < end {
                return Some((index, segment.src_start + (t_tl - offset)));
            }
            offset = end;
        }
        None
    }

    /// Appends one kept segment covering a whole clip.
    ///
    /// Existing segments are left untouched.
    pub fn append_clip(&mut self, clip_id: ClipId, duration_tl: i64, segment_id: SegmentId) {
        self.segments.push(Segment {
            id: segment_id,
            clip_id,
            src_start: 0,
            src_end: duration_tl.max(1),
            kept: true,
        });
    }

    /// Splits the kept segment containing output position `at_tl`.
    ///
    /// Returns an error when `at_tl` is a kept-segment boundary or lies
    /// outside the timeline.
    ///
    /// # Example
    /// ```
    /// use engine::timeline::Timeline;
    ///
    /// let mut timeline = Timeline::default();
    /// timeline.append_clip(7, 1_000_000, 1);
    ///
    /// timeline.split_at(400_000, 2).expect("split inside the clip");
    /// assert_eq!(timeline.segments.len(), 2);
    /// assert_eq!(timeline.segments[1].src_start, 400_000);
    /// assert!(timeline.split_at(400_000, 3).is_err());
    /// ```
    pub fn split_at(&mut self, at_tl: i64, next_segment_id: SegmentId) -> Result<()> {
        if self.is_boundary_split_point(at_tl) {
            warn!(at_tl, "split rejected: boundary point");
            return Err(EngineError::SplitPointAtBoundary { at_tl });
        }

        let Some((index, split_src)) = self.locate(at_tl) else {
            warn!(at_tl, "split rejected: segment not found");
            return Err(EngineError::SegmentNotFound { at_tl });
        };

        let current = self.segments[index].clone();
        let right = Segment {
            id: next_segment_id,
            src_start: split_src,
            ..current.clone()
        };
        self.segments[index].src_end = split_src;
        self.segments.insert(index + 1, right);

        debug!(
            at_tl,
            segment_id = current.id,
            clip_id = current.clip_id,
            next_segment_id,
            split_src,
            "split accepted"
        );
        Ok(())
    }

    /// Marks the output range `[start_tl, end_tl)` as removed.
    ///
    /// Kept segments fully inside the range are flagged removed; partially
    /// covered ones are split into kept and removed pieces, new pieces taking
    /// ids from `next_segment_id`. The range is clamped to the current
    /// duration. Returns the removed duration in ticks.
    ///
    /// # Example
    /// ```
    /// use engine::timeline::Timeline;
    ///
    /// let mut timeline = Timeline::default();
    /// timeline.append_clip(1, 60_000_000, 1);
    ///
    /// let mut next = 2;
    /// let removed = timeline
    ///     .remove_range(10_000_000, 20_000_000, &mut || {
    ///         next += 1;
    ///         next - 1
    ///     })
    ///     .expect("range is valid");
    /// assert_eq!(removed, 10_000_000);
    /// assert_eq!(timeline.duration_tl(), 50_000_000);
    /// ```
    pub fn remove_range(
        &mut self,
        start_tl: i64,
        end_tl: i64,
        next_segment_id: &mut impl FnMut() -> SegmentId,
    ) -> Result<i64> {
        if end_tl <= start_tl {
            warn!(start_tl, end_tl, "remove rejected: empty or inverted range");
            return Err(EngineError::InvalidRange { start_tl, end_tl });
        }

        let duration = self.duration_tl();
        let start = start_tl.clamp(0, duration);
        let end = end_tl.clamp(0, duration);
        if start == end {
            debug!(start_tl, end_tl, duration, "remove range is outside the timeline");
            return Ok(0);
        }

        let mut segments = Vec::with_capacity(self.segments.len() + 2);
        let mut offset = 0_i64;
        let mut removed = 0_i64;

        for segment in std::mem::take(&mut self.segments) {
            if !segment.kept {
                segments.push(segment);
                continue;
            }

            let seg_start = offset;
            let seg_end = offset + segment.duration_tl();
            offset = seg_end;

            let cut_start = start.max(seg_start);
            let cut_end = end.min(seg_end);
            if cut_start >= cut_end {
                segments.push(segment);
                continue;
            }
            removed += cut_end - cut_start;

            let local_start = segment.src_start + (cut_start - seg_start);
            let local_end = segment.src_start + (cut_end - seg_start);
            let pieces: Vec<(i64, i64, bool)> = [
                (segment.src_start, local_start, true),
                (local_start, local_end, false),
                (local_end, segment.src_end, true),
            ]
            .into_iter()
            .filter(|(src_start, src_end, _)| src_start < src_end)
            .collect();

            // The existing id stays with the first kept piece.
            let owner = pieces.iter().position(|(_, _, kept)| *kept).unwrap_or(0);
            for (index, (src_start, src_end, kept)) in pieces.into_iter().enumerate() {
                let id = if index == owner {
                    segment.id
                } else {
                    next_segment_id()
                };
                segments.push(Segment {
                    id,
                    clip_id: segment.clip_id,
                    src_start,
                    src_end,
                    kept,
                });
            }
        }

        self.segments = segments;
        self.coalesce_removed();

        debug!(
            start_tl = start,
            end_tl = end,
            removed,
            segment_count = self.segments.len(),
            "remove range accepted"
        );
        Ok(removed)
    }

    /// Removes or restores one segment by id.
    pub fn set_kept(&mut self, segment_id: SegmentId, kept: bool) -> Result<()> {
        let segment = self
            .segments
            .iter_mut()
            .find(|segment| segment.id == segment_id)
            .ok_or(EngineError::SegmentIdNotFound { segment_id })?;
        segment.kept = kept;
        debug!(segment_id, kept, "segment status changed");
        Ok(())
    }

    /// Deletes every segment of `clip_id`; returns how many were deleted.
    pub fn remove_clip(&mut self, clip_id: ClipId) -> usize {
        let before = self.segments.len();
        self.segments.retain(|segment| segment.clip_id != clip_id);
        before - self.segments.len()
    }

    fn is_boundary_split_point(&self, at_tl: i64) -> bool {
        self.kept_segments().any(|(start, segment)| {
            at_tl == start || at_tl == start + segment.duration_tl()
        })
    }

    // Kept neighbours are left alone so explicit splits survive.
    fn coalesce_removed(&mut self) {
        let mut merged: Vec<Segment> = Vec::with_capacity(self.segments.len());
        for segment in std::mem::take(&mut self.segments) {
            if let Some(previous) = merged.last_mut() {
                if !previous.kept
                    && !segment.kept
                    && previous.clip_id == segment.clip_id
                    && previous.src_end == segment.src_start
                {
                    previous.src_end = segment.src_end;
                    continue;
                }
            }
            merged.push(segment);
        }
        self.segments = merged;
    }
}

#[cfg(test)]
mod tests {
    use super::{Segment, Timeline};
    use crate::error::EngineError;

    fn segment(id: u64, clip_id: u64, src_start: i64, src_end: i64, kept: bool) -> Segment {
        Segment {
            id,
            clip_id,
            src_start,
            src_end,
            kept,
        }
    }

    fn ids(timeline: &Timeline) -> Vec<u64> {
        timeline.segments.iter().map(|segment| segment.id).collect()
    }

    fn counter(start: u64) -> impl FnMut() -> u64 {
        let mut next = start;
        move || {
            let id = next;
            next += 1;
            id
        }
    }

    #[test]
    fn split_at_timeline_end_is_reported_as_boundary() {
        let mut timeline = Timeline {
            segments: vec![segment(1, 1, 0, 1_000, true)],
        };

        let result = timeline.split_at(1_000, 2);
        assert!(matches!(
            result,
            Err(EngineError::SplitPointAtBoundary { at_tl: 1_000 })
        ));
    }

    #[test]
    fn split_past_end_is_segment_not_found() {
        let mut timeline = Timeline {
            segments: vec![segment(1, 1, 0, 1_000, true)],
        };

        let result = timeline.split_at(5_000, 2);
        assert!(matches!(
            result,
            Err(EngineError::SegmentNotFound { at_tl: 5_000 })
        ));
    }

    #[test]
    fn split_maps_output_position_through_removed_segments() {
        let mut timeline = Timeline {
            segments: vec![
                segment(1, 1, 0, 100, true),
                segment(2, 1, 100, 200, false),
                segment(3, 1, 200, 300, true),
            ],
        };

        timeline.split_at(150, 4).expect("split should succeed");

        assert_eq!(ids(&timeline), vec![1, 2, 3, 4]);
        assert_eq!(timeline.segments[2], segment(3, 1, 200, 250, true));
        assert_eq!(timeline.segments[3], segment(4, 1, 250, 300, true));
        assert_eq!(timeline.duration_tl(), 200);
    }

    #[test]
    fn locate_skips_removed_segments_and_is_half_open() {
        let timeline = Timeline {
            segments: vec![
                segment(1, 1, 0, 100, true),
                segment(2, 1, 100, 200, false),
                segment(3, 2, 0, 50, true),
            ],
        };

        assert_eq!(timeline.locate(0), Some((0, 0)));
        assert_eq!(timeline.locate(99), Some((0, 99)));
        assert_eq!(timeline.locate(100), Some((2, 0)));
        assert_eq!(timeline.locate(149), Some((2, 49)));
        assert_eq!(timeline.locate(150), None);
        assert_eq!(timeline.locate(-1), None);
    }

    #[test]
    fn remove_range_inside_one_segment_creates_three_pieces() {
        let mut timeline = Timeline {
            segments: vec![segment(1, 1, 0, 600, true)],
        };

        let removed = timeline
            .remove_range(100, 200, &mut counter(2))
            .expect("remove should succeed");

        assert_eq!(removed, 100);
        assert_eq!(
            timeline.segments,
            vec![
                segment(1, 1, 0, 100, true),
                segment(2, 1, 100, 200, false),
                segment(3, 1, 200, 600, true),
            ]
        );
        assert_eq!(timeline.duration_tl(), 500);
    }

    #[test]
    fn remove_range_across_clips_only_touches_overlap() {
        let mut timeline = Timeline {
            segments: vec![segment(1, 1, 0, 300, true), segment(2, 2, 0, 200, true)],
        };

        let removed = timeline
            .remove_range(250, 350, &mut counter(3))
            .expect("remove should succeed");

        assert_eq!(removed, 100);
        assert_eq!(
            timeline.segments,
            vec![
                segment(1, 1, 0, 250, true),
                segment(3, 1, 250, 300, false),
                segment(4, 2, 0, 50, false),
                segment(2, 2, 50, 200, true),
            ]
        );
        assert_eq!(timeline.duration_tl(), 400);
    }

    #[test]
    fn remove_range_is_clamped_to_duration() {
        let mut timeline = Timeline {
            segments: vec![segment(1, 1, 0, 100, true)],
        };

        let removed = timeline
            .remove_range(50, 1_000, &mut counter(2))
            .expect("remove should succeed");
        assert_eq!(removed, 50);
        assert_eq!(timeline.duration_tl(), 50);

        let removed = timeline
            .remove_range(500, 900, &mut counter(3))
            .expect("range past the end removes nothing");
        assert_eq!(removed, 0);
    }

    #[test]
    fn remove_range_rejects_empty_and_inverted_ranges() {
        let mut timeline = Timeline {
            segments: vec![segment(1, 1, 0, 100, true)],
        };

        assert!(matches!(
            timeline.remove_range(20, 20, &mut counter(2)),
            Err(EngineError::InvalidRange {
                start_tl: 20,
                end_tl: 20
            })
        ));
        assert!(timeline.remove_range(30, 10, &mut counter(2)).is_err());
        assert_eq!(timeline.segments.len(), 1);
    }

    #[test]
    fn adjacent_removed_pieces_of_same_clip_are_coalesced() {
        let mut timeline = Timeline {
            segments: vec![segment(1, 1, 0, 600, true)],
        };
        timeline
            .remove_range(100, 200, &mut counter(2))
            .expect("first remove");

        // Output 100..150 now maps to source 200..250, right after the hole.
        timeline
            .remove_range(100, 150, &mut counter(10))
            .expect("second remove");

        assert_eq!(
            timeline.segments,
            vec![
                segment(1, 1, 0, 100, true),
                segment(2, 1, 100, 250, false),
                segment(3, 1, 250, 600, true),
            ]
        );
        assert_eq!(timeline.duration_tl(), 450);
    }

    #[test]
    fn set_kept_restores_a_removed_segment() {
        let mut timeline = Timeline {
            segments: vec![segment(1, 1, 0, 100, true), segment(2, 1, 100, 200, false)],
        };

        timeline.set_kept(2, true).expect("segment exists");
        assert_eq!(timeline.duration_tl(), 200);

        assert!(matches!(
            timeline.set_kept(99, false),
            Err(EngineError::SegmentIdNotFound { segment_id: 99 })
        ));
    }

    #[test]
    fn remove_clip_preserves_order_of_remaining_segments() {
        let mut timeline = Timeline {
            segments: vec![
                segment(1, 1, 0, 100, true),
                segment(2, 2, 0, 100, true),
                segment(3, 1, 100, 200, false),
                segment(4, 3, 0, 100, true),
            ],
        };

        assert_eq!(timeline.remove_clip(1), 2);
        assert_eq!(ids(&timeline), vec![2, 4]);
        assert_eq!(timeline.duration_tl(), 200);
    }
}
