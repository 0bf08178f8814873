use engine::ProjectSnapshot;
use engine::api::{ClipSummary, SegmentSummary};
use engine::timeline::ClipId;
use iced::widget::canvas::{self, Frame, Path, Stroke, event};
use iced::widget::container;
use iced::{Color, Element, Length, Point, Rectangle, Size, Theme, mouse};

const HEIGHT: f32 = 56.0;
const TRACK_INSET: f32 = 8.0;
const BACKGROUND: Color = Color::from_rgb(0.086, 0.094, 0.114);
const CLIP_COLORS: [Color; 4] = [
    Color::from_rgb(0.0, 0.72, 0.28),
    Color::from_rgb(0.22, 0.45, 0.78),
    Color::from_rgb(0.85, 0.58, 0.12),
    Color::from_rgb(0.62, 0.32, 0.75),
];
const SELECTION_COLOR: Color = Color::from_rgba(0.1, 0.2, 0.9, 0.4);
const PLAYHEAD_COLOR: Color = Color::WHITE;
const BOUNDARY_COLOR: Color = Color::from_rgb(0.08, 0.09, 0.11);

/// Linear mapping between widget x positions and output ticks.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Ruler {
    width: f32,
    duration_tl: i64,
}

impl Ruler {
    fn new(width: f32, duration_tl: i64) -> Self {
        Self { width, duration_tl }
    }

    fn is_empty(self) -> bool {
        self.duration_tl <= 0 || self.width <= 0.0
    }

    /// Tick under `x`, clamped to `0..duration_tl`.
    fn tick_at(self, x: f32) -> i64 {
        if self.is_empty() {
            return 0;
        }
        let fraction = f64::from(x.clamp(0.0, self.width) / self.width);
        let tick = (fraction * self.duration_tl as f64).floor() as i64;
        tick.min(self.duration_tl - 1)
    }

    /// Left edge of `t_tl`; ticks past the end map to the right edge.
    fn x_at(self, t_tl: i64) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let fraction = t_tl.clamp(0, self.duration_tl) as f64 / self.duration_tl as f64;
        fraction as f32 * self.width
    }

    /// Where the playhead line goes. The last tick sits on the right edge so a
    /// playhead parked at the end is visibly at the end.
    fn playhead_x(self, playhead_tl: i64) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let last = self.duration_tl - 1;
        match playhead_tl.clamp(0, last) {
            t if t == last => self.width,
            t => self.x_at(t),
        }
    }
}

fn clip_color(clips: &[ClipSummary], clip_id: ClipId) -> Color {
    let slot = clips
        .iter()
        .position(|clip| clip.id == clip_id)
        .unwrap_or_default();
    CLIP_COLORS[slot % CLIP_COLORS.len()]
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Gesture {
    #[default]
    Idle,
    Scrubbing,
}

struct TimelineProgram<'a, Message> {
    duration_tl: i64,
    playhead_tl: i64,
    selection: Option<(i64, i64)>,
    clips: &'a [ClipSummary],
    segments: &'a [SegmentSummary],
    cache: &'a canvas::Cache,
    on_scrub: fn(i64) -> Message,
    on_split: Option<fn(i64) -> Message>,
}

impl<Message> TimelineProgram<'_, Message> {
    fn draw_track(&self, frame: &mut Frame, ruler: Ruler, track_height: f32) {
        frame.fill_rectangle(Point::ORIGIN, frame.size(), BACKGROUND);

        // Removed segments have no timeline position and occupy no width.
        let placed = self.segments.iter().filter_map(|segment| {
            let start_tl = segment.timeline_start?;
            Some((segment, start_tl, start_tl + segment.src_end - segment.src_start))
        });
        for (segment, start_tl, end_tl) in placed {
            let left = ruler.x_at(start_tl);
            let right = ruler.x_at(end_tl);
            frame.fill_rectangle(
                Point::new(left, TRACK_INSET),
                Size::new((right - left).max(1.0), track_height),
                clip_color(self.clips, segment.clip_id),
            );
            if start_tl > 0 {
                frame.stroke(
                    &Path::line(
                        Point::new(left, TRACK_INSET),
                        Point::new(left, TRACK_INSET + track_height),
                    ),
                    Stroke::default().with_width(1.0).with_color(BOUNDARY_COLOR),
                );
            }
        }
    }

    fn draw_overlay(&self, frame: &mut Frame, ruler: Ruler, track_height: f32) {
        if let Some((start_tl, end_tl)) = self.selection.filter(|(start, end)| end > start) {
            let left = ruler.x_at(start_tl);
            frame.fill_rectangle(
                Point::new(left, TRACK_INSET),
                Size::new((ruler.x_at(end_tl) - left).max(1.0), track_height),
                SELECTION_COLOR,
            );
        }

        let x = ruler.playhead_x(self.playhead_tl);
        frame.stroke(
            &Path::line(Point::new(x, 0.0), Point::new(x, frame.height())),
            Stroke::default().with_width(2.0).with_color(PLAYHEAD_COLOR),
        );
    }
}

impl<Message> canvas::Program<Message> for TimelineProgram<'_, Message> {
    type State = Gesture;

    fn update(
        &self,
        gesture: &mut Gesture,
        event: canvas::Event,
        bounds: Rectangle,
        cursor: mouse::Cursor,
    ) -> (event::Status, Option<Message>) {
        let ruler = Ruler::new(bounds.width, self.duration_tl);
        if ruler.is_empty() {
            return (event::Status::Ignored, None);
        }

        // While scrubbing the pointer may leave the widget; keep tracking it.
        let x = match *gesture {
            Gesture::Scrubbing => cursor.position().map(|point| point.x - bounds.x),
            Gesture::Idle => cursor.position_in(bounds).map(|point| point.x),
        };

        let canvas::Event::Mouse(mouse_event) = event else {
            return (event::Status::Ignored, None);
        };
        let action = match (mouse_event, *gesture) {
            (mouse::Event::ButtonPressed(mouse::Button::Left), _) => {
                if x.is_some() {
                    *gesture = Gesture::Scrubbing;
                }
                self.on_scrub
            }
            (mouse::Event::CursorMoved { .. }, Gesture::Scrubbing) => self.on_scrub,
            (mouse::Event::ButtonPressed(mouse::Button::Right), _) => match self.on_split {
                Some(on_split) => on_split,
                None => return (event::Status::Ignored, None),
            },
            (mouse::Event::ButtonReleased(mouse::Button::Left), Gesture::Scrubbing) => {
                *gesture = Gesture::Idle;
                return (event::Status::Captured, None);
            }
            _ => return (event::Status::Ignored, None),
        };

        match x {
            Some(x) => (event::Status::Captured, Some(action(ruler.tick_at(x)))),
            None => (event::Status::Ignored, None),
        }
    }

    fn draw(
        &self,
        _gesture: &Gesture,
        renderer: &iced::Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<canvas::Geometry> {
        let ruler = Ruler::new(bounds.width, self.duration_tl);
        let track_height = (bounds.height - 2.0 * TRACK_INSET).max(1.0);

        let track = self.cache.draw(renderer, bounds.size(), |frame| {
            self.draw_track(frame, ruler, track_height);
        });
        if ruler.is_empty() {
            return vec![track];
        }

        let mut overlay = Frame::new(renderer, bounds.size());
        self.draw_overlay(&mut overlay, ruler, track_height);
        vec![track, overlay.into_geometry()]
    }

    fn mouse_interaction(
        &self,
        gesture: &Gesture,
        bounds: Rectangle,
        cursor: mouse::Cursor,
    ) -> mouse::Interaction {
        match *gesture {
            _ if self.duration_tl <= 0 => mouse::Interaction::None,
            Gesture::Scrubbing => mouse::Interaction::Grabbing,
            Gesture::Idle if cursor.is_over(bounds) => mouse::Interaction::Pointer,
            Gesture::Idle => mouse::Interaction::None,
        }
    }
}

/// The clip track with selection and playhead.
///
/// Left button scrubs (press or drag), right button splits at the pointer
/// unless `on_split` is `None`. `cache` holds the track layer and must be cleared when the project changes.
pub fn view<'a, Message: 'a>(
    snapshot: Option<&'a ProjectSnapshot>,
    playhead_tl: i64,
    selection: Option<(i64, i64)>,
    cache: &'a canvas::Cache,
    on_scrub: fn(i64) -> Message,
    on_split: Option<fn(i64) -> Message>,
) -> Element<'a, Message> {
    let program = TimelineProgram {
        duration_tl: snapshot.map_or(0, |project| project.duration_tl),
        playhead_tl,
        selection,
        clips: snapshot.map_or(&[][..], |project| project.clips.as_slice()),
        segments: snapshot.map_or(&[][..], |project| project.segments.as_slice()),
        cache,
        on_scrub,
        on_split,
    };

    container(
        canvas::Canvas::new(program)
            .width(Length::Fill)
            .height(Length::Fixed(HEIGHT)),
    )
    .width(Length::Fill)
    .into()
}
