use engine::PreviewFrame;
use iced::widget::{center, image, text};
use iced::{ContentFit, Element, Length};

const RGBA_BYTES: u64 = 4;

/// Decoded frame ready for the preview pane.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewImage {
    handle: image::Handle,
}

impl PreviewImage {
    /// Wraps an RGBA frame, or `None` if it is empty or its buffer does not
    /// hold exactly `width * height` pixels.
    pub fn from_frame(frame: &PreviewFrame) -> Option<Self> {
        let pixels = u64::from(frame.width) * u64::from(frame.height);
        let valid = pixels > 0 && frame.bytes.len() as u64 == pixels * RGBA_BYTES;
        valid.then(|| Self {
            handle: image::Handle::from_rgba(frame.width, frame.height, frame.bytes.to_vec()),
        })
    }
}

/// The preview pane: the latest frame scaled to fit, or a centered hint.
pub fn view<'a, Message: 'a>(
    latest: Option<&PreviewImage>,
    placeholder: &'a str,
) -> Element<'a, Message> {
    let Some(frame) = latest else {
        return center(text(placeholder)).into();
    };
    image(frame.handle.clone())
        .content_fit(ContentFit::Contain)
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}
