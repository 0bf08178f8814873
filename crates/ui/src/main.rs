mod app;
mod bridge;
mod widgets;

use app::AppState;
use iced::{Size, window};
use tracing_subscriber::EnvFilter;

fn main() -> iced::Result {
    init_tracing();

    iced::application("Splice", AppState::update, AppState::view)
        .subscription(AppState::subscription)
        .window(window::Settings {
            size: Size::new(1100.0, 780.0),
            // Closing is confirmed by the app while an export runs.
            exit_on_close_request: false,
            ..window::Settings::default()
        })
        .run_with(AppState::boot)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
