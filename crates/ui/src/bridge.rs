use std::thread;

use engine::{
    EditorConfig, Engine, EngineCommandSender, EngineEventReceiver, Event, spawn_engine_worker,
};
use iced::futures::channel::oneshot;
use iced::futures::{SinkExt, Stream, executor};
use iced::{Subscription, stream};
use tracing::{debug, warn};

const EVENT_BUFFER: usize = 32;

/// What the engine subscription feeds into the application.
#[derive(Debug, Clone)]
pub enum BridgeEvent {
    /// The worker is up; commands go through this sender.
    Ready(EngineCommandSender),
    Event(Event),
    /// The worker stopped and no further events will arrive.
    Disconnected,
}

/// Subscription that owns the engine worker for the lifetime of the window.
pub fn engine_subscription() -> Subscription<BridgeEvent> {
    Subscription::run(ffmpeg_engine_events)
}

/// Reads the editor config from `SPLICE_CONFIG`, falling back to defaults.
pub fn load_editor_config() -> EditorConfig {
    EditorConfig::from_env(None).unwrap_or_else(|error| {
        warn!(%error, "config could not be loaded, using defaults");
        EditorConfig::default()
    })
}

fn ffmpeg_engine_events() -> impl Stream<Item = BridgeEvent> {
    engine_events(|| {
        let config = load_editor_config();
        spawn_engine_worker(Engine::new(config.media_backend()))
    })
}

fn engine_events(
    start_worker: fn() -> (EngineCommandSender, EngineEventReceiver),
) -> impl Stream<Item = BridgeEvent> {
    stream::channel(EVENT_BUFFER, move |mut output| async move {
        let (engine_tx, engine_rx) = start_worker();
        if output.send(BridgeEvent::Ready(engine_tx)).await.is_err() {
            return;
        }

        // Engine events arrive on a blocking channel, so they are pumped
        // from a plain thread straight into the subscription sender.
        let (finished_tx, finished_rx) = oneshot::channel::<()>();
        thread::spawn(move || {
            for event in engine_rx.iter() {
                if executor::block_on(output.send(BridgeEvent::Event(event))).is_err() {
                    return;
                }
            }
            debug!("engine worker stopped");
            let _ = executor::block_on(output.send(BridgeEvent::Disconnected));
            let _ = finished_tx.send(());
        });

        let _ = finished_rx.await;
    })
}
