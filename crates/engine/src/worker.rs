use std::sync::mpsc;
use std::thread;

use tracing::{debug, warn};

use crate::api::{Command, Engine, EngineErrorEvent, Event, ExportJob};
use crate::preview::MediaBackend;

const COMMAND_CHANNEL_CAPACITY: usize = 32;
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Sender used by front-ends to dispatch commands to the engine thread.
pub type EngineCommandSender = mpsc::SyncSender<Command>;

/// Receiver for events emitted by the engine thread and its export jobs.
pub type EngineEventReceiver = mpsc::Receiver<Event>;

/// Moves `engine` onto its own thread.
///
/// Commands are applied in order; failures come back as [`Event::Error`].
/// Every `SetPlayhead` ends with [`Event::PlayheadSettled`], success or not.
/// A planned export runs on a further thread that reports progress into the
/// same event channel, so scrubbing stays responsive while it renders.
/// The thread exits once every command sender is dropped.
pub fn spawn_engine_worker<M>(mut engine: Engine<M>) -> (EngineCommandSender, EngineEventReceiver)
where
    M: MediaBackend + Clone + Send + 'static,
{
    let (command_tx, command_rx) = mpsc::sync_channel::<Command>(COMMAND_CHANNEL_CAPACITY);
    let (event_tx, event_rx) = mpsc::sync_channel::<Event>(EVENT_CHANNEL_CAPACITY);

    thread::spawn(move || {
        while let Ok(command) = command_rx.recv() {
            let settled = match command {
                Command::SetPlayhead { t_tl } => {
                    Some(Event::PlayheadSettled { requested_tl: t_tl })
                }
                _ => None,
            };
            let mut events = match engine.handle_command(command) {
                Ok(events) => events,
                Err(error) => vec![Event::Error(EngineErrorEvent::from_error(&error))],
            };
            events.extend(settled);
            for event in events {
                if event_tx.send(event).is_err() {
                    return;
                }
            }

            if let Some(job) = engine.take_export_job() {
                spawn_export(job, event_tx.clone());
            }
        }
        debug!("engine worker stopped");
    });

    (command_tx, event_rx)
}

fn spawn_export<M>(job: ExportJob<M>, event_tx: mpsc::SyncSender<Event>)
where
    M: MediaBackend + Send + 'static,
{
    thread::spawn(move || {
        let progress_tx = event_tx.clone();
        let result = job.run(|done_tl, total_tl| {
            let _ = progress_tx.send(Event::ExportProgress { done_tl, total_tl });
        });

        let event = match result {
            Ok(path) => Event::ExportFinished { path },
            Err(error) => Event::Error(EngineErrorEvent::from_error(&error)),
        };
        if event_tx.send(event).is_err() {
            warn!("export result dropped: event receiver is gone");
        }
    });
}
