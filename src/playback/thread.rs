use std::io;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::{debug, error};

use crate::error::ResourceError;

use super::controller::{Controller, EngineParts};
use super::resource::MediaBackend;
use super::types::{Msg, StatusHandle};

/// Spawn the engine thread that owns the controller.
///
/// The backend is built on the new thread; the outcome is reported on
/// `ready` before any message is processed.
pub(super) fn spawn_engine_thread<B, F>(
    make_backend: F,
    parts: EngineParts,
    tx: Sender<Msg>,
    rx: Receiver<Msg>,
    status: StatusHandle,
    ready: Sender<Result<(), ResourceError>>,
) -> io::Result<JoinHandle<()>>
where
    B: MediaBackend,
    F: FnOnce() -> Result<B, ResourceError> + Send + 'static,
{
    thread::Builder::new()
        .name("loopmuse-engine".to_string())
        .spawn(move || {
            let backend = match make_backend() {
                Ok(backend) => backend,
                Err(e) => {
                    error!(error = %e, "media backend unavailable");
                    let _ = ready.send(Err(e));
                    return;
                }
            };
            let _ = ready.send(Ok(()));

            let tick = parts.tick;
            let mut controller = Controller::new(backend, parts, tx, status);

            loop {
                match rx.recv_timeout(tick) {
                    Ok(msg) => {
                        if !controller.handle(msg) {
                            break;
                        }
                        // A busy queue must not postpone the watchdog.
                        controller.tick(Instant::now());
                    }
                    Err(RecvTimeoutError::Timeout) => controller.tick(Instant::now()),
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            debug!("engine thread exiting");
        })
}
