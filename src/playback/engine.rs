use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::error::{EngineError, ResourceError};

use super::controller::EngineParts;
use super::resource::MediaBackend;
use super::thread::spawn_engine_thread;
use super::types::{Command, Msg, SessionStatus, StatusHandle};

/// Handle to the running engine thread.
///
/// Dropping the handle shuts the engine down and waits for it.
pub struct Engine {
    tx: Sender<Msg>,
    status: StatusHandle,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
    pub fn spawn<B, F>(make_backend: F, parts: EngineParts) -> Result<Self, EngineError>
    where
        B: MediaBackend,
        F: FnOnce() -> Result<B, ResourceError> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<Msg>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let status: StatusHandle = Arc::new(Mutex::new(SessionStatus::default()));

        let handle = spawn_engine_thread(make_backend, parts, tx.clone(), rx, status.clone(), ready_tx)
            .map_err(EngineError::Spawn)?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(EngineError::Backend(e));
            }
            Err(_) => return Err(EngineError::Disconnected),
        }

        Ok(Self {
            tx,
            status,
            join: Mutex::new(Some(handle)),
        })
    }

    pub fn send(&self, cmd: Command) -> Result<(), EngineError> {
        self.tx
            .send(Msg::Command(cmd))
            .map_err(|_| EngineError::Disconnected)
    }

    pub fn status_handle(&self) -> StatusHandle {
        self.status.clone()
    }

    /// A receiver of status snapshots; the current one is delivered first.
    pub fn subscribe(&self) -> Result<Receiver<SessionStatus>, EngineError> {
        let (tx, rx) = mpsc::channel();
        self.tx
            .send(Msg::Subscribe(tx))
            .map_err(|_| EngineError::Disconnected)?;
        Ok(rx)
    }

    /// Stop playback and join the engine thread. Idempotent.
    pub fn shutdown(&self) {
        let _ = self.tx.send(Msg::Shutdown);

        let handle = match self.join.lock() {
            Ok(mut j) => j.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(h) = handle {
            let _ = h.join();
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
