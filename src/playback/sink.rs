//! `rodio` implementation of the media resource.
//!
//! Each resource is a paused `Sink` on the shared output stream. A worker
//! thread opens and decodes the file, appends it to the sink, reports
//! `prepared`, then blocks until the sink drains and reports `completed`.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
use tracing::debug;

use crate::error::ResourceError;
use crate::library::Track;

use super::resource::{MediaBackend, MediaResource, ResourceEvents};

pub struct RodioBackend {
    stream: OutputStream,
}

impl RodioBackend {
    /// Open the default output device. Must run on the thread that will
    /// own the backend; the stream cannot move between threads.
    pub fn open_default() -> Result<Self, ResourceError> {
        let mut stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| ResourceError::Output(e.to_string()))?;
        // rodio logs to stderr when OutputStream is dropped.
        stream.log_on_drop(false);
        Ok(Self { stream })
    }
}

impl MediaBackend for RodioBackend {
    type Resource = RodioResource;

    fn acquire(
        &mut self,
        track: &Track,
        events: ResourceEvents,
    ) -> Result<RodioResource, ResourceError> {
        let sink = Arc::new(Sink::connect_new(self.stream.mixer()));
        sink.pause();

        let released = Arc::new(AtomicBool::new(false));
        let worker = Worker {
            path: track.path.clone(),
            sink: Arc::clone(&sink),
            released: Arc::clone(&released),
            events,
        };

        thread::Builder::new()
            .name("loopmuse-prepare".to_string())
            .spawn(move || worker.run())
            .map_err(|e| ResourceError::Output(format!("cannot start prepare thread: {e}")))?;

        Ok(RodioResource { sink, released })
    }
}

pub struct RodioResource {
    sink: Arc<Sink>,
    released: Arc<AtomicBool>,
}

impl MediaResource for RodioResource {
    fn start(&mut self) {
        self.sink.play();
    }

    fn pause(&mut self) {
        self.sink.pause();
    }

    fn resume(&mut self) {
        self.sink.play();
    }

    fn release(self) {
        self.released.store(true, Ordering::SeqCst);
        self.sink.stop();
    }
}

struct Worker {
    path: PathBuf,
    sink: Arc<Sink>,
    released: Arc<AtomicBool>,
    events: ResourceEvents,
}

impl Worker {
    fn run(self) {
        let source = match open_source(&self.path) {
            Ok(source) => source,
            Err(e) => {
                self.events.failed(e);
                return;
            }
        };

        if self.released.load(Ordering::SeqCst) {
            return;
        }
        self.sink.append(source);
        // Released between the check and the append: nobody will start it.
        if self.released.load(Ordering::SeqCst) {
            self.sink.stop();
            return;
        }

        self.events.prepared();
        self.sink.sleep_until_end();

        if self.released.load(Ordering::SeqCst) {
            debug!(generation = self.events.generation(), "sink stopped by release");
            return;
        }
        self.events.completed();
    }
}

fn open_source(path: &Path) -> Result<Decoder<BufReader<File>>, ResourceError> {
    let file = File::open(path).map_err(|e| ResourceError::Open {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    Decoder::new(BufReader::new(file)).map_err(|e| ResourceError::Decode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
