//! The media resource capability the controller drives.
//!
//! A backend hands out one resource per track. Preparation happens off the
//! engine thread; readiness, natural end and failure come back as messages
//! tagged with the generation the resource was acquired under.

use std::sync::mpsc::Sender;

use crate::error::ResourceError;
use crate::library::Track;

use super::types::{Msg, ResourceEvent};

pub trait MediaResource {
    /// Begin output. Called once, after the resource reported `prepared`.
    fn start(&mut self);
    fn pause(&mut self);
    fn resume(&mut self);
    /// Stop output and free the resource.
    fn release(self);
}

pub trait MediaBackend {
    type Resource: MediaResource;

    /// Start preparing `track`; report progress through `events`.
    fn acquire(
        &mut self,
        track: &Track,
        events: ResourceEvents,
    ) -> Result<Self::Resource, ResourceError>;
}

/// Reporter handed to a resource, bound to one generation.
#[derive(Debug, Clone)]
pub struct ResourceEvents {
    generation: u64,
    tx: Sender<Msg>,
}

impl ResourceEvents {
    pub(crate) fn new(generation: u64, tx: Sender<Msg>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn prepared(&self) {
        self.send(ResourceEvent::Prepared);
    }

    pub fn completed(&self) {
        self.send(ResourceEvent::Completed);
    }

    pub fn failed(&self, error: ResourceError) {
        self.send(ResourceEvent::Failed(error));
    }

    fn send(&self, event: ResourceEvent) {
        // The engine may already be gone during shutdown.
        let _ = self.tx.send(Msg::Resource {
            generation: self.generation,
            event,
        });
    }
}
