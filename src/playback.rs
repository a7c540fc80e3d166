//! Playback: the selector, the controller state machine, the engine thread
//! that serializes everything the controller sees, and the rodio backend.

mod controller;
mod engine;
mod resource;
mod selector;
mod sink;
mod thread;
mod types;

pub use controller::{Controller, EngineParts};
pub use engine::Engine;
pub use resource::{MediaBackend, MediaResource, ResourceEvents};
pub use selector::pick_next;
pub use sink::RodioBackend;
pub use types::*;

#[cfg(test)]
mod tests;
