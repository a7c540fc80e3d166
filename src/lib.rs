//! A background music engine that plays random songs from a set of folders
//! and never repeats one until every song in the library has been played.
//!
//! [`session::Session`] is the entry point; everything else is what it is
//! built from.

pub mod config;
pub mod error;
pub mod history;
pub mod library;
pub mod playback;
pub mod runtime;
pub mod session;

pub use session::Session;
