//! Persistent play history: which tracks have been heard this cycle.

mod store;

pub use store::*;
