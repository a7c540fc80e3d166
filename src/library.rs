//! Library scanning and the cached view of the scan.

mod cache;
mod model;
mod scan;

pub use cache::*;
pub use model::*;
pub use scan::*;
