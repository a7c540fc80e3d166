use rand::Rng;
use rand::seq::SliceRandom;
use tracing::info;

use crate::error::SelectError;
use crate::history::HistoryStore;
use crate::library::Track;

/// Pick a uniformly random track that has not been played this cycle.
///
/// When every track has been played the history is cleared and the whole
/// library becomes eligible again; this happens at most once per call.
pub fn pick_next<'a, R: Rng + ?Sized>(
    library: &'a [Track],
    history: &mut HistoryStore,
    rng: &mut R,
) -> Result<&'a Track, SelectError> {
    if library.is_empty() {
        return Err(SelectError::Empty);
    }

    let unplayed = history.unplayed(library);
    if let Some(&track) = unplayed.choose(rng) {
        return Ok(track);
    }

    info!(tracks = library.len(), "every track played, starting a new cycle");
    history.clear();
    library.choose(rng).ok_or(SelectError::Empty)
}
