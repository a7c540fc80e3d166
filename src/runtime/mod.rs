use std::env;
use std::io;
use std::path::PathBuf;
use std::thread;

use tracing::{info, warn};

use crate::session::Session;

mod console;
mod logging;
mod settings;

/// Run the console front end until `quit` or end of input.
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let (settings, fallback) = settings::load_settings();
    logging::init(&settings.log);
    if let Some(msg) = fallback {
        warn!("{msg}");
    }

    // Folders on the command line replace the configured selection.
    let args: Vec<PathBuf> = env::args_os().skip(1).map(PathBuf::from).collect();
    let folders = if args.is_empty() {
        settings.library.folders.clone()
    } else {
        args
    };

    let session = Session::open(&settings, folders)?;
    info!("engine started");

    let updates = session.subscribe()?;
    thread::Builder::new()
        .name("loopmuse-status".to_string())
        .spawn(move || console::print_updates(updates))?;

    session.refresh_counts()?;
    let result = console::run(&session, io::stdin().lock(), io::stdout());

    session.shutdown();
    info!("engine stopped");
    Ok(result?)
}
