//! Line-oriented control over stdin.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::mpsc::Receiver;

use tracing::{debug, warn};

use crate::error::EngineError;
use crate::playback::{PlaybackState, SessionStatus};
use crate::session::Session;

pub const HELP: &str = "\
commands:
  play               start a random unplayed song (or resume)
  pause | resume     pause or resume the current song
  toggle             pause/resume
  next               skip to another unplayed song
  stop               stop playback
  folders <dir>...   replace the folder selection (none = defaults)
  available          list folders that contain audio
  clear              forget play history
  counts             show unplayed / total songs
  status             show what is playing
  help               this text
  quit               exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCmd {
    Play,
    Pause,
    Resume,
    Toggle,
    Next,
    Stop,
    Folders(Vec<PathBuf>),
    Available,
    Clear,
    Counts,
    Status,
    Help,
    Quit,
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<ConsoleCmd>, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };

    let cmd = match head.to_ascii_lowercase().as_str() {
        "play" | "p" => ConsoleCmd::Play,
        "pause" => ConsoleCmd::Pause,
        "resume" => ConsoleCmd::Resume,
        "toggle" | "t" => ConsoleCmd::Toggle,
        "next" | "n" | "skip" => ConsoleCmd::Next,
        "stop" => ConsoleCmd::Stop,
        "folders" => ConsoleCmd::Folders(words.by_ref().map(PathBuf::from).collect()),
        "available" => ConsoleCmd::Available,
        "clear" => ConsoleCmd::Clear,
        "counts" => ConsoleCmd::Counts,
        "status" | "s" => ConsoleCmd::Status,
        "help" | "?" => ConsoleCmd::Help,
        "quit" | "q" | "exit" => ConsoleCmd::Quit,
        other => return Err(format!("unknown command `{other}` (try `help`)")),
    };

    if words.next().is_some() {
        return Err(format!("`{head}` takes no arguments"));
    }
    Ok(Some(cmd))
}

/// One-line summary of a status snapshot.
pub fn describe(status: &SessionStatus) -> String {
    let what = match (&status.state, &status.current) {
        (PlaybackState::Idle, _) | (_, None) => "stopped".to_string(),
        (PlaybackState::Preparing, Some(t)) => format!("loading {}", t.title),
        (PlaybackState::Playing, Some(t)) => format!("playing {}", t.title),
        (PlaybackState::Paused, Some(t)) => format!("paused {}", t.title),
    };

    match &status.last_error {
        Some(err) => format!("{what} [{}] ({err})", status.counts),
        None => format!("{what} [{}]", status.counts),
    }
}

/// Read commands until `quit` or end of input.
pub fn run<R: BufRead, W: Write>(session: &Session, input: R, mut out: W) -> io::Result<()> {
    writeln!(out, "type `help` for commands")?;

    for line in input.lines() {
        let line = line?;
        let cmd = match parse_line(&line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => continue,
            Err(msg) => {
                writeln!(out, "{msg}")?;
                continue;
            }
        };
        debug!(?cmd, "console command");

        if cmd == ConsoleCmd::Quit {
            break;
        }
        if let Err(e) = dispatch(session, cmd, &mut out) {
            warn!(error = %e, "engine stopped");
            writeln!(out, "{e}")?;
            break;
        }
    }
    Ok(())
}

fn dispatch<W: Write>(session: &Session, cmd: ConsoleCmd, out: &mut W) -> Result<(), EngineError> {
    match cmd {
        ConsoleCmd::Play => session.play(),
        ConsoleCmd::Pause => session.pause(),
        ConsoleCmd::Resume => session.resume(),
        ConsoleCmd::Toggle => session.toggle_pause(),
        ConsoleCmd::Next => session.next(),
        ConsoleCmd::Stop => session.stop(),
        ConsoleCmd::Folders(folders) => session.set_folders(folders),
        ConsoleCmd::Clear => session.clear_history(),
        ConsoleCmd::Available => {
            let folders = session.available_folders();
            if folders.is_empty() {
                let _ = writeln!(out, "no folders with audio files");
            }
            for folder in folders {
                let _ = writeln!(out, "{}", folder.display());
            }
            Ok(())
        }
        ConsoleCmd::Counts => {
            let _ = writeln!(out, "{}", session.counts());
            Ok(())
        }
        ConsoleCmd::Status => {
            let _ = writeln!(out, "{}", describe(&session.status()));
            Ok(())
        }
        ConsoleCmd::Help => {
            let _ = writeln!(out, "{HELP}");
            Ok(())
        }
        ConsoleCmd::Quit => Ok(()),
    }
}

/// Print track changes and errors as they are published.
pub fn print_updates(updates: Receiver<SessionStatus>) {
    let mut last: Option<(Option<String>, PlaybackState, Option<String>)> = None;

    for status in updates {
        let key = (
            status.current.as_ref().map(|t| t.id.clone()),
            status.state,
            status.last_error.clone(),
        );
        if last.as_ref() == Some(&key) {
            continue;
        }
        println!("{}", describe(&status));
        last = Some(key);
    }
}
