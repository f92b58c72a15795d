// Console front end - maps text commands onto the orchestrator
//
// The binary reads one command per line from stdin. Control commands answer with the
// JSON command acknowledgement, queries answer with JSON or plain text. Pushed events
// are printed separately, one JSON object per line.

use crate::models::CollectionType;
use crate::orchestrator::{CommandAck, Orchestrator, StartRequest};
use camino::Utf8PathBuf;
use std::fmt::Write;

pub const HELP: &str = "\
Commands:
  collect <origem|destino> <dir>   snapshot a directory tree
  compare <origem.json> <destino.json>
                                   diff two collections
  copy <comparison.json>           copy what a comparison found missing or different
  pause | resume | stop            control the running operation
  status                           progress and artifact listings (JSON)
  list                             artifact listings
  show <file>                      render a comparison or copy report
  fetch <file>                     raw content of any artifact
  help                             this text
  quit                             stop the running operation and exit";

/// One parsed console line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Start(StartRequest),
    Pause,
    Resume,
    Stop,
    Status,
    List,
    Show(String),
    Fetch(String),
    Help,
    Quit,
}

/// What the console loop should do with a command's result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Print(String),
    Quit,
}

/// Parse a console line. Blank lines parse to `None`.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("collect", [kind, _, ..]) => {
            let collection_type: CollectionType = kind.parse()?;
            // Rest of the raw line, so whitespace inside directory names survives
            let (_, rest) = split_word(line);
            let (_, dir) = split_word(rest);
            Command::Start(StartRequest::Collect {
                directory: Utf8PathBuf::from(dir.trim()),
                collection_type,
            })
        }
        ("compare", [origem, destino]) => Command::Start(StartRequest::Compare {
            origem: origem.to_string(),
            destino: destino.to_string(),
        }),
        ("copy", [comparison]) => Command::Start(StartRequest::Copy {
            comparison: comparison.to_string(),
        }),
        ("pause", []) => Command::Pause,
        ("resume", []) => Command::Resume,
        ("stop", []) => Command::Stop,
        ("status", []) => Command::Status,
        ("list", []) => Command::List,
        ("show", [file]) => Command::Show(file.to_string()),
        ("fetch", [file]) => Command::Fetch(file.to_string()),
        ("help", _) => Command::Help,
        ("quit" | "exit", []) => Command::Quit,
        (verb, _) => return Err(format!("Unrecognised command '{}', try 'help'", verb)),
    };
    Ok(Some(command))
}

/// First word of `text` and everything after it.
fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    text.split_at(text.find(char::is_whitespace).unwrap_or(text.len()))
}

fn ack_json(ack: CommandAck) -> String {
    serde_json::to_string(&ack).unwrap_or_else(|e| format!("{{\"status\":\"error\",\"message\":\"{}\"}}", e))
}

/// Run a command against the orchestrator.
pub fn execute(orchestrator: &Orchestrator, command: Command) -> Reply {
    let text = match command {
        Command::Start(request) => ack_json(CommandAck::from_result(orchestrator.start(request))),
        Command::Pause => ack_json(CommandAck::from_result(orchestrator.pause())),
        Command::Resume => ack_json(CommandAck::from_result(orchestrator.resume())),
        Command::Stop => ack_json(CommandAck::from_result(orchestrator.stop())),
        Command::Status => serde_json::to_string_pretty(&orchestrator.status())
            .unwrap_or_else(|e| format!("Cannot encode status: {}", e)),
        Command::List => listings(orchestrator),
        Command::Show(file) => match orchestrator.render_artifact(&file) {
            Ok(text) => text,
            Err(e) => e.to_string(),
        },
        Command::Fetch(file) => match orchestrator.fetch_artifact(&file) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => e.to_string(),
        },
        Command::Help => HELP.to_string(),
        Command::Quit => return Reply::Quit,
    };
    Reply::Print(text)
}

fn listings(orchestrator: &Orchestrator) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Collections:");
    for r in orchestrator.list_collections() {
        let _ = writeln!(
            out,
            "  {} [{}] {} ({} inaccessible)",
            r.filename, r.collection_type, r.directory_path, r.inaccessible_count
        );
    }
    let _ = writeln!(out, "Comparisons:");
    for r in orchestrator.list_comparisons() {
        let _ = writeln!(
            out,
            "  {} {} -> {} ({} not copied)",
            r.filename, r.dir_origem, r.dir_destino, r.not_copied_count
        );
    }
    let _ = writeln!(out, "Copy reports:");
    for r in orchestrator.list_copy_reports() {
        let _ = writeln!(
            out,
            "  {} {}/{} copied, {} failed",
            r.filename, r.files_copied_successfully, r.total_files_attempted, r.files_failed_to_copy
        );
    }
    out
}
