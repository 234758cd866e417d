//! Parsing of REPL lines and loading of attachments from disk.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use keepsake_core::chat::{ChatView, InputKind, PendingFile, can_commit};

/// Slash commands offered for completion.
pub const COMMANDS: &[&str] = &[
    "/login",
    "/logout",
    "/file",
    "/clear-file",
    "/submit",
    "/status",
    "/help",
    "/quit",
];

/// One parsed REPL line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplInput {
    /// Blank line. Confirms the file step.
    Empty,
    /// Anything that is not a slash command.
    Text(String),
    Command(ReplCommand),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Login(String),
    Logout,
    AttachFile(PathBuf),
    ClearFile,
    Submit,
    Status,
    Help,
    Quit,
    /// A known command given without its argument.
    MissingArgument(&'static str),
    Unknown(String),
}

pub fn parse_line(line: &str) -> ReplInput {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ReplInput::Empty;
    }
    if trimmed == "quit" || trimmed == "exit" {
        return ReplInput::Command(ReplCommand::Quit);
    }
    if !trimmed.starts_with('/') {
        return ReplInput::Text(trimmed.to_string());
    }

    let (name, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (trimmed, ""),
    };

    let command = match name {
        "/login" if rest.is_empty() => ReplCommand::MissingArgument("/login <token>"),
        "/login" => ReplCommand::Login(rest.to_string()),
        "/logout" => ReplCommand::Logout,
        "/file" if rest.is_empty() => ReplCommand::MissingArgument("/file <path>"),
        "/file" => ReplCommand::AttachFile(PathBuf::from(unquote(rest))),
        "/clear-file" => ReplCommand::ClearFile,
        "/submit" => ReplCommand::Submit,
        "/status" => ReplCommand::Status,
        "/help" => ReplCommand::Help,
        "/quit" | "/exit" => ReplCommand::Quit,
        other => ReplCommand::Unknown(other.to_string()),
    };
    ReplInput::Command(command)
}

/// What a non-command line does at the active step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineAction {
    /// Commit the step: send the text, or confirm the attachment.
    Commit,
    /// Treat the line as a path to attach.
    Attach,
    /// The commit action is disabled; the hint says why.
    Rejected(&'static str),
    /// No step accepts input.
    Closed,
}

/// Decides what `draft` does, enabling the commit only when the step's
/// constraint holds.
pub fn line_action(view: &ChatView, draft: &str) -> LineAction {
    let Some(kind) = view.input_kind.filter(|_| !view.disabled) else {
        return LineAction::Closed;
    };
    if kind == InputKind::File && !draft.trim().is_empty() {
        return LineAction::Attach;
    }
    if can_commit(kind, draft, view.has_file) {
        return LineAction::Commit;
    }
    LineAction::Rejected(match kind {
        InputKind::File => "Attach a file first with /file <path>.",
        InputKind::BirthDate => "Enter the date as YYYY-MM-DD.",
        InputKind::Name | InputKind::Freeform => "An answer is required.",
    })
}

/// Strips one pair of matching quotes, as left by drag-and-drop into a
/// terminal.
fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

/// Reads `path` into a [`PendingFile`].
///
/// The MIME type is guessed from the extension; the modification time
/// falls back to the epoch when the platform does not report one.
pub fn load_pending_file(path: &Path) -> Result<PendingFile> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    if !metadata.is_file() {
        bail!("{} is not a file", path.display());
    }

    let bytes = std::fs::read(path).with_context(|| format!("Cannot read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no file name", path.display()))?;
    let mime_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string();
    let last_modified = metadata
        .modified()
        .map(|time| DateTime::<Utc>::from(time).timestamp_millis())
        .unwrap_or(0);

    Ok(PendingFile::new(name, mime_type, last_modified, bytes))
}
