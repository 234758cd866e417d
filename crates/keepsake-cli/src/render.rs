use colored::Colorize;
use keepsake_application::{AuthReaction, SubmitOutcome, TurnOutcome};
use keepsake_core::chat::{ChatView, ConversationMessage, InputKind};

/// Prints transcript messages not printed yet.
#[derive(Debug, Default)]
pub struct TranscriptPrinter {
    printed: usize,
}

impl TranscriptPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn print_new(&mut self, messages: &[ConversationMessage]) {
        // The transcript only grows within one session.
        let start = self.printed.min(messages.len());
        for message in &messages[start..] {
            print_message(message);
        }
        self.printed = messages.len();
    }
}

fn print_message(message: &ConversationMessage) {
    if message.is_from_user {
        for line in message.text.lines() {
            println!("{}", format!("> {}", line).green());
        }
    } else {
        println!("{}", "[Keepsake]".bright_magenta());
        for line in message.text.lines() {
            println!("{}", line.bright_blue());
        }
        println!();
    }
}

/// Readline prompt for the current view.
pub fn prompt(view: &ChatView) -> String {
    if view.awaiting_auth {
        return "login >> ".to_string();
    }
    match view.input_kind {
        Some(kind) => format!(
            "[{}/{}] {} >> ",
            view.step_number,
            view.total_steps,
            kind_label(kind)
        ),
        None => ">> ".to_string(),
    }
}

fn kind_label(kind: InputKind) -> &'static str {
    match kind {
        InputKind::Name => "name",
        InputKind::BirthDate => "YYYY-MM-DD",
        InputKind::Freeform => "answer",
        InputKind::File => "file",
    }
}

/// One-line usage hint for the active step.
pub fn step_hint(view: &ChatView) -> Option<&'static str> {
    if view.awaiting_auth {
        return Some("Sign in with /login <token>; your answers are submitted automatically.");
    }
    match view.input_kind? {
        InputKind::File if view.has_file => Some("Press Enter to submit, or /file <path> to replace."),
        InputKind::File => Some("Type a path or use /file <path>, then press Enter."),
        InputKind::BirthDate => Some("Enter the date as YYYY-MM-DD."),
        _ => None,
    }
}

pub fn print_hint(view: &ChatView) {
    if let Some(hint) = step_hint(view) {
        println!("{}", hint.bright_black());
    }
}

pub fn report_turn(outcome: &TurnOutcome) {
    match outcome {
        TurnOutcome::Advanced { .. } => {}
        TurnOutcome::Submitted(outcome) => report_submit(outcome),
        TurnOutcome::Ignored => println!("{}", "Input not accepted here.".bright_black()),
    }
}

pub fn report_submit(outcome: &SubmitOutcome) {
    match outcome {
        SubmitOutcome::Completed => println!("{}", "Submitted.".bright_green()),
        SubmitOutcome::Deferred => println!("{}", "Waiting for sign-in.".yellow()),
        SubmitOutcome::MissingFile => println!("{}", "No file attached.".yellow()),
        SubmitOutcome::AuthRejected => println!(
            "{}",
            "The token was rejected. Sign in again with /login <token>.".red()
        ),
        SubmitOutcome::Failed(e) => println!(
            "{}",
            format!("Submission failed: {}. Press Enter to retry.", e.display_message()).red()
        ),
        SubmitOutcome::Ignored => println!("{}", "Nothing to submit.".bright_black()),
        SubmitOutcome::Cancelled => {}
    }
}

pub fn report_auth(reaction: &AuthReaction) {
    match reaction {
        AuthReaction::Ignored => println!("{}", "Signed in.".bright_green()),
        AuthReaction::AlreadyRegistered => print_already_registered(),
        AuthReaction::Resumed(outcome) => report_submit(outcome),
    }
}

pub fn print_already_registered() {
    println!(
        "{}",
        "A memorial page already exists for this account. Saved progress was discarded.".yellow()
    );
}

pub fn print_status(view: &ChatView, file_name: Option<&str>) {
    let state = if view.is_complete {
        "complete"
    } else if view.is_submitting {
        "submitting"
    } else if view.awaiting_auth {
        "waiting for sign-in"
    } else if view.is_blocked {
        "no questions"
    } else {
        "in progress"
    };
    println!(
        "{}",
        format!(
            "State: {} | step {}/{} ({:.0}%) | file: {}",
            state,
            view.step_number,
            view.total_steps,
            view.progress_percent,
            file_name.unwrap_or("none")
        )
        .bright_black()
    );
}

pub fn print_help() {
    println!("{}", "Commands:".bright_yellow());
    for (command, help) in [
        ("/login <token>", "sign in; a deferred submission resumes"),
        ("/logout", "sign out"),
        ("/file <path>", "attach the profile file"),
        ("/clear-file", "remove the attachment"),
        ("/submit", "retry the submission"),
        ("/status", "show progress"),
        ("/quit", "leave; progress is kept"),
    ] {
        println!("  {} {}", format!("{:<16}", command).bright_cyan(), help);
    }
}
