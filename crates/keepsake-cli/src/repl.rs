//! Interactive onboarding conversation in the terminal.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use keepsake_application::{AuthChannel, ChatSession, StartOutcome};
use keepsake_core::chat::{ChatView, InputKind};
use rustyline::Editor;
use rustyline::error::ReadlineError;

use crate::helper::CliHelper;
use crate::input::{self, LineAction, ReplCommand, ReplInput};
use crate::render::{self, TranscriptPrinter};

/// Runs the conversation until the user quits or it completes.
pub async fn run(session: Arc<ChatSession>, auth: AuthChannel) -> Result<()> {
    println!("{}", "=== Keepsake ===".bright_magenta().bold());
    println!("{}", "Type '/help' for commands or '/quit' to leave.".bright_black());
    println!();

    let mut printer = TranscriptPrinter::new();
    let started = session.start().await;
    printer.print_new(&session.transcript().await);

    match started {
        StartOutcome::Fresh | StartOutcome::Restored => {}
        StartOutcome::Blocked => {
            println!(
                "{}",
                "No questions are available right now. Please try again later.".red()
            );
            return Ok(());
        }
        StartOutcome::AlreadyRegistered => {
            render::print_already_registered();
            return Ok(());
        }
        StartOutcome::Cancelled => return Ok(()),
    }

    let mut rl = Editor::new()?;
    rl.set_helper(Some(CliHelper::new()));

    loop {
        let view = session.view().await;
        if view.is_complete {
            println!("{}", "All done. Goodbye!".bright_green());
            break;
        }
        if session.is_already_registered().await {
            break;
        }
        render::print_hint(&view);

        let line = match rl.readline(&render::prompt(&view)) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("{}", "CTRL-C detected. Type '/quit' to exit.".yellow());
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("{}", "CTRL-D detected. Progress is saved.".bright_green());
                break;
            }
            Err(err) => {
                eprintln!("{}", format!("Error: {:?}", err).red());
                break;
            }
        };
        if !line.trim().is_empty() {
            let _ = rl.add_history_entry(line.as_str());
        }

        match input::parse_line(&line) {
            ReplInput::Empty => commit_line(&session, &view, "").await,
            ReplInput::Text(text) => commit_line(&session, &view, &text).await,
            ReplInput::Command(command) => match command {
                ReplCommand::Quit => {
                    println!("{}", "Goodbye! Progress is saved.".bright_green());
                    break;
                }
                ReplCommand::Login(token) => {
                    auth.login(token);
                    render::report_auth(&session.on_auth_changed().await);
                }
                ReplCommand::Logout => {
                    auth.logout();
                    session.on_auth_changed().await;
                    println!("{}", "Signed out.".bright_black());
                }
                ReplCommand::AttachFile(path) => attach(&session, &path).await,
                ReplCommand::ClearFile => {
                    if session.select_file(None).await {
                        println!("{}", "Attachment removed.".bright_black());
                    } else {
                        println!("{}", "No file step is open.".bright_black());
                    }
                }
                ReplCommand::Submit => render::report_submit(&session.submit().await),
                ReplCommand::Status => {
                    let file_name = session.pending_file_name().await;
                    render::print_status(&view, file_name.as_deref());
                }
                ReplCommand::Help => render::print_help(),
                ReplCommand::MissingArgument(usage) => {
                    println!("{}", format!("Usage: {}", usage).yellow());
                }
                ReplCommand::Unknown(name) => {
                    println!("{}", format!("Unknown command {}", name).bright_black());
                }
            },
        }

        printer.print_new(&session.transcript().await);
    }

    session.shutdown();
    Ok(())
}

async fn commit_line(session: &ChatSession, view: &ChatView, draft: &str) {
    match input::line_action(view, draft) {
        LineAction::Commit if view.input_kind == Some(InputKind::File) => {
            render::report_turn(&session.confirm_file().await);
        }
        LineAction::Commit => render::report_turn(&session.send_answer(draft).await),
        LineAction::Attach => attach(session, Path::new(draft)).await,
        LineAction::Rejected(hint) => println!("{}", hint.yellow()),
        LineAction::Closed if draft.is_empty() => {}
        LineAction::Closed => println!("{}", "Input is closed right now.".bright_black()),
    }
}

async fn attach(session: &ChatSession, path: &Path) {
    let file = match input::load_pending_file(path) {
        Ok(file) => file,
        Err(e) => {
            println!("{}", format!("{:#}", e).red());
            return;
        }
    };

    let name = file.name().to_string();
    if session.select_file(Some(file)).await {
        println!("{}", format!("Attached {}", name).bright_black());
    } else {
        println!("{}", "No file step is open.".bright_black());
    }
}
