use std::path::PathBuf;

use crate::domain::events::{AppEvent, InboxCommand};

pub const HELP_LINES: [&str; 8] = [
    "Type a message and press Enter to send it.",
    "/more            load older messages",
    "/file <path>     send a file",
    "/retry           re-send failed messages",
    "/discard         drop failed messages",
    "/typing on|off   tell the peer you are typing",
    "/quit            leave the conversation",
    "Start a line with // to send text beginning with /.",
];

/// One line typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptInput {
    Event(AppEvent),
    Help,
    Blank,
    Invalid(String),
}

pub fn parse_line(line: &str) -> PromptInput {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return PromptInput::Blank;
    }

    if let Some(escaped) = line.strip_prefix("//") {
        return send(format!("/{escaped}"));
    }

    let Some(command_line) = line.trim_start().strip_prefix('/') else {
        return send(line.to_owned());
    };

    let (name, argument) = match command_line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command_line, ""),
    };

    match (name, argument) {
        ("quit" | "q", "") => PromptInput::Event(AppEvent::QuitRequested),
        ("help" | "h", "") => PromptInput::Help,
        ("more", "") => command(InboxCommand::LoadMore),
        ("retry", "") => command(InboxCommand::RetryFailed),
        ("discard", "") => command(InboxCommand::DiscardFailed),
        ("file", "") => PromptInput::Invalid("usage: /file <path>".to_owned()),
        ("file", path) => command(InboxCommand::SendFile(PathBuf::from(path))),
        ("typing", "on") => command(InboxCommand::Typing(true)),
        ("typing", "off") => command(InboxCommand::Typing(false)),
        ("typing", _) => PromptInput::Invalid("usage: /typing on|off".to_owned()),
        (name, _) => PromptInput::Invalid(format!("unknown command /{name}; try /help")),
    }
}

fn send(text: String) -> PromptInput {
    command(InboxCommand::Send(text))
}

fn command(command: InboxCommand) -> PromptInput {
    PromptInput::Event(AppEvent::Command(command))
}
