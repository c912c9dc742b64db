use std::{
    io::{self, BufRead, Write},
    sync::mpsc::{self, Receiver, RecvTimeoutError},
    thread,
    time::Duration,
};

use anyhow::Result;

use crate::{domain::events::AppEvent, usecases::contracts::AppEventSource};

use super::commands::{parse_line, PromptInput, HELP_LINES};

const EVENT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Reads prompt lines on a background thread and turns them into events.
///
/// Yields `Tick` whenever no line arrives within the poll timeout, and
/// `QuitRequested` once stdin is closed.
pub struct StdinEventSource {
    lines: Receiver<String>,
    closed: bool,
}

impl StdinEventSource {
    pub fn spawn() -> Result<Self> {
        let (tx, lines) = mpsc::channel();
        thread::Builder::new()
            .name("rchat-stdin".to_owned())
            .spawn(move || {
                for line in io::stdin().lock().lines() {
                    let Ok(line) = line else { break };
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            })?;

        Ok(Self {
            lines,
            closed: false,
        })
    }

    fn interpret(&self, line: &str) -> Result<Option<AppEvent>> {
        match parse_line(line) {
            PromptInput::Event(event) => Ok(Some(event)),
            PromptInput::Blank => Ok(None),
            PromptInput::Help => {
                print_lines(HELP_LINES.iter().copied())?;
                Ok(None)
            }
            PromptInput::Invalid(message) => {
                print_lines([message.as_str()])?;
                Ok(None)
            }
        }
    }
}

impl AppEventSource for StdinEventSource {
    fn next_event(&mut self) -> Result<Option<AppEvent>> {
        if self.closed {
            return Ok(Some(AppEvent::QuitRequested));
        }

        match self.lines.recv_timeout(EVENT_POLL_TIMEOUT) {
            Ok(line) => self.interpret(&line),
            Err(RecvTimeoutError::Timeout) => Ok(Some(AppEvent::Tick)),
            Err(RecvTimeoutError::Disconnected) => {
                self.closed = true;
                Ok(Some(AppEvent::QuitRequested))
            }
        }
    }
}

fn print_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Result<()> {
    let mut stdout = io::stdout().lock();
    for line in lines {
        writeln!(stdout, "{line}")?;
    }
    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
pub struct MockEventSource {
    queue: std::collections::VecDeque<AppEvent>,
}

#[cfg(test)]
impl MockEventSource {
    pub fn from(events: Vec<AppEvent>) -> Self {
        Self {
            queue: events.into(),
        }
    }
}

#[cfg(test)]
impl AppEventSource for MockEventSource {
    fn next_event(&mut self) -> Result<Option<AppEvent>> {
        Ok(Some(self.queue.pop_front().unwrap_or(AppEvent::QuitRequested)))
    }
}
