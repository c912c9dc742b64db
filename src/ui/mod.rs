//! UI layer: line-oriented terminal interaction.

mod commands;
mod event_source;
pub mod inbox;
pub mod listing;
mod transcript;

pub(crate) use event_source::StdinEventSource;

/// Returns the UI module name for smoke checks.
pub fn module_name() -> &'static str {
    "ui"
}
