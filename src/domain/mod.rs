//! Domain layer: core entities and business rules.

pub mod conversation;
pub mod conversation_list_state;
pub mod events;
pub mod feed_timeline;
pub mod message;
pub mod presence;

/// Returns the domain module name for smoke checks.
pub fn module_name() -> &'static str {
    "domain"
}
